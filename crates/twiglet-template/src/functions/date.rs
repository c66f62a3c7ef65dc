/*
 * functions/date.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Date arithmetic and formatting built-ins.
//!
//! - `date(value)` renders `YYYY-MM-DDTHH:MM:SS`.
//! - `date(value, format)` renders with a PHP `date()` format string.
//! - `date_modify(value, "+1 day")` shifts a date by a signed amount.
//!
//! `value` is either a date or a string. The string `"now"` means the current
//! time in the configured timezone.

use super::{FunctionEnv, FunctionRegistry, ParamType, Signature};
use crate::error::{TemplateError, TemplateResult};
use crate::value::{ISO_DATE_TIME_FORMAT, Value};
use chrono::{Duration, Months, NaiveDate, NaiveDateTime};
use std::fmt::Write;

pub(super) fn register(registry: &mut FunctionRegistry) {
    registry
        .register(
            "date_modify",
            Signature::new([ParamType::Date, ParamType::String], modify_fn),
        )
        .register(
            "date_modify",
            Signature::new([ParamType::String, ParamType::String], modify_fn),
        )
        .register("date", Signature::new([ParamType::Date], format_fn))
        .register("date", Signature::new([ParamType::String], format_fn))
        .register(
            "date",
            Signature::new([ParamType::Date, ParamType::String], format_fn),
        )
        .register(
            "date",
            Signature::new([ParamType::String, ParamType::String], format_fn),
        );
}

fn modify_fn(args: &[Value], env: &FunctionEnv) -> TemplateResult<Value> {
    let date = date_argument("date_modify", &args[0], env)?;
    let modifier = args[1].as_str().unwrap_or_default();
    modify_date(date, modifier).map(Value::Date)
}

fn format_fn(args: &[Value], env: &FunctionEnv) -> TemplateResult<Value> {
    let date = date_argument("date", &args[0], env)?;
    let format = args.get(1).and_then(Value::as_str);
    format_date(date, format).map(Value::String)
}

fn date_argument(function: &str, value: &Value, env: &FunctionEnv) -> TemplateResult<NaiveDateTime> {
    match value {
        Value::Date(d) => Ok(*d),
        Value::String(s) if s.trim().eq_ignore_ascii_case("now") => Ok(env.now()),
        Value::String(s) => parse_date(s).ok_or_else(|| {
            TemplateError::function(function, format!("Cannot parse '{}' as a date", s))
        }),
        other => Err(TemplateError::function(
            function,
            format!("Expected a date, got {}", other.type_name()),
        )),
    }
}

/// Parse an ISO-like local date-time. A bare date means midnight.
pub fn parse_date(input: &str) -> Option<NaiveDateTime> {
    const DATE_TIME_FORMATS: [&str; 4] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
    ];

    let input = input.trim();
    DATE_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(input, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Apply a modifier of the form `<sign><amount> <unit>`.
///
/// The unit is matched case-insensitively by prefix, so `"days"` and
/// `"Month"` both work.
pub fn modify_date(date: NaiveDateTime, modifier: &str) -> TemplateResult<NaiveDateTime> {
    let invalid = || {
        TemplateError::function(
            "date_modify",
            format!("Invalid modifier '{}', expected e.g. '+1 day'", modifier),
        )
    };

    let (sign, rest) = match modifier.chars().next() {
        Some('+') => (1i64, &modifier[1..]),
        Some('-') => (-1i64, &modifier[1..]),
        _ => return Err(invalid()),
    };
    let (amount, unit) = rest.split_once(' ').ok_or_else(invalid)?;
    if amount.is_empty() || !amount.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    if unit.is_empty() || !unit.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(invalid());
    }
    let amount: i64 = amount.parse().map_err(|_| invalid())?;
    let signed = amount * sign;
    let unit_lower = unit.to_ascii_lowercase();

    let out_of_range = || {
        TemplateError::function(
            "date_modify",
            format!("'{}' moves the date out of range", modifier),
        )
    };

    let result = if unit_lower.starts_with("day") {
        Duration::try_days(signed).and_then(|d| date.checked_add_signed(d))
    } else if unit_lower.starts_with("month") {
        shift_months(date, signed)
    } else if unit_lower.starts_with("year") {
        signed.checked_mul(12).and_then(|m| shift_months(date, m))
    } else if unit_lower.starts_with("second") {
        Duration::try_seconds(signed).and_then(|d| date.checked_add_signed(d))
    } else if unit_lower.starts_with("hour") {
        Duration::try_hours(signed).and_then(|d| date.checked_add_signed(d))
    } else if unit_lower.starts_with("minute") {
        Duration::try_minutes(signed).and_then(|d| date.checked_add_signed(d))
    } else {
        return Err(TemplateError::function(
            "date_modify",
            format!("Unknown unit '{}'", unit),
        ));
    };

    result.ok_or_else(out_of_range)
}

/// Month arithmetic clamps to the last day of the target month.
fn shift_months(date: NaiveDateTime, months: i64) -> Option<NaiveDateTime> {
    let magnitude = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        date.checked_add_months(magnitude)
    } else {
        date.checked_sub_months(magnitude)
    }
}

/// Render a date, with an optional PHP `date()` format.
pub fn format_date(date: NaiveDateTime, format: Option<&str>) -> TemplateResult<String> {
    let pattern = match format {
        Some(format) => php_to_strftime(format),
        None => ISO_DATE_TIME_FORMAT.to_string(),
    };
    let mut out = String::new();
    write!(out, "{}", date.format(&pattern)).map_err(|_| {
        TemplateError::function("date", format!("Invalid date format '{}'", pattern))
    })?;
    Ok(out)
}

/// Translate a PHP `date()` format into a chrono strftime pattern.
///
/// Single left-to-right scan: each source character is translated exactly
/// once, so output of one token can never be rewritten by another.
/// A backslash escapes the next character; unknown characters are literal.
pub fn php_to_strftime(format: &str) -> String {
    let mut out = String::with_capacity(format.len() * 2);
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        let token = match c {
            'y' => "%y",
            'Y' => "%Y",
            'F' => "%B",
            'M' => "%b",
            'm' => "%m",
            'n' => "%-m",
            'l' => "%A",
            'D' => "%a",
            'd' => "%d",
            'j' => "%-d",
            'N' => "%u",
            'w' => "%w",
            'z' => "%j",
            'H' => "%H",
            'G' => "%-H",
            'h' => "%I",
            'g' => "%-I",
            'i' => "%M",
            's' => "%S",
            'u' => "%6f",
            'a' => "%P",
            'A' => "%p",
            'U' => "%s",
            '\\' => {
                if let Some(escaped) = chars.next() {
                    push_literal(&mut out, escaped);
                }
                continue;
            }
            other => {
                push_literal(&mut out, other);
                continue;
            }
        };
        out.push_str(token);
    }
    out
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}
