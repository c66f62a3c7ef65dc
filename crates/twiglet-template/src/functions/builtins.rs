/*
 * functions/builtins.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! String, collection and number helpers.

use super::{FunctionRegistry, ParamType, Signature};
use crate::error::{TemplateError, TemplateResult};
use crate::value::Value;

const MAX_RANGE_LEN: i64 = 100_000;

pub(super) fn register(registry: &mut FunctionRegistry) {
    use ParamType::{Any, Float, Integer, List, Map, Number, String};

    registry
        .register(
            "upper",
            Signature::new([String], |args, _| Ok(Value::from(text(&args[0]).to_uppercase()))),
        )
        .register(
            "lower",
            Signature::new([String], |args, _| Ok(Value::from(text(&args[0]).to_lowercase()))),
        )
        .register(
            "capitalize",
            Signature::new([String], |args, _| Ok(Value::from(capitalize(text(&args[0]))))),
        )
        .register(
            "trim",
            Signature::new([String], |args, _| Ok(Value::from(text(&args[0]).trim()))),
        )
        .register("length", Signature::new([String], |args, _| {
            Ok(count(text(&args[0]).chars().count()))
        }))
        .register("length", Signature::new([List], |args, _| match &args[0] {
            Value::List(items) => Ok(count(items.len())),
            _ => Ok(Value::Null),
        }))
        .register("length", Signature::new([Map], |args, _| match &args[0] {
            Value::Map(m) => Ok(count(m.len())),
            _ => Ok(Value::Null),
        }))
        .register("join", Signature::new([List], |args, _| Ok(join(&args[0], ""))))
        .register(
            "join",
            Signature::new([List, String], |args, _| Ok(join(&args[0], text(&args[1])))),
        )
        .register(
            "default",
            Signature::new([Any, Any], |args, _| {
                let value = &args[0];
                let empty = value.is_null() || matches!(value, Value::String(s) if s.is_empty());
                Ok(if empty { args[1].clone() } else { value.clone() })
            }),
        )
        .register("keys", Signature::new([Map], |args, _| match &args[0] {
            Value::Map(m) => Ok(Value::List(m.keys().cloned().map(Value::String).collect())),
            _ => Ok(Value::Null),
        }))
        .register("first", Signature::new([List], |args, _| match &args[0] {
            Value::List(items) => Ok(items.first().cloned().unwrap_or_default()),
            _ => Ok(Value::Null),
        }))
        .register("first", Signature::new([String], |args, _| {
            Ok(text(&args[0]).chars().next().map(std::string::String::from).into())
        }))
        .register("last", Signature::new([List], |args, _| match &args[0] {
            Value::List(items) => Ok(items.last().cloned().unwrap_or_default()),
            _ => Ok(Value::Null),
        }))
        .register("last", Signature::new([String], |args, _| {
            Ok(text(&args[0]).chars().last().map(std::string::String::from).into())
        }))
        .register(
            "range",
            Signature::new([Integer, Integer], |args, _| range(&args[0], &args[1], &Value::Integer(1))),
        )
        .register(
            "range",
            Signature::new([Integer, Integer, Integer], |args, _| range(&args[0], &args[1], &args[2])),
        )
        .register("abs", Signature::new([Integer], |args, _| match &args[0] {
            Value::Integer(i) => i
                .checked_abs()
                .map(Value::Integer)
                .ok_or_else(|| TemplateError::function("abs", "Integer overflow")),
            _ => Ok(Value::Null),
        }))
        .register("abs", Signature::new([Float], |args, _| match &args[0] {
            Value::Float(f) => Ok(Value::Float(f.abs())),
            _ => Ok(Value::Null),
        }))
        .register("round", Signature::new([Number], |args, _| round(&args[0], 0)))
        .register("round", Signature::new([Number, Integer], |args, _| match &args[1] {
            Value::Integer(precision) => round(&args[0], *precision),
            _ => Ok(Value::Null),
        }));
}

fn text(value: &Value) -> &str {
    value.as_str().unwrap_or_default()
}

fn count(n: usize) -> Value {
    Value::Integer(i64::try_from(n).unwrap_or(i64::MAX))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn join(list: &Value, separator: &str) -> Value {
    match list {
        Value::List(items) => Value::String(
            items
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(separator),
        ),
        _ => Value::Null,
    }
}

/// Inclusive integer range, like Twig's `range(1, 3)` → `[1, 2, 3]`.
fn range(start: &Value, end: &Value, step: &Value) -> TemplateResult<Value> {
    let (Value::Integer(start), Value::Integer(end), Value::Integer(step)) = (start, end, step)
    else {
        return Ok(Value::Null);
    };
    let stride = match step.checked_abs() {
        Some(0) => return Err(TemplateError::function("range", "Step must not be zero")),
        Some(stride) => stride,
        None => return Err(TemplateError::function("range", "Step is out of range")),
    };
    let span = (i128::from(*end) - i128::from(*start)).abs() / i128::from(stride) + 1;
    if span > i128::from(MAX_RANGE_LEN) {
        return Err(TemplateError::function(
            "range",
            format!("Range would produce more than {} items", MAX_RANGE_LEN),
        ));
    }

    let mut items = Vec::new();
    let mut current = *start;
    let ascending = start <= end;
    while (ascending && current <= *end) || (!ascending && current >= *end) {
        items.push(Value::Integer(current));
        let next = if ascending {
            current.checked_add(stride)
        } else {
            current.checked_sub(stride)
        };
        match next {
            Some(next) => current = next,
            None => break,
        }
    }
    Ok(Value::List(items))
}

fn round(value: &Value, precision: i64) -> TemplateResult<Value> {
    match value {
        Value::Integer(i) if precision >= 0 => Ok(Value::Integer(*i)),
        other => {
            let x = crate::math::to_number(other).map_or(0.0, |n| n.as_f64());
            let factor = 10f64.powi(precision.clamp(-15, 15) as i32);
            let rounded = (x * factor).round() / factor;
            if precision > 0 {
                return Ok(Value::Float(rounded));
            }
            crate::math::float_to_i64(rounded)
                .map(Value::Integer)
                .ok_or_else(|| TemplateError::function("round", "Result is out of integer range"))
        }
    }
}
