/*
 * math.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Numeric coercion and arithmetic.
//!
//! The primitive helpers ([`are_double`], [`sum`], [`int_div`], [`modulo`])
//! define floating point semantics exactly. The operator functions build on
//! them: integer operands use checked `i64` arithmetic, anything involving a
//! float falls back to `f64`.

use crate::error::{TemplateError, TemplateResult};
use crate::value::Value;
use std::cmp::Ordering;

/// A value coerced for arithmetic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Integer(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(self) -> f64 {
        match self {
            Number::Integer(i) => i as f64,
            Number::Float(f) => f,
        }
    }
}

impl From<Number> for Value {
    fn from(n: Number) -> Self {
        match n {
            Number::Integer(i) => Value::Integer(i),
            Number::Float(f) => Value::Float(f),
        }
    }
}

/// True iff `values` is present, non-empty and every element is a float.
pub fn are_double(values: Option<&[Value]>) -> bool {
    match values {
        Some(values) if !values.is_empty() => values.iter().all(|v| matches!(v, Value::Float(_))),
        _ => false,
    }
}

pub fn sum(a: f64, b: f64) -> f64 {
    a + b
}

/// `floor(a / b)`, computed in floating point and converted to an integer.
///
/// `None` when the quotient is not finite or falls outside the `i64` range.
pub fn int_div(a: f64, b: f64) -> Option<i64> {
    float_to_i64((a / b).floor())
}

/// `a - floor(a / b) * b`, computed in floating point.
///
/// Uses the same quotient as [`int_div`] without the integer conversion, so
/// it stays defined for quotients too large for `i64`.
pub fn modulo(a: f64, b: f64) -> f64 {
    a - (a / b).floor() * b
}

/// Convert an integral float to `i64`, failing instead of saturating.
pub fn float_to_i64(f: f64) -> Option<i64> {
    // i64::MIN is exactly -2^63; i64::MAX rounds up to 2^63 as a float.
    if f.is_finite() && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

/// Coerce a value to a number. Numeric strings are accepted.
pub fn to_number(value: &Value) -> Option<Number> {
    match value {
        Value::Integer(i) => Some(Number::Integer(*i)),
        Value::Float(f) => Some(Number::Float(*f)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .map(Number::Integer)
                .or_else(|_| s.parse::<f64>().map(Number::Float))
                .ok()
        }
        _ => None,
    }
}

fn operands(op: &str, a: &Value, b: &Value) -> TemplateResult<(Number, Number)> {
    match (to_number(a), to_number(b)) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(TemplateError::calculation(format!(
            "Cannot apply '{}' to {} and {}",
            op,
            a.type_name(),
            b.type_name()
        ))),
    }
}

fn overflow(op: &str) -> TemplateError {
    TemplateError::calculation(format!("Integer overflow in '{}'", op))
}

fn check_divisor(op: &str, divisor: Number) -> TemplateResult<()> {
    if divisor.as_f64() == 0.0 {
        return Err(TemplateError::calculation(format!("Division by zero in '{}'", op)));
    }
    Ok(())
}

pub fn add(a: &Value, b: &Value) -> TemplateResult<Value> {
    match operands("+", a, b)? {
        (Number::Integer(x), Number::Integer(y)) => {
            x.checked_add(y).map(Value::Integer).ok_or_else(|| overflow("+"))
        }
        (x, y) => Ok(Value::Float(sum(x.as_f64(), y.as_f64()))),
    }
}

pub fn subtract(a: &Value, b: &Value) -> TemplateResult<Value> {
    match operands("-", a, b)? {
        (Number::Integer(x), Number::Integer(y)) => {
            x.checked_sub(y).map(Value::Integer).ok_or_else(|| overflow("-"))
        }
        (x, y) => Ok(Value::Float(x.as_f64() - y.as_f64())),
    }
}

pub fn multiply(a: &Value, b: &Value) -> TemplateResult<Value> {
    match operands("*", a, b)? {
        (Number::Integer(x), Number::Integer(y)) => {
            x.checked_mul(y).map(Value::Integer).ok_or_else(|| overflow("*"))
        }
        (x, y) => Ok(Value::Float(x.as_f64() * y.as_f64())),
    }
}

/// `/` always produces a float.
pub fn divide(a: &Value, b: &Value) -> TemplateResult<Value> {
    let (x, y) = operands("/", a, b)?;
    check_divisor("/", y)?;
    Ok(Value::Float(x.as_f64() / y.as_f64()))
}

fn floor_div_i64(x: i64, y: i64) -> Option<i64> {
    let q = x.checked_div(y)?;
    if x % y != 0 && ((x < 0) != (y < 0)) {
        q.checked_sub(1)
    } else {
        Some(q)
    }
}

/// `//`: floor division.
pub fn floor_divide(a: &Value, b: &Value) -> TemplateResult<Value> {
    let (x, y) = operands("//", a, b)?;
    check_divisor("//", y)?;
    match (x, y) {
        (Number::Integer(x), Number::Integer(y)) => floor_div_i64(x, y)
            .map(Value::Integer)
            .ok_or_else(|| overflow("//")),
        (x, y) => int_div(x.as_f64(), y.as_f64())
            .map(Value::Integer)
            .ok_or_else(|| overflow("//")),
    }
}

/// `%`: remainder with the sign of the divisor, consistent with `//`.
pub fn remainder(a: &Value, b: &Value) -> TemplateResult<Value> {
    let (x, y) = operands("%", a, b)?;
    check_divisor("%", y)?;
    match (x, y) {
        (Number::Integer(x), Number::Integer(y)) => floor_div_i64(x, y)
            .and_then(|q| q.checked_mul(y))
            .and_then(|p| x.checked_sub(p))
            .map(Value::Integer)
            .ok_or_else(|| overflow("%")),
        (x, y) => Ok(Value::Float(modulo(x.as_f64(), y.as_f64()))),
    }
}

pub fn power(a: &Value, b: &Value) -> TemplateResult<Value> {
    match operands("**", a, b)? {
        (Number::Integer(x), Number::Integer(y)) if y >= 0 => u32::try_from(y)
            .ok()
            .and_then(|y| x.checked_pow(y))
            .map(Value::Integer)
            .ok_or_else(|| overflow("**")),
        (x, y) => Ok(Value::Float(x.as_f64().powf(y.as_f64()))),
    }
}

pub fn negate(a: &Value) -> TemplateResult<Value> {
    match to_number(a) {
        Some(Number::Integer(i)) => i.checked_neg().map(Value::Integer).ok_or_else(|| overflow("-")),
        Some(Number::Float(f)) => Ok(Value::Float(-f)),
        None => Err(TemplateError::calculation(format!(
            "Cannot negate {}",
            a.type_name()
        ))),
    }
}

/// Equality used by `==`: numbers compare by value across integer and float.
pub fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
            compare(a, b) == Some(Ordering::Equal)
        }
        _ => a == b,
    }
}

/// Ordering used by `<`, `>`, `<=`, `>=`.
///
/// Numbers compare numerically, strings lexically, dates chronologically.
/// Other combinations are unordered.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => Some(x.cmp(y)),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Date(x), Value::Date(y)) => Some(x.cmp(y)),
        (Value::Integer(_) | Value::Float(_), Value::Integer(_) | Value::Float(_)) => {
            let x = to_number(a)?.as_f64();
            let y = to_number(b)?.as_f64();
            x.partial_cmp(&y)
        }
        _ => None,
    }
}
