//! Coercions and operators over [`serde_json::Value`].
//!
//! Template data is plain JSON. These functions give it the loose,
//! JavaScript-flavoured behaviour templates expect: truthiness, string
//! concatenation with `+`, and missing properties reading as `null`.

use std::cmp::Ordering;

use serde_json::{Number, Value};

use crate::error::EvalError;

/// Whether a value counts as true in a condition.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// String form of a value as written to the output buffer.
///
/// `null` renders as the empty string.
pub fn to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(n),
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(to_text).collect::<Vec<_>>().join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

/// Numeric form of a value; `NaN` when there is none.
pub fn to_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                0.0
            } else {
                trimmed.parse().unwrap_or(f64::NAN)
            }
        }
        Value::Array(_) | Value::Object(_) => f64::NAN,
    }
}

/// Build a JSON number, keeping integral results integral.
///
/// Non-finite results have no JSON form and become `null`.
pub fn number(f: f64) -> Value {
    if f.fract() == 0.0 && f.abs() < 9.007_199_254_740_992e15 {
        Value::Number(Number::from(f as i64))
    } else {
        Number::from_f64(f).map_or(Value::Null, Value::Number)
    }
}

fn format_number(n: &Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < 1e21 => format!("{}", f as i128),
        Some(f) => f.to_string(),
        None => n.to_string(),
    }
}

fn is_numeric(value: &Value) -> bool {
    matches!(value, Value::Null | Value::Bool(_) | Value::Number(_))
}

/// `a + b`: numeric addition, or concatenation when either side is not numeric.
pub fn add(a: &Value, b: &Value) -> Value {
    if is_numeric(a) && is_numeric(b) {
        number(to_number(a) + to_number(b))
    } else {
        Value::String(to_text(a) + &to_text(b))
    }
}

/// Strict equality; numbers compare by value regardless of representation.
pub fn strict_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Ordering used by `< <= > >=`; `None` when the operands are unordered.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => to_number(a).partial_cmp(&to_number(b)),
    }
}

/// `target.property`
pub fn get_property(target: &Value, property: &str) -> Result<Value, EvalError> {
    match target {
        Value::Null => Err(EvalError::NullAccess {
            property: property.to_string(),
        }),
        Value::Object(map) => Ok(map.get(property).cloned().unwrap_or(Value::Null)),
        Value::Array(items) => Ok(match property {
            "length" => Value::from(items.len()),
            _ => property
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i).cloned())
                .unwrap_or(Value::Null),
        }),
        Value::String(s) => Ok(match property {
            "length" => Value::from(s.chars().count()),
            _ => property
                .parse::<usize>()
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map_or(Value::Null, |c| Value::String(c.to_string())),
        }),
        Value::Bool(_) | Value::Number(_) => Ok(Value::Null),
    }
}

/// `target[key]`
pub fn get_index(target: &Value, key: &Value) -> Result<Value, EvalError> {
    get_property(target, &property_key(key))
}

/// Property name designated by an index value.
pub fn property_key(key: &Value) -> String {
    match key {
        Value::Number(n) => format_number(n),
        other => to_text(other),
    }
}

/// Short type name used in error messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
