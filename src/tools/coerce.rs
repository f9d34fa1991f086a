//! Best-effort conversion of model-supplied arguments to declared types.
//!
//! Models routinely send `"5"` for an integer or `"yes"` for a boolean.
//! Conversion is fail-soft: a value that cannot be converted is passed
//! through unchanged and a warning is logged.

use super::ParamType;
use serde_json::{Number, Value};
use tracing::warn;

const TRUE_WORDS: [&str; 4] = ["true", "yes", "1", "y"];
const FALSE_WORDS: [&str; 4] = ["false", "no", "0", "n"];

/// Coerce `value` for parameter `name` of type `param_type`.
pub fn coerce_value(name: &str, value: Value, param_type: ParamType) -> Value {
    match try_coerce(&value, param_type) {
        Some(coerced) => coerced,
        None => {
            warn!(
                "Could not convert argument '{}' ({}) to {}, passing it through",
                name, value, param_type
            );
            value
        }
    }
}

fn try_coerce(value: &Value, param_type: ParamType) -> Option<Value> {
    // Explicit nulls mean "not supplied" for every type.
    if value.is_null() {
        return Some(Value::Null);
    }

    match param_type {
        ParamType::Any => Some(value.clone()),
        ParamType::String => Some(match value {
            Value::String(_) => value.clone(),
            other => Value::String(other.to_string()),
        }),
        ParamType::Integer => to_integer(value),
        ParamType::Number => to_number(value),
        ParamType::Boolean => match value {
            Value::String(s) => to_boolean(s),
            other => Some(other.clone()),
        },
        ParamType::Array => match value {
            Value::String(s) => to_array(s),
            other => Some(other.clone()),
        },
        ParamType::Object => match value {
            Value::String(s) => match serde_json::from_str::<Value>(s) {
                Ok(parsed @ Value::Object(_)) => Some(parsed),
                _ => None,
            },
            other => Some(other.clone()),
        },
    }
}

fn to_integer(value: &Value) -> Option<Value> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Some(value.clone()),
        Value::Number(n) => n
            .as_f64()
            .filter(|f| f.is_finite())
            .map(|f| Value::from(f.trunc() as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok().map(Value::from),
        Value::Bool(b) => Some(Value::from(i64::from(*b))),
        _ => None,
    }
}

fn to_number(value: &Value) -> Option<Value> {
    let f = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Bool(b) => f64::from(u8::from(*b)),
        _ => return None,
    };
    Number::from_f64(f).map(Value::Number)
}

fn to_boolean(s: &str) -> Option<Value> {
    let lowered = s.trim().to_lowercase();
    if TRUE_WORDS.contains(&lowered.as_str()) {
        Some(Value::Bool(true))
    } else if FALSE_WORDS.contains(&lowered.as_str()) {
        Some(Value::Bool(false))
    } else {
        None
    }
}

fn to_array(s: &str) -> Option<Value> {
    if let Ok(parsed @ Value::Array(_)) = serde_json::from_str::<Value>(s) {
        return Some(parsed);
    }
    // Looks like JSON but isn't: keep the raw text rather than guessing.
    if s.trim_start().starts_with('[') {
        return None;
    }
    Some(Value::Array(
        s.split(',')
            .map(|part| Value::String(part.trim().to_string()))
            .collect(),
    ))
}
