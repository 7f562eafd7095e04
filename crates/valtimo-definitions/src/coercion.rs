//! Value coercion table
//!
//! One coercion rule per [`ValueType`]. The same table validates configuration
//! properties on save and binds action arguments on invocation, so a value
//! accepted in one place is accepted in the other.

use crate::types::ValueType;
use serde_json::{Number, Value};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoercionError {
    #[error("expected {expected}, got {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("'{value}' is not a valid {expected}: {reason}")]
    InvalidValue {
        expected: String,
        value: String,
        reason: String,
    },

    #[error("'{value}' is not one of [{allowed}]")]
    UnknownVariant { value: String, allowed: String },

    #[error("element {index}: {source}")]
    Element {
        index: usize,
        #[source]
        source: Box<CoercionError>,
    },
}

/// Coerce a JSON value into the canonical representation of `value_type`.
///
/// Null is returned unchanged; whether a null is acceptable is decided by the
/// caller through the required flag.
pub fn coerce(value_type: &ValueType, value: &Value) -> Result<Value, CoercionError> {
    if value.is_null() {
        return Ok(Value::Null);
    }

    match value_type {
        ValueType::Any => Ok(value.clone()),
        ValueType::String => coerce_string(value),
        ValueType::Integer => coerce_integer(value),
        ValueType::Float => coerce_float(value),
        ValueType::Boolean => coerce_boolean(value),
        ValueType::Uri => coerce_uri(value),
        ValueType::Uuid | ValueType::Configuration => coerce_uuid(value_type, value),
        ValueType::Object => match value {
            Value::Object(_) => Ok(value.clone()),
            other => Err(mismatch(value_type, other)),
        },
        ValueType::Enum(variants) => {
            let Value::String(text) = value else {
                return Err(mismatch(value_type, value));
            };
            if variants.iter().any(|v| v.as_ref() == text) {
                Ok(value.clone())
            } else {
                Err(CoercionError::UnknownVariant {
                    value: text.clone(),
                    allowed: variants
                        .iter()
                        .map(|v| v.as_ref())
                        .collect::<Vec<_>>()
                        .join(", "),
                })
            }
        }
        ValueType::List(inner) => {
            let Value::Array(items) = value else {
                return Err(mismatch(value_type, value));
            };
            items
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    coerce(inner, item).map_err(|e| CoercionError::Element {
                        index,
                        source: Box::new(e),
                    })
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
    }
}

fn coerce_string(value: &Value) -> Result<Value, CoercionError> {
    match value {
        Value::String(_) => Ok(value.clone()),
        Value::Number(n) => Ok(Value::String(n.to_string())),
        Value::Bool(b) => Ok(Value::String(b.to_string())),
        other => Err(mismatch(&ValueType::String, other)),
    }
}

fn coerce_integer(value: &Value) -> Result<Value, CoercionError> {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
        Value::Number(n) => match n.as_f64() {
            Some(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => {
                Ok(Value::Number(Number::from(f as i64)))
            }
            _ => Err(invalid(&ValueType::Integer, &n.to_string(), "not a whole number")),
        },
        Value::String(text) => text
            .trim()
            .parse::<i64>()
            .map(|i| Value::Number(Number::from(i)))
            .map_err(|e| invalid(&ValueType::Integer, text, &e.to_string())),
        other => Err(mismatch(&ValueType::Integer, other)),
    }
}

fn coerce_float(value: &Value) -> Result<Value, CoercionError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(text) => Some(
            text.trim()
                .parse::<f64>()
                .map_err(|e| invalid(&ValueType::Float, text, &e.to_string()))?,
        ),
        other => return Err(mismatch(&ValueType::Float, other)),
    };

    parsed
        .and_then(Number::from_f64)
        .map(Value::Number)
        .ok_or_else(|| invalid(&ValueType::Float, &value.to_string(), "not a finite number"))
}

fn coerce_boolean(value: &Value) -> Result<Value, CoercionError> {
    match value {
        Value::Bool(_) => Ok(value.clone()),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(invalid(&ValueType::Boolean, text, "expected true or false")),
        },
        other => Err(mismatch(&ValueType::Boolean, other)),
    }
}

fn coerce_uri(value: &Value) -> Result<Value, CoercionError> {
    let Value::String(text) = value else {
        return Err(mismatch(&ValueType::Uri, value));
    };
    url::Url::parse(text)
        .map(|_| value.clone())
        .map_err(|e| invalid(&ValueType::Uri, text, &e.to_string()))
}

fn coerce_uuid(value_type: &ValueType, value: &Value) -> Result<Value, CoercionError> {
    let Value::String(text) = value else {
        return Err(mismatch(value_type, value));
    };
    Uuid::parse_str(text.trim())
        .map(|id| Value::String(id.to_string()))
        .map_err(|e| invalid(value_type, text, &e.to_string()))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn mismatch(expected: &ValueType, found: &Value) -> CoercionError {
    CoercionError::TypeMismatch {
        expected: expected.to_string(),
        found: json_kind(found).to_string(),
    }
}

fn invalid(expected: &ValueType, value: &str, reason: &str) -> CoercionError {
    CoercionError::InvalidValue {
        expected: expected.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
