//! Coercing primitive schemas.
//!
//! Coercion is attempted only after direct narrowing fails, and only on
//! schemas whose metadata enables it. A coerced value still runs through the
//! schema's checks.
//!
//! ```
//! use valschema::{coerce, TypedSchema};
//!
//! assert_eq!(coerce::int().parse(" 42 ").unwrap(), 42);
//! assert_eq!(coerce::string().parse(7i64).unwrap(), "7");
//! assert!(coerce::boolean().parse("yes").unwrap());
//! ```

use crate::primitives::{BoolSchema, FloatSchema, IntSchema, StringSchema};
use crate::value::Value;

pub fn string() -> StringSchema {
    crate::primitives::string().coerce()
}

pub fn int() -> IntSchema {
    crate::primitives::int().coerce()
}

pub fn float() -> FloatSchema {
    crate::primitives::float().coerce()
}

pub fn boolean() -> BoolSchema {
    crate::primitives::boolean().coerce()
}

pub(crate) fn to_string(value: &Value) -> Option<Value> {
    let text = match value {
        Value::Int(i) => i.to_string(),
        Value::Float(f) if f.is_finite() => f.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    Some(Value::String(text))
}

pub(crate) fn to_int(value: &Value) -> Option<Value> {
    let int = match value {
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        Value::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => *f as i64,
        Value::Bool(b) => i64::from(*b),
        _ => return None,
    };
    Some(Value::Int(int))
}

pub(crate) fn to_float(value: &Value) -> Option<Value> {
    let float = match value {
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        Value::Int(i) => *i as f64,
        Value::Bool(b) => f64::from(u8::from(*b)),
        _ => return None,
    };
    Some(Value::Float(float))
}

pub(crate) fn to_bool(value: &Value) -> Option<Value> {
    let flag = match value {
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => true,
            "false" | "0" | "no" | "off" | "" => false,
            _ => return None,
        },
        Value::Int(i) => *i != 0,
        Value::Float(f) => *f != 0.0,
        _ => return None,
    };
    Some(Value::Bool(flag))
}
