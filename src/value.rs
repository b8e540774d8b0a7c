//! Runtime values validated by schemas.
//!
//! [`Value`] is the dynamic input and output representation of the engine. It
//! mirrors `serde_json::Value` with two differences: integers and floats are
//! distinct variants, and [`Value::Ref`] models a shared reference to another
//! value. References compare by identity and may form cycles.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

/// Keyed mapping used for object values.
pub type Map = BTreeMap<String, Value>;

/// A dynamically typed value.
#[derive(Debug, Clone, Default)]
pub enum Value {
    /// No value. Used both for explicit nulls and for missing input.
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<Value>),
    Object(Map),
    /// Reference to a shared value. Compared by identity.
    Ref(Shared),
}

impl Value {
    /// Returns the type name used in error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Ref(_) => "reference",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view of ints and floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Map> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_shared(&self) -> Option<&Shared> {
        match self {
            Value::Ref(shared) => Some(shared),
            _ => None,
        }
    }

    /// Looks up a key on an object value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// Converts to JSON. References are followed; a reference already on the
    /// current path becomes `null`, so cyclic graphs terminate.
    pub fn to_json(&self) -> serde_json::Value {
        let mut visiting = HashSet::new();
        to_json_inner(self, &mut visiting)
    }
}

fn to_json_inner(value: &Value, visiting: &mut HashSet<usize>) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::from(*i),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Array(items) => items
            .iter()
            .map(|item| to_json_inner(item, visiting))
            .collect(),
        Value::Object(map) => serde_json::Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), to_json_inner(v, visiting)))
                .collect(),
        ),
        Value::Ref(shared) => {
            if !visiting.insert(shared.addr()) {
                return serde_json::Value::Null;
            }
            let json = to_json_inner(&shared.get(), visiting);
            visiting.remove(&shared.addr());
            json
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            (Value::Ref(a), Value::Ref(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

/// A shared, lockable cell holding a [`Value`].
///
/// Cloning a `Shared` clones the handle, not the value. Two handles are equal
/// only if they point at the same cell.
#[derive(Clone)]
pub struct Shared(Arc<RwLock<Value>>);

impl Shared {
    pub fn new(value: impl Into<Value>) -> Self {
        Self(Arc::new(RwLock::new(value.into())))
    }

    /// Returns a snapshot of the referenced value.
    pub fn get(&self) -> Value {
        self.0.read().clone()
    }

    pub fn is_null(&self) -> bool {
        self.0.read().is_null()
    }

    /// Replaces the referenced value. Used to tie cyclic graphs together.
    pub fn set(&self, value: impl Into<Value>) {
        *self.0.write() = value.into();
    }

    pub fn ptr_eq(&self, other: &Shared) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Shared({:#x})", self.addr())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i.into())
    }
}

impl From<u32> for Value {
    fn from(i: u32) -> Self {
        Value::Int(i.into())
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Null
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Object(map)
    }
}

impl From<Shared> for Value {
    fn from(shared: Shared) -> Self {
        Value::Ref(shared)
    }
}

impl From<&Value> for Value {
    fn from(value: &Value) -> Self {
        value.clone()
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

/// Conversion from a validated [`Value`] into a schema's typed output.
///
/// Returns `None` when the value does not have the expected shape. References
/// are dereferenced for every target except [`Value`] and [`Shared`].
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromValue for Shared {
    fn from_value(value: &Value) -> Option<Self> {
        value.as_shared().cloned()
    }
}

impl FromValue for () {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(()),
            Value::Ref(shared) => Self::from_value(&shared.get()),
            _ => None,
        }
    }
}

macro_rules! scalar_from_value {
    ($ty:ty, $pattern:pat => $out:expr) => {
        impl FromValue for $ty {
            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    $pattern => Some($out),
                    Value::Ref(shared) => Self::from_value(&shared.get()),
                    _ => None,
                }
            }
        }
    };
}

scalar_from_value!(bool, Value::Bool(b) => *b);
scalar_from_value!(i64, Value::Int(i) => *i);
scalar_from_value!(String, Value::String(s) => s.clone());

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Ref(shared) => Self::from_value(&shared.get()),
            other => other.as_f64(),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            Value::Ref(shared) if shared.is_null() => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}

impl<T: FromValue> FromValue for Vec<T> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Array(items) => items.iter().map(T::from_value).collect(),
            Value::Ref(shared) => Self::from_value(&shared.get()),
            _ => None,
        }
    }
}

impl<T: FromValue> FromValue for BTreeMap<String, T> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| T::from_value(v).map(|v| (k.clone(), v)))
                .collect(),
            Value::Ref(shared) => Self::from_value(&shared.get()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_numbers_split_into_int_and_float() {
        assert_eq!(Value::from(json!(3)), Value::Int(3));
        assert_eq!(Value::from(json!(2.5)), Value::Float(2.5));
    }

    #[test]
    fn refs_compare_by_identity() {
        let a = Shared::new("x");
        let b = Shared::new("x");
        assert_eq!(Value::Ref(a.clone()), Value::Ref(a.clone()));
        assert_ne!(Value::Ref(a), Value::Ref(b));
    }

    #[test]
    fn to_json_cuts_cycles() {
        let node = Shared::new(Value::Null);
        let mut map = Map::new();
        map.insert("next".into(), Value::Ref(node.clone()));
        node.set(map);

        assert_eq!(Value::Ref(node).to_json(), json!({ "next": null }));
    }

    #[test]
    fn from_value_derefs_references() {
        let shared = Shared::new("hello");
        let value = Value::Ref(shared.clone());
        assert_eq!(String::from_value(&value), Some("hello".to_string()));
        assert!(Shared::from_value(&value).unwrap().ptr_eq(&shared));
    }

    #[test]
    fn option_from_null() {
        assert_eq!(Option::<i64>::from_value(&Value::Null), Some(None));
        assert_eq!(Option::<i64>::from_value(&Value::Int(4)), Some(Some(4)));
        assert_eq!(Option::<i64>::from_value(&Value::Bool(true)), None);
    }

    #[test]
    fn option_from_reference_to_null() {
        let null = Value::Ref(Shared::new(Value::Null));
        assert_eq!(Option::<String>::from_value(&null), Some(None));

        let text = Value::Ref(Shared::new("x"));
        assert_eq!(Option::<String>::from_value(&text), Some(Some("x".to_string())));
    }
}
