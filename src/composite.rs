//! Container schemas: arrays, objects, records, unions and intersections.
//!
//! Children are validated on their own payloads so every issue carries its
//! full path. A container's own checks run only if none of its children
//! failed.

use std::sync::Arc;

use tracing::trace;

use crate::checks;
use crate::error::{IssueCode, RawIssue};
use crate::parse::{finish_wrapped, parse_typed, ParsePayload, ParseState};
use crate::schema::{Schema, SchemaRef, TypedSchema};
use crate::types::{Kind, PathSegment, TypeInternals};
use crate::value::{Map, Value};

/// Runs `schema` on a child payload and moves its issues into `payload`.
fn run_child(
    schema: &dyn Schema,
    payload: &mut ParsePayload,
    state: &mut ParseState<'_>,
    value: Value,
    segment: PathSegment,
) -> Value {
    let mut child = payload.child(value, segment);
    schema.run(&mut child, state);
    payload.issues.append(&mut child.issues);
    child.value
}

/// Tries `members` in order against the payload value. The first success
/// replaces the payload value and returns `Ok`; otherwise returns the issues
/// of every member, in member order.
pub(crate) fn linear_trial(
    members: &[SchemaRef],
    payload: &mut ParsePayload,
    state: &mut ParseState<'_>,
) -> Result<(), Vec<Vec<RawIssue>>> {
    let mut branches = Vec::with_capacity(members.len());
    for (index, member) in members.iter().enumerate() {
        let mut attempt = payload.branch(payload.value.clone());
        member.run(&mut attempt, state);
        if attempt.is_ok() {
            trace!(member = index, "union member matched");
            payload.value = attempt.value;
            return Ok(());
        }
        branches.push(attempt.issues);
    }
    Err(branches)
}

/// Homogeneous list schema.
#[derive(Debug, Clone)]
pub struct Array<S> {
    element: S,
    internals: TypeInternals,
}

pub fn array<S: TypedSchema>(element: S) -> Array<S> {
    Array {
        element,
        internals: TypeInternals::new(Kind::Array),
    }
}

impl<S: TypedSchema> Array<S> {
    pub fn element(&self) -> &S {
        &self.element
    }

    pub fn min(&self, minimum: usize) -> Self {
        self.check(checks::min_length(minimum))
    }

    pub fn max(&self, maximum: usize) -> Self {
        self.check(checks::max_length(maximum))
    }

    pub fn length(&self, exact: usize) -> Self {
        self.check(checks::length(exact))
    }

    pub fn nonempty(&self) -> Self {
        self.min(1)
    }
}

impl<S: TypedSchema> Schema for Array<S> {
    fn internals(&self) -> &TypeInternals {
        &self.internals
    }

    fn run(&self, payload: &mut ParsePayload, state: &mut ParseState<'_>) {
        let narrow = |input: &Value,
                      payload: &mut ParsePayload,
                      state: &mut ParseState<'_>|
         -> Option<Value> {
            let items = input.as_array()?;
            let parsed = items
                .iter()
                .enumerate()
                .map(|(index, item)| {
                    run_child(&self.element, payload, state, item.clone(), index.into())
                })
                .collect();
            Some(Value::Array(parsed))
        };
        parse_typed(&self.internals, payload, state, &narrow, None);
    }
}

impl<S: TypedSchema> TypedSchema for Array<S> {
    type Output = Vec<S::Output>;

    fn with_internals(&self, internals: TypeInternals) -> Self {
        Self {
            element: self.element.clone(),
            internals,
        }
    }
}

/// What an object does with keys its shape does not declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UnknownKeys {
    /// Drop them from the output.
    #[default]
    Strip,
    /// Keep them unvalidated.
    Passthrough,
    /// Report them as `unrecognized_keys`.
    Strict,
}

/// Keyed mapping with a fixed shape.
///
/// Fields validate in declaration order. A missing key is parsed as absent
/// input: optional fields (including defaults and prefaults) handle it
/// themselves, and an optional field that resolves to nothing is left out
/// of the output.
#[derive(Clone)]
pub struct Object {
    shape: Arc<Vec<(String, SchemaRef)>>,
    unknown_keys: UnknownKeys,
    internals: TypeInternals,
}

pub fn object() -> Object {
    Object {
        shape: Arc::new(Vec::new()),
        unknown_keys: UnknownKeys::default(),
        internals: TypeInternals::new(Kind::Object),
    }
}

impl Object {
    /// Declares `key`. Redeclaring a key replaces its schema in place.
    pub fn field<S: Schema>(&self, key: impl Into<String>, schema: S) -> Self {
        self.field_ref(key, Arc::new(schema))
    }

    pub fn field_ref(&self, key: impl Into<String>, schema: SchemaRef) -> Self {
        let key = key.into();
        let mut shape = self.shape.as_ref().clone();
        match shape.iter_mut().find(|(existing, _)| *existing == key) {
            Some(slot) => slot.1 = schema,
            None => shape.push((key, schema)),
        }
        Self {
            shape: Arc::new(shape),
            ..self.clone()
        }
    }

    /// Adds every field of `other`, replacing fields with the same key.
    pub fn extend(&self, other: &Object) -> Self {
        other
            .shape
            .iter()
            .fold(self.clone(), |acc, (key, schema)| {
                acc.field_ref(key.clone(), schema.clone())
            })
    }

    pub fn strict(&self) -> Self {
        self.with_unknown_keys(UnknownKeys::Strict)
    }

    pub fn passthrough(&self) -> Self {
        self.with_unknown_keys(UnknownKeys::Passthrough)
    }

    pub fn strip(&self) -> Self {
        self.with_unknown_keys(UnknownKeys::Strip)
    }

    fn with_unknown_keys(&self, unknown_keys: UnknownKeys) -> Self {
        Self {
            unknown_keys,
            ..self.clone()
        }
    }

    pub fn shape(&self) -> &[(String, SchemaRef)] {
        &self.shape
    }

    pub fn get(&self, key: &str) -> Option<&SchemaRef> {
        self.shape
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, schema)| schema)
    }

    pub fn unknown_keys(&self) -> UnknownKeys {
        self.unknown_keys
    }

    fn narrow_fields(
        &self,
        input: &Value,
        payload: &mut ParsePayload,
        state: &mut ParseState<'_>,
    ) -> Option<Value> {
        let map = input.as_object()?;
        let mut out = Map::new();

        for (key, schema) in self.shape.iter() {
            let present = map.get(key);
            let value = present.cloned().unwrap_or_default();
            let parsed = run_child(schema.as_ref(), payload, state, value, key.as_str().into());
            let omit = present.is_none() && parsed.is_null() && schema.internals().is_optional();
            if !omit {
                out.insert(key.clone(), parsed);
            }
        }

        let unknown: Vec<&String> = map
            .keys()
            .filter(|key| self.get(key).is_none())
            .collect();
        if !unknown.is_empty() {
            match self.unknown_keys {
                UnknownKeys::Strip => {
                    trace!(count = unknown.len(), "stripped unknown keys");
                }
                UnknownKeys::Passthrough => {
                    for key in unknown {
                        out.insert(key.clone(), map[key].clone());
                    }
                }
                UnknownKeys::Strict => {
                    let keys: Vec<String> = unknown.into_iter().cloned().collect();
                    let issue =
                        RawIssue::new(IssueCode::UnrecognizedKeys).with_property("keys", keys);
                    payload.report(&self.internals, input, issue);
                }
            }
        }

        Some(Value::Object(out))
    }
}

impl std::fmt::Debug for Object {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Object")
            .field(
                "shape",
                &self
                    .shape
                    .iter()
                    .map(|(key, schema)| (key.as_str(), schema.kind()))
                    .collect::<Vec<_>>(),
            )
            .field("unknown_keys", &self.unknown_keys)
            .field("internals", &self.internals)
            .finish()
    }
}

impl Schema for Object {
    fn internals(&self) -> &TypeInternals {
        &self.internals
    }

    fn run(&self, payload: &mut ParsePayload, state: &mut ParseState<'_>) {
        let narrow = |input: &Value,
                      payload: &mut ParsePayload,
                      state: &mut ParseState<'_>|
         -> Option<Value> { self.narrow_fields(input, payload, state) };
        parse_typed(&self.internals, payload, state, &narrow, None);
    }

    fn discriminator_values(&self, key: &str) -> Option<Vec<Value>> {
        self.get(key)?.literal_values()
    }
}

impl TypedSchema for Object {
    type Output = Map;

    fn with_internals(&self, internals: TypeInternals) -> Self {
        Self {
            internals,
            ..self.clone()
        }
    }
}

/// Keyed mapping with validated keys and uniformly typed values.
#[derive(Debug, Clone)]
pub struct Record<K, V> {
    key: K,
    value: V,
    internals: TypeInternals,
}

pub fn record<K: TypedSchema, V: TypedSchema>(key: K, value: V) -> Record<K, V> {
    Record {
        key,
        value,
        internals: TypeInternals::new(Kind::Record),
    }
}

impl<K: TypedSchema, V: TypedSchema> Record<K, V> {
    pub fn key_schema(&self) -> &K {
        &self.key
    }

    pub fn value_schema(&self) -> &V {
        &self.value
    }

    fn narrow_entries(
        &self,
        input: &Value,
        payload: &mut ParsePayload,
        state: &mut ParseState<'_>,
    ) -> Option<Value> {
        let map = input.as_object()?;
        let mut out = Map::new();

        for (key, value) in map {
            let segment = PathSegment::from(key.as_str());
            let mut key_attempt = payload.branch(Value::from(key.as_str()));
            self.key.run(&mut key_attempt, state);
            if !key_attempt.is_ok() {
                let issue = RawIssue::new(IssueCode::InvalidKey)
                    .with_property("origin", "record")
                    .with_branches(vec![key_attempt.issues])
                    .at([segment]);
                payload.report(&self.internals, &Value::from(key.as_str()), issue);
                continue;
            }
            let out_key = key_attempt
                .value
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| key.clone());
            let parsed = run_child(&self.value, payload, state, value.clone(), segment);
            out.insert(out_key, parsed);
        }

        Some(Value::Object(out))
    }
}

impl<K: TypedSchema, V: TypedSchema> Schema for Record<K, V> {
    fn internals(&self) -> &TypeInternals {
        &self.internals
    }

    fn run(&self, payload: &mut ParsePayload, state: &mut ParseState<'_>) {
        let narrow = |input: &Value,
                      payload: &mut ParsePayload,
                      state: &mut ParseState<'_>|
         -> Option<Value> { self.narrow_entries(input, payload, state) };
        parse_typed(&self.internals, payload, state, &narrow, None);
    }
}

impl<K: TypedSchema, V: TypedSchema> TypedSchema for Record<K, V> {
    type Output = std::collections::BTreeMap<String, V::Output>;

    fn with_internals(&self, internals: TypeInternals) -> Self {
        Self {
            key: self.key.clone(),
            value: self.value.clone(),
            internals,
        }
    }
}

/// Accepts the first member that accepts the input.
#[derive(Clone)]
pub struct Union {
    members: Arc<Vec<SchemaRef>>,
    internals: TypeInternals,
}

pub fn union(members: impl IntoIterator<Item = SchemaRef>) -> Union {
    Union {
        members: Arc::new(members.into_iter().collect()),
        internals: TypeInternals::new(Kind::Union),
    }
}

impl Union {
    pub fn members(&self) -> &[SchemaRef] {
        &self.members
    }
}

impl std::fmt::Debug for Union {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Union")
            .field(
                "members",
                &self.members.iter().map(|m| m.kind()).collect::<Vec<_>>(),
            )
            .field("internals", &self.internals)
            .finish()
    }
}

/// Collects the values every member reports, or `None` if any member
/// reports none.
fn collect_values<F>(members: &[SchemaRef], values_of: F) -> Option<Vec<Value>>
where
    F: Fn(&SchemaRef) -> Option<Vec<Value>>,
{
    let mut all = Vec::new();
    for member in members {
        all.extend(values_of(member)?);
    }
    Some(all)
}

impl Schema for Union {
    fn internals(&self) -> &TypeInternals {
        &self.internals
    }

    fn run(&self, payload: &mut ParsePayload, state: &mut ParseState<'_>) {
        if payload.value.is_null() && self.internals.tolerates_absent() {
            return;
        }
        let before = payload.issues.len();
        if let Err(branches) = linear_trial(&self.members, payload, state) {
            let input = payload.value.clone();
            let issue = RawIssue::new(IssueCode::InvalidUnion).with_branches(branches);
            payload.report(&self.internals, &input, issue);
            return;
        }
        finish_wrapped(&self.internals, payload, before);
    }

    fn literal_values(&self) -> Option<Vec<Value>> {
        collect_values(&self.members, |member| member.literal_values())
    }

    fn discriminator_values(&self, key: &str) -> Option<Vec<Value>> {
        collect_values(&self.members, |member| member.discriminator_values(key))
    }
}

impl TypedSchema for Union {
    type Output = Value;

    fn with_internals(&self, internals: TypeInternals) -> Self {
        Self {
            members: self.members.clone(),
            internals,
        }
    }
}

/// Accepts input both sides accept and merges their outputs.
#[derive(Clone)]
pub struct Intersection {
    left: SchemaRef,
    right: SchemaRef,
    internals: TypeInternals,
}

pub fn intersection<A: Schema, B: Schema>(left: A, right: B) -> Intersection {
    Intersection {
        left: Arc::new(left),
        right: Arc::new(right),
        internals: TypeInternals::new(Kind::Intersection),
    }
}

impl std::fmt::Debug for Intersection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Intersection")
            .field("left", &self.left.kind())
            .field("right", &self.right.kind())
            .field("internals", &self.internals)
            .finish()
    }
}

/// Merges two outputs of the same input. Objects merge key-wise, arrays
/// element-wise; anything else must be equal.
fn merge(left: Value, right: Value) -> Option<Value> {
    if left == right {
        return Some(left);
    }
    match (left, right) {
        (Value::Ref(shared), other) => merge(shared.get(), other),
        (other, Value::Ref(shared)) => merge(other, shared.get()),
        (Value::Object(mut a), Value::Object(b)) => {
            for (key, value) in b {
                let merged = match a.remove(&key) {
                    Some(existing) => merge(existing, value)?,
                    None => value,
                };
                a.insert(key, merged);
            }
            Some(Value::Object(a))
        }
        (Value::Array(a), Value::Array(b)) if a.len() == b.len() => a
            .into_iter()
            .zip(b)
            .map(|(x, y)| merge(x, y))
            .collect::<Option<Vec<_>>>()
            .map(Value::Array),
        _ => None,
    }
}

impl Schema for Intersection {
    fn internals(&self) -> &TypeInternals {
        &self.internals
    }

    fn run(&self, payload: &mut ParsePayload, state: &mut ParseState<'_>) {
        if payload.value.is_null() && self.internals.tolerates_absent() {
            return;
        }
        let input = payload.value.clone();
        let mut left = payload.branch(input.clone());
        let mut right = payload.branch(input.clone());
        self.left.run(&mut left, state);
        self.right.run(&mut right, state);

        let before = payload.issues.len();
        if !left.is_ok() || !right.is_ok() {
            payload.issues.append(&mut left.issues);
            payload.issues.append(&mut right.issues);
            return;
        }
        match merge(left.value, right.value) {
            Some(merged) => {
                payload.value = merged;
                finish_wrapped(&self.internals, payload, before);
            }
            None => {
                let issue = RawIssue::custom("Intersection results could not be merged");
                payload.report(&self.internals, &input, issue);
            }
        }
    }
}

impl TypedSchema for Intersection {
    type Output = Value;

    fn with_internals(&self, internals: TypeInternals) -> Self {
        Self {
            left: self.left.clone(),
            right: self.right.clone(),
            internals,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::primitives::{int, literal, string};
    use crate::types::format_path;
    use crate::value::Shared;
    use serde_json::json;

    #[test]
    fn array_reports_every_element() {
        let err = array(int()).parse(json!([1, "a", 3, "b"])).unwrap_err();
        let pointers: Vec<String> = err.issues.iter().map(|i| i.pointer()).collect();
        assert_eq!(pointers, vec!["/1", "/3"]);
    }

    #[test]
    fn array_checks_wait_for_elements() {
        let schema = array(int()).min(3);
        let err = schema.parse(json!(["x"])).unwrap_err();
        assert_eq!(err.codes(), vec![IssueCode::InvalidType]);
        assert_eq!(schema.parse(json!([1, 2, 3])).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn object_fields_validate_in_order() {
        let user = object().field("name", string()).field("age", int());
        let err = user.parse(json!({ "age": "old" })).unwrap_err();
        let pointers: Vec<String> = err.issues.iter().map(|i| format_path(&i.path)).collect();
        assert_eq!(pointers, vec!["/name", "/age"]);
    }

    #[test]
    fn optional_field_may_be_missing() {
        let user = object()
            .field("name", string())
            .field("nick", string().optional());
        let out = user.parse(json!({ "name": "ada" })).unwrap();
        assert!(!out.contains_key("nick"));
    }

    #[test]
    fn unknown_key_policies() {
        let shape = object().field("a", int());
        let input = json!({ "a": 1, "b": 2 });

        let stripped = shape.parse(input.clone()).unwrap();
        assert_eq!(stripped.keys().collect::<Vec<_>>(), vec!["a"]);

        let kept = shape.passthrough().parse(input.clone()).unwrap();
        assert_eq!(kept.get("b"), Some(&Value::Int(2)));

        let err = shape.strict().parse(input).unwrap_err();
        assert_eq!(err.codes(), vec![IssueCode::UnrecognizedKeys]);
        assert_eq!(err.issues[0].message, "Unrecognized key(s) in object: \"b\"");
    }

    #[test]
    fn extend_replaces_fields() {
        let base = object().field("a", int());
        let extended = base.extend(&object().field("a", string()).field("b", int()));
        assert_eq!(extended.shape().len(), 2);
        assert_eq!(extended.get("a").map(|s| s.kind()), Some(Kind::String));
        assert_eq!(base.get("a").map(|s| s.kind()), Some(Kind::Int));
    }

    #[test]
    fn object_reference_identity() {
        let mut map = Map::new();
        map.insert("a".into(), Value::Int(1));
        let shared = Shared::new(map);
        let schema = object().field("a", int());
        let out = schema
            .parse_value(&Value::Ref(shared.clone()), &Default::default())
            .unwrap();
        assert!(out.as_shared().unwrap().ptr_eq(&shared));
    }

    #[test]
    fn record_rejects_bad_keys() {
        let schema = record(string().min(2), int());
        let err = schema.parse(json!({ "ok": 1, "x": 2 })).unwrap_err();
        assert_eq!(err.codes(), vec![IssueCode::InvalidKey]);
        assert_eq!(err.issues[0].pointer(), "/x");
        assert_eq!(err.issues[0].branches[0][0].code, IssueCode::TooSmall);
    }

    #[test]
    fn union_takes_first_match() {
        let schema = union([string().boxed(), int().boxed()]);
        assert_eq!(schema.parse(3i64).unwrap(), Value::Int(3));

        let err = schema.parse(true).unwrap_err();
        assert_eq!(err.codes(), vec![IssueCode::InvalidUnion]);
        assert_eq!(err.issues[0].branches.len(), 2);
    }

    #[test]
    fn union_collects_literal_values() {
        let schema = union([literal("a").boxed(), literal("b").boxed()]);
        assert_eq!(
            schema.literal_values(),
            Some(vec![Value::from("a"), Value::from("b")])
        );
        assert_eq!(union([literal("a").boxed(), int().boxed()]).literal_values(), None);
    }

    #[test]
    fn intersection_merges_objects() {
        let schema = intersection(
            object().field("a", int()).passthrough(),
            object().field("b", string()).passthrough(),
        );
        let out = schema.parse(json!({ "a": 1, "b": "x" })).unwrap();
        assert_eq!(out.to_json(), json!({ "a": 1, "b": "x" }));
        assert!(schema.parse(json!({ "a": 1 })).is_err());
    }

    #[test]
    fn intersection_of_conflicting_scalars_fails() {
        let schema = intersection(int().transform(|n, _| Ok(n + 1)), int());
        let err = schema.parse(1i64).unwrap_err();
        assert_eq!(err.codes(), vec![IssueCode::Custom]);
    }
}
