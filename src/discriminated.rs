//! Discriminated unions: O(1) dispatch on a tag field.
//!
//! The tag values each member accepts are extracted once, when the union is
//! built, by asking the member for the literal values of the tag field. The
//! walk descends through wrappers, plain unions and nested discriminated
//! unions. It never forces a lazy schema.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace};

use crate::composite::linear_trial;
use crate::error::{IssueCode, RawIssue, SchemaError};
use crate::parse::{parse_typed, ParsePayload, ParseState};
use crate::schema::{Schema, SchemaRef, TypedSchema};
use crate::types::{Kind, PathSegment, TypeInternals};
use crate::value::Value;

/// A tag value usable as a dispatch key.
///
/// Integral floats key as ints so `1` and `1.0` select the same member.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DiscriminatorValue {
    Null,
    Bool(bool),
    Int(i64),
    String(String),
}

impl DiscriminatorValue {
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::Null),
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Int(i) => Some(Self::Int(*i)),
            Value::Float(f) if f.fract() == 0.0 && f.abs() < i64::MAX as f64 => {
                Some(Self::Int(*f as i64))
            }
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Ref(shared) => Self::from_value(&shared.get()),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::Int(*i),
            Self::String(s) => Value::String(s.clone()),
        }
    }
}

impl fmt::Display for DiscriminatorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_value())
    }
}

/// Union of object schemas selected by the value of one key.
#[derive(Clone)]
pub struct DiscriminatedUnion {
    key: String,
    members: Arc<Vec<SchemaRef>>,
    map: Arc<HashMap<DiscriminatorValue, usize>>,
    fallback: bool,
    internals: TypeInternals,
}

/// Builds a discriminated union over `members`, keyed on `key`.
///
/// Fails if a member declares no literal value for `key`, if two members
/// claim the same value, or if a value cannot be used as a lookup key.
///
/// ```
/// use valschema::{discriminated_union, literal, float, object, TypedSchema};
///
/// let shape = discriminated_union(
///     "kind",
///     [
///         object().field("kind", literal("circle")).field("radius", float()).boxed(),
///         object().field("kind", literal("square")).field("side", float()).boxed(),
///     ],
/// )
/// .unwrap();
///
/// assert!(shape.parse(serde_json::json!({ "kind": "square", "side": 2 })).is_ok());
/// assert!(shape.parse(serde_json::json!({ "kind": "hexagon" })).is_err());
/// ```
pub fn discriminated_union(
    key: impl Into<String>,
    members: impl IntoIterator<Item = SchemaRef>,
) -> Result<DiscriminatedUnion, SchemaError> {
    let key = key.into();
    let members: Vec<SchemaRef> = members.into_iter().collect();
    let mut map: HashMap<DiscriminatorValue, usize> = HashMap::new();

    for (index, member) in members.iter().enumerate() {
        let values = member
            .discriminator_values(&key)
            .filter(|values| !values.is_empty())
            .ok_or_else(|| SchemaError::MissingDiscriminator {
                index,
                key: key.clone(),
            })?;
        for value in values {
            let tag = DiscriminatorValue::from_value(&value).ok_or_else(|| {
                SchemaError::UnsupportedDiscriminator {
                    key: key.clone(),
                    value: value.to_string(),
                }
            })?;
            match map.get(&tag) {
                Some(&first) if first != index => {
                    return Err(SchemaError::DuplicateDiscriminator {
                        key: key.clone(),
                        value: tag.to_string(),
                        first,
                        second: index,
                    });
                }
                Some(_) => {}
                None => {
                    map.insert(tag, index);
                }
            }
        }
    }

    debug!(
        key = %key,
        members = members.len(),
        values = map.len(),
        "built discriminator map"
    );
    Ok(DiscriminatedUnion {
        key,
        members: Arc::new(members),
        map: Arc::new(map),
        fallback: false,
        internals: TypeInternals::new(Kind::DiscriminatedUnion),
    })
}

impl DiscriminatedUnion {
    /// When set, input whose tag is missing or unknown is tried against every
    /// member in order instead of failing immediately.
    pub fn fallback(&self, enabled: bool) -> Self {
        Self {
            fallback: enabled,
            ..self.clone()
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn members(&self) -> &[SchemaRef] {
        &self.members
    }

    /// Tag value to member index.
    pub fn discriminator_map(&self) -> &HashMap<DiscriminatorValue, usize> {
        &self.map
    }

    pub fn member_for(&self, tag: &Value) -> Option<&SchemaRef> {
        let tag = DiscriminatorValue::from_value(tag)?;
        self.map.get(&tag).map(|&index| &self.members[index])
    }

    fn sorted_options(&self) -> Vec<serde_json::Value> {
        let mut tags: Vec<&DiscriminatorValue> = self.map.keys().collect();
        tags.sort();
        tags.into_iter().map(|tag| tag.to_value().to_json()).collect()
    }

    fn dispatch(
        &self,
        input: &Value,
        payload: &mut ParsePayload,
        state: &mut ParseState<'_>,
    ) -> Option<Value> {
        let map = input.as_object()?;
        let tag = map.get(&self.key).cloned().unwrap_or_default();

        if let Some(member) = self.member_for(&tag) {
            let mut attempt = payload.branch(input.clone());
            member.run(&mut attempt, state);
            payload.issues.append(&mut attempt.issues);
            return Some(attempt.value);
        }

        if self.fallback {
            let mut attempt = payload.branch(input.clone());
            trace!(key = %self.key, "unknown discriminator, trying every member");
            match linear_trial(&self.members, &mut attempt, state) {
                Ok(()) => return Some(attempt.value),
                Err(branches) => {
                    let issue = RawIssue::new(IssueCode::InvalidUnion).with_branches(branches);
                    payload.report(&self.internals, input, issue);
                    return Some(input.clone());
                }
            }
        }

        let issue = RawIssue::new(IssueCode::InvalidUnion)
            .with_property("discriminator", self.key.as_str())
            .with_property("options", self.sorted_options())
            .at([PathSegment::from(self.key.as_str())]);
        payload.report(&self.internals, &tag, issue);
        Some(input.clone())
    }
}

impl fmt::Debug for DiscriminatedUnion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscriminatedUnion")
            .field("key", &self.key)
            .field("members", &self.members.len())
            .field("options", &self.sorted_options())
            .field("fallback", &self.fallback)
            .field("internals", &self.internals)
            .finish()
    }
}

impl Schema for DiscriminatedUnion {
    fn internals(&self) -> &TypeInternals {
        &self.internals
    }

    fn run(&self, payload: &mut ParsePayload, state: &mut ParseState<'_>) {
        let narrow = |input: &Value,
                      payload: &mut ParsePayload,
                      state: &mut ParseState<'_>|
         -> Option<Value> { self.dispatch(input, payload, state) };
        parse_typed(&self.internals, payload, state, &narrow, None);
    }

    fn discriminator_values(&self, key: &str) -> Option<Vec<Value>> {
        if key == self.key {
            let mut tags: Vec<&DiscriminatorValue> = self.map.keys().collect();
            tags.sort();
            return Some(tags.into_iter().map(DiscriminatorValue::to_value).collect());
        }
        let mut all = Vec::new();
        for member in self.members.iter() {
            all.extend(member.discriminator_values(key)?);
        }
        Some(all)
    }
}

impl TypedSchema for DiscriminatedUnion {
    type Output = Value;

    fn with_internals(&self, internals: TypeInternals) -> Self {
        Self {
            internals,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composite::{object, union};
    use crate::primitives::{enumeration, float, int, literal, string};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn shapes() -> DiscriminatedUnion {
        discriminated_union(
            "kind",
            [
                object()
                    .field("kind", literal("circle"))
                    .field("radius", float())
                    .boxed(),
                object()
                    .field("kind", enumeration(["square", "box"]))
                    .field("side", float())
                    .boxed(),
            ],
        )
        .unwrap()
    }

    #[test]
    fn map_is_built_at_construction() {
        let schema = shapes();
        let map = schema.discriminator_map();
        assert_eq!(map.len(), 3);
        assert_eq!(map[&DiscriminatorValue::String("box".into())], 1);
    }

    #[test]
    fn dispatches_to_the_matching_member() {
        let schema = shapes();
        assert!(schema.parse(json!({ "kind": "box", "side": 1.5 })).is_ok());

        let err = schema.parse(json!({ "kind": "circle", "side": 1 })).unwrap_err();
        assert_eq!(err.issues.len(), 1);
        assert_eq!(err.issues[0].pointer(), "/radius");
    }

    #[test]
    fn unknown_tag_reports_at_the_key() {
        let err = shapes().parse(json!({ "kind": "hexagon" })).unwrap_err();
        assert_eq!(err.codes(), vec![IssueCode::InvalidUnion]);
        assert_eq!(err.issues[0].pointer(), "/kind");
        assert_eq!(
            err.issues[0].properties["options"],
            json!(["box", "circle", "square"])
        );

        let err = shapes().parse(json!({})).unwrap_err();
        assert_eq!(err.issues[0].pointer(), "/kind");
    }

    #[test]
    fn non_matching_member_checks_never_run() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let counted = object()
            .field("kind", literal("b"))
            .refine(
                move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    true
                },
                "never",
            );
        let schema = discriminated_union(
            "kind",
            [object().field("kind", literal("a")).boxed(), counted.boxed()],
        )
        .unwrap();

        schema.parse(json!({ "kind": "a" })).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        schema.parse(json!({ "kind": "b" })).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fallback_tries_every_member() {
        let schema = discriminated_union(
            "type",
            [
                object().field("type", literal("a")).field("x", int()).boxed(),
                object().field("type", literal("b").optional()).field("y", string()).boxed(),
            ],
        )
        .unwrap()
        .fallback(true);

        assert!(schema.parse(json!({ "y": "hi" })).is_ok());
        let err = schema.parse(json!({ "z": 1 })).unwrap_err();
        assert_eq!(err.codes(), vec![IssueCode::InvalidUnion]);
        assert_eq!(err.issues[0].branches.len(), 2);
    }

    #[test]
    fn construction_errors() {
        let missing = discriminated_union("kind", [object().field("kind", string()).boxed()]);
        assert!(matches!(missing, Err(SchemaError::MissingDiscriminator { index: 0, .. })));

        let duplicate = discriminated_union(
            "kind",
            [
                object().field("kind", literal("a")).boxed(),
                object().field("kind", literal("a")).boxed(),
            ],
        );
        assert!(matches!(
            duplicate,
            Err(SchemaError::DuplicateDiscriminator { first: 0, second: 1, .. })
        ));

        let unsupported =
            discriminated_union("kind", [object().field("kind", literal(1.5)).boxed()]);
        assert!(matches!(
            unsupported,
            Err(SchemaError::UnsupportedDiscriminator { .. })
        ));
    }

    #[test]
    fn values_found_through_unions_and_nesting() {
        let inner = discriminated_union(
            "kind",
            [
                object().field("kind", literal("a")).boxed(),
                object().field("kind", literal("b")).boxed(),
            ],
        )
        .unwrap();
        let outer = discriminated_union(
            "kind",
            [
                inner.boxed(),
                union([
                    object().field("kind", literal("c")).boxed(),
                    object().field("kind", literal(3i64)).boxed(),
                ])
                .boxed(),
            ],
        )
        .unwrap();
        assert_eq!(outer.discriminator_map().len(), 4);
        assert!(outer.member_for(&Value::Float(3.0)).is_some());
        assert!(outer.parse(json!({ "kind": 3 })).is_ok());
    }
}
