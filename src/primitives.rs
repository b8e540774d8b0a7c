//! Scalar and special schemas.

use std::collections::BTreeSet;

use regex::Regex;

use crate::checks;
use crate::coerce;
use crate::error::{IssueCode, RawIssue, SchemaError};
use crate::parse::{parse_typed, ParsePayload, ParseState};
use crate::schema::{Schema, TypedSchema};
use crate::types::{Kind, TypeInternals, COERCE_KEY};
use crate::value::Value;

fn enable_coercion(internals: &TypeInternals) -> TypeInternals {
    internals.clone().with_metadata(COERCE_KEY, true.into())
}

/// Implements the schema traits for a schema struct whose only state is its
/// internals and whose narrowing is a plain function.
macro_rules! scalar_schema {
    ($ty:ident, $output:ty, $narrow:expr, $coerce:expr) => {
        impl Schema for $ty {
            fn internals(&self) -> &TypeInternals {
                &self.internals
            }

            fn run(&self, payload: &mut ParsePayload, state: &mut ParseState<'_>) {
                parse_typed(&self.internals, payload, state, &$narrow, $coerce);
            }
        }

        impl TypedSchema for $ty {
            type Output = $output;

            fn with_internals(&self, internals: TypeInternals) -> Self {
                Self { internals }
            }
        }
    };
}

fn narrow_string(value: &Value, _: &mut ParsePayload, _: &mut ParseState<'_>) -> Option<Value> {
    value.as_str().map(|_| value.clone())
}

fn narrow_int(value: &Value, _: &mut ParsePayload, _: &mut ParseState<'_>) -> Option<Value> {
    value.as_i64().map(|_| value.clone())
}

/// Ints are floats too. Non-finite floats are rejected.
fn narrow_float(value: &Value, _: &mut ParsePayload, _: &mut ParseState<'_>) -> Option<Value> {
    match value {
        Value::Int(_) => Some(value.clone()),
        Value::Float(f) if f.is_finite() => Some(value.clone()),
        _ => None,
    }
}

fn narrow_bool(value: &Value, _: &mut ParsePayload, _: &mut ParseState<'_>) -> Option<Value> {
    value.as_bool().map(|_| value.clone())
}

/// References go through the reference path so checks see the target.
fn narrow_anything(value: &Value, _: &mut ParsePayload, _: &mut ParseState<'_>) -> Option<Value> {
    match value {
        Value::Ref(_) => None,
        other => Some(other.clone()),
    }
}

fn narrow_nothing(_: &Value, _: &mut ParsePayload, _: &mut ParseState<'_>) -> Option<Value> {
    None
}

/// UTF-8 string schema. Lengths count characters.
#[derive(Debug, Clone)]
pub struct StringSchema {
    internals: TypeInternals,
}

pub fn string() -> StringSchema {
    StringSchema {
        internals: TypeInternals::new(Kind::String),
    }
}

impl StringSchema {
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

    pub fn regex(&self, pattern: Regex) -> Self {
        self.check(checks::regex(pattern))
    }

    /// Compiles `pattern` and attaches it. An invalid pattern is a
    /// construction error.
    pub fn pattern(&self, pattern: &str) -> Result<Self, SchemaError> {
        Ok(self.check(checks::try_regex(pattern)?))
    }

    pub fn starts_with(&self, prefix: impl Into<String>) -> Self {
        self.check(checks::starts_with(prefix))
    }

    pub fn ends_with(&self, suffix: impl Into<String>) -> Self {
        self.check(checks::ends_with(suffix))
    }

    pub fn includes(&self, needle: impl Into<String>) -> Self {
        self.check(checks::includes(needle))
    }

    /// Converts ints, floats and bools to their string form.
    pub fn coerce(&self) -> Self {
        self.with_internals(enable_coercion(&self.internals))
    }
}

scalar_schema!(StringSchema, String, narrow_string, Some(coerce::to_string));

/// 64-bit signed integer schema.
#[derive(Debug, Clone)]
pub struct IntSchema {
    internals: TypeInternals,
}

pub fn int() -> IntSchema {
    IntSchema {
        internals: TypeInternals::new(Kind::Int),
    }
}

impl IntSchema {
    pub fn min(&self, minimum: i64) -> Self {
        self.check(checks::gte(minimum))
    }

    pub fn max(&self, maximum: i64) -> Self {
        self.check(checks::lte(maximum))
    }

    pub fn gt(&self, bound: i64) -> Self {
        self.check(checks::gt(bound))
    }

    pub fn lt(&self, bound: i64) -> Self {
        self.check(checks::lt(bound))
    }

    pub fn positive(&self) -> Self {
        self.gt(0)
    }

    pub fn nonnegative(&self) -> Self {
        self.min(0)
    }

    pub fn negative(&self) -> Self {
        self.lt(0)
    }

    pub fn multiple_of(&self, divisor: i64) -> Self {
        self.check(checks::multiple_of(divisor))
    }

    /// Converts numeric strings, integral floats and bools.
    pub fn coerce(&self) -> Self {
        self.with_internals(enable_coercion(&self.internals))
    }
}

scalar_schema!(IntSchema, i64, narrow_int, Some(coerce::to_int));

/// Finite floating-point schema. Accepts ints.
#[derive(Debug, Clone)]
pub struct FloatSchema {
    internals: TypeInternals,
}

pub fn float() -> FloatSchema {
    FloatSchema {
        internals: TypeInternals::new(Kind::Float),
    }
}

impl FloatSchema {
    pub fn min(&self, minimum: f64) -> Self {
        self.check(checks::gte(minimum))
    }

    pub fn max(&self, maximum: f64) -> Self {
        self.check(checks::lte(maximum))
    }

    pub fn gt(&self, bound: f64) -> Self {
        self.check(checks::gt(bound))
    }

    pub fn lt(&self, bound: f64) -> Self {
        self.check(checks::lt(bound))
    }

    pub fn positive(&self) -> Self {
        self.gt(0.0)
    }

    pub fn multiple_of(&self, divisor: f64) -> Self {
        self.check(checks::multiple_of(divisor))
    }

    pub fn coerce(&self) -> Self {
        self.with_internals(enable_coercion(&self.internals))
    }
}

scalar_schema!(FloatSchema, f64, narrow_float, Some(coerce::to_float));

#[derive(Debug, Clone)]
pub struct BoolSchema {
    internals: TypeInternals,
}

pub fn boolean() -> BoolSchema {
    BoolSchema {
        internals: TypeInternals::new(Kind::Bool),
    }
}

impl BoolSchema {
    /// Converts truthy words (`"yes"`, `"off"`, ...) and numbers.
    pub fn coerce(&self) -> Self {
        self.with_internals(enable_coercion(&self.internals))
    }
}

scalar_schema!(BoolSchema, bool, narrow_bool, Some(coerce::to_bool));

/// Accepts every value, including absent input.
#[derive(Debug, Clone)]
pub struct AnySchema {
    internals: TypeInternals,
}

pub fn any() -> AnySchema {
    AnySchema {
        internals: absent_tolerant(Kind::Any),
    }
}

scalar_schema!(AnySchema, Value, narrow_anything, None);

/// Like [`any`], but named for inputs whose type is not yet known.
#[derive(Debug, Clone)]
pub struct UnknownSchema {
    internals: TypeInternals,
}

pub fn unknown() -> UnknownSchema {
    UnknownSchema {
        internals: absent_tolerant(Kind::Unknown),
    }
}

scalar_schema!(UnknownSchema, Value, narrow_anything, None);

fn absent_tolerant(kind: Kind) -> TypeInternals {
    let mut internals = TypeInternals::new(kind);
    internals.optional = true;
    internals.nilable = true;
    internals
}

/// Rejects every value.
#[derive(Debug, Clone)]
pub struct NeverSchema {
    internals: TypeInternals,
}

pub fn never() -> NeverSchema {
    NeverSchema {
        internals: TypeInternals::new(Kind::Never),
    }
}

scalar_schema!(NeverSchema, Value, narrow_nothing, None);

/// Accepts only null.
#[derive(Debug, Clone)]
pub struct NilSchema {
    internals: TypeInternals,
}

pub fn nil() -> NilSchema {
    let mut internals = TypeInternals::new(Kind::Nil);
    internals.nilable = true;
    NilSchema { internals }
}

impl Schema for NilSchema {
    fn internals(&self) -> &TypeInternals {
        &self.internals
    }

    fn run(&self, payload: &mut ParsePayload, state: &mut ParseState<'_>) {
        parse_typed(&self.internals, payload, state, &narrow_nothing, None);
    }

    fn literal_values(&self) -> Option<Vec<Value>> {
        Some(vec![Value::Null])
    }
}

impl TypedSchema for NilSchema {
    type Output = ();

    fn with_internals(&self, internals: TypeInternals) -> Self {
        Self { internals }
    }
}

/// Accepts exactly one value.
#[derive(Debug, Clone)]
pub struct Literal {
    value: Value,
    internals: TypeInternals,
}

pub fn literal(value: impl Into<Value>) -> Literal {
    let value = value.into();
    let mut internals = TypeInternals::new(Kind::Literal);
    internals.nilable = value.is_null();
    Literal { value, internals }
}

impl Literal {
    pub fn value(&self) -> &Value {
        &self.value
    }
}

impl Schema for Literal {
    fn internals(&self) -> &TypeInternals {
        &self.internals
    }

    fn run(&self, payload: &mut ParsePayload, state: &mut ParseState<'_>) {
        let expected = self.value.to_json();
        let narrow = |input: &Value,
                      payload: &mut ParsePayload,
                      _: &mut ParseState<'_>|
         -> Option<Value> {
            if matches!(input, Value::Ref(_)) {
                return None;
            }
            if *input != self.value {
                let issue = RawIssue::new(IssueCode::InvalidValue)
                    .with_property("values", vec![expected.clone()]);
                payload.report(&self.internals, input, issue);
            }
            Some(input.clone())
        };
        parse_typed(&self.internals, payload, state, &narrow, None);
    }

    fn literal_values(&self) -> Option<Vec<Value>> {
        Some(vec![self.value.clone()])
    }
}

impl TypedSchema for Literal {
    type Output = Value;

    fn with_internals(&self, internals: TypeInternals) -> Self {
        Self {
            value: self.value.clone(),
            internals,
        }
    }
}

/// Accepts one of a fixed set of strings.
#[derive(Debug, Clone)]
pub struct Enumeration {
    options: Vec<String>,
    lookup: BTreeSet<String>,
    internals: TypeInternals,
}

pub fn enumeration<I, T>(options: I) -> Enumeration
where
    I: IntoIterator<Item = T>,
    T: Into<String>,
{
    let options: Vec<String> = options.into_iter().map(Into::into).collect();
    Enumeration {
        lookup: options.iter().cloned().collect(),
        options,
        internals: TypeInternals::new(Kind::Enum),
    }
}

impl Enumeration {
    /// Options in declaration order.
    pub fn options(&self) -> &[String] {
        &self.options
    }
}

impl Schema for Enumeration {
    fn internals(&self) -> &TypeInternals {
        &self.internals
    }

    fn run(&self, payload: &mut ParsePayload, state: &mut ParseState<'_>) {
        let narrow = |input: &Value,
                      payload: &mut ParsePayload,
                      _: &mut ParseState<'_>|
         -> Option<Value> {
            let s = input.as_str()?;
            if !self.lookup.contains(s) {
                let issue = RawIssue::new(IssueCode::InvalidValue)
                    .with_property("values", self.options.clone());
                payload.report(&self.internals, input, issue);
            }
            Some(input.clone())
        };
        parse_typed(&self.internals, payload, state, &narrow, None);
    }

    fn literal_values(&self) -> Option<Vec<Value>> {
        Some(self.options.iter().map(|o| Value::from(o.as_str())).collect())
    }
}

impl TypedSchema for Enumeration {
    type Output = String;

    fn with_internals(&self, internals: TypeInternals) -> Self {
        Self {
            options: self.options.clone(),
            lookup: self.lookup.clone(),
            internals,
        }
    }
}
