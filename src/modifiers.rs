//! Modifier algebra: schemas that wrap another schema.
//!
//! Every wrapper owns a copy of its inner schema and its own internals, so
//! wrapping never changes a previously built schema.

use std::marker::PhantomData;
use std::sync::Arc;

use tracing::trace;

use crate::check::RefinementCtx;
use crate::error::RawIssue;
use crate::parse::{finish_wrapped, ParsePayload, ParseState};
use crate::schema::{Schema, TypedSchema};
use crate::types::{Kind, TypeInternals};
use crate::value::{FromValue, Value};

/// Substitute value for [`WithDefault`] and [`Prefault`].
#[derive(Clone)]
pub(crate) enum Fallback {
    Value(Value),
    Func(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl Fallback {
    pub(crate) fn from_fn<T, F>(f: F) -> Self
    where
        T: Into<Value>,
        F: Fn() -> T + Send + Sync + 'static,
    {
        Fallback::Func(Arc::new(move || f().into()))
    }

    fn produce(&self) -> Value {
        match self {
            Fallback::Value(value) => value.clone(),
            Fallback::Func(f) => f(),
        }
    }
}

/// Runs `inner`, then the wrapper's own checks if `inner` succeeded.
fn delegate(
    internals: &TypeInternals,
    inner: &dyn Schema,
    payload: &mut ParsePayload,
    state: &mut ParseState<'_>,
) {
    let before = payload.issues.len();
    inner.run(payload, state);
    finish_wrapped(internals, payload, before);
}

/// Accepts absent input; present input is fully delegated.
#[derive(Clone)]
pub struct Optional<S> {
    inner: S,
    internals: TypeInternals,
}

impl<S: TypedSchema> Optional<S> {
    pub(crate) fn new(inner: &S, nilable: bool) -> Self {
        let mut flagged = inner.internals().clone();
        flagged.optional = true;
        flagged.nilable |= nilable;

        let mut internals = TypeInternals::new(Kind::Optional);
        internals.optional = true;
        internals.nilable = nilable;
        Self {
            inner: inner.with_internals(flagged),
            internals,
        }
    }

    pub fn unwrap(&self) -> &S {
        &self.inner
    }
}

impl<S: TypedSchema> Schema for Optional<S> {
    fn internals(&self) -> &TypeInternals {
        &self.internals
    }

    fn run(&self, payload: &mut ParsePayload, state: &mut ParseState<'_>) {
        if payload.value.is_null() {
            return;
        }
        delegate(&self.internals, &self.inner, payload, state);
    }

    fn literal_values(&self) -> Option<Vec<Value>> {
        self.inner.literal_values()
    }

    fn discriminator_values(&self, key: &str) -> Option<Vec<Value>> {
        self.inner.discriminator_values(key)
    }
}

impl<S: TypedSchema> TypedSchema for Optional<S> {
    type Output = Option<S::Output>;

    fn with_internals(&self, internals: TypeInternals) -> Self {
        Self {
            inner: self.inner.clone(),
            internals,
        }
    }
}

/// Accepts an explicit null; present input is fully delegated.
#[derive(Clone)]
pub struct Nilable<S> {
    inner: S,
    internals: TypeInternals,
}

impl<S: TypedSchema> Nilable<S> {
    pub(crate) fn new(inner: &S) -> Self {
        let mut flagged = inner.internals().clone();
        flagged.nilable = true;

        let mut internals = TypeInternals::new(Kind::Nilable);
        internals.nilable = true;
        Self {
            inner: inner.with_internals(flagged),
            internals,
        }
    }

    pub fn unwrap(&self) -> &S {
        &self.inner
    }
}

impl<S: TypedSchema> Schema for Nilable<S> {
    fn internals(&self) -> &TypeInternals {
        &self.internals
    }

    fn run(&self, payload: &mut ParsePayload, state: &mut ParseState<'_>) {
        if payload.value.is_null() {
            return;
        }
        delegate(&self.internals, &self.inner, payload, state);
    }

    fn literal_values(&self) -> Option<Vec<Value>> {
        self.inner.literal_values()
    }

    fn discriminator_values(&self, key: &str) -> Option<Vec<Value>> {
        self.inner.discriminator_values(key)
    }
}

impl<S: TypedSchema> TypedSchema for Nilable<S> {
    type Output = Option<S::Output>;

    fn with_internals(&self, internals: TypeInternals) -> Self {
        Self {
            inner: self.inner.clone(),
            internals,
        }
    }
}

/// Substitutes a value for absent input, then validates it with the inner
/// schema.
#[derive(Clone)]
pub struct WithDefault<S> {
    inner: S,
    internals: TypeInternals,
    fallback: Fallback,
}

impl<S: TypedSchema> WithDefault<S> {
    pub(crate) fn new(inner: &S, fallback: Fallback) -> Self {
        let mut internals = TypeInternals::new(Kind::Default);
        internals.optional = true;
        Self {
            inner: inner.clone(),
            internals,
            fallback,
        }
    }

    pub fn unwrap(&self) -> &S {
        &self.inner
    }
}

impl<S: TypedSchema> Schema for WithDefault<S> {
    fn internals(&self) -> &TypeInternals {
        &self.internals
    }

    fn run(&self, payload: &mut ParsePayload, state: &mut ParseState<'_>) {
        if payload.value.is_null() {
            payload.value = self.fallback.produce();
            trace!("absent input replaced by default");
        }
        delegate(&self.internals, &self.inner, payload, state);
    }

    fn literal_values(&self) -> Option<Vec<Value>> {
        self.inner.literal_values()
    }

    fn discriminator_values(&self, key: &str) -> Option<Vec<Value>> {
        self.inner.discriminator_values(key)
    }
}

impl<S: TypedSchema> TypedSchema for WithDefault<S> {
    type Output = S::Output;

    fn with_internals(&self, internals: TypeInternals) -> Self {
        Self {
            inner: self.inner.clone(),
            internals,
            fallback: self.fallback.clone(),
        }
    }
}

/// Runs the inner schema; if it fails for any reason, returns the fallback
/// without validating it.
#[derive(Clone)]
pub struct Prefault<S> {
    inner: S,
    internals: TypeInternals,
    fallback: Fallback,
}

impl<S: TypedSchema> Prefault<S> {
    pub(crate) fn new(inner: &S, fallback: Fallback) -> Self {
        let mut internals = TypeInternals::new(Kind::Prefault);
        internals.optional = true;
        Self {
            inner: inner.clone(),
            internals,
            fallback,
        }
    }

    pub fn unwrap(&self) -> &S {
        &self.inner
    }
}

impl<S: TypedSchema> Schema for Prefault<S> {
    fn internals(&self) -> &TypeInternals {
        &self.internals
    }

    fn run(&self, payload: &mut ParsePayload, state: &mut ParseState<'_>) {
        let mut attempt = payload.branch(payload.value.clone());
        self.inner.run(&mut attempt, state);
        if attempt.is_ok() {
            let before = payload.issues.len();
            payload.value = attempt.value;
            finish_wrapped(&self.internals, payload, before);
        } else {
            trace!(
                discarded = attempt.issues.len(),
                "inner schema failed, using prefault"
            );
            payload.value = self.fallback.produce();
        }
    }

    fn literal_values(&self) -> Option<Vec<Value>> {
        self.inner.literal_values()
    }

    fn discriminator_values(&self, key: &str) -> Option<Vec<Value>> {
        self.inner.discriminator_values(key)
    }
}

impl<S: TypedSchema> TypedSchema for Prefault<S> {
    type Output = S::Output;

    fn with_internals(&self, internals: TypeInternals) -> Self {
        Self {
            inner: self.inner.clone(),
            internals,
            fallback: self.fallback.clone(),
        }
    }
}

/// Two-stage composition: the output of `first` is the input of `second`.
#[derive(Clone)]
pub struct Pipe<A, B> {
    first: A,
    second: B,
    internals: TypeInternals,
}

impl<A: TypedSchema, B: TypedSchema> Pipe<A, B> {
    pub(crate) fn new(first: &A, second: &B) -> Self {
        Self {
            first: first.clone(),
            second: second.clone(),
            internals: TypeInternals::new(Kind::Pipe),
        }
    }

    pub fn first(&self) -> &A {
        &self.first
    }

    pub fn second(&self) -> &B {
        &self.second
    }
}

impl<A: TypedSchema, B: TypedSchema> Schema for Pipe<A, B> {
    fn internals(&self) -> &TypeInternals {
        &self.internals
    }

    fn run(&self, payload: &mut ParsePayload, state: &mut ParseState<'_>) {
        if payload.value.is_null() && self.internals.tolerates_absent() {
            return;
        }
        let before = payload.issues.len();
        self.first.run(payload, state);
        if payload.issues.len() != before {
            return;
        }
        delegate(&self.internals, &self.second, payload, state);
    }
}

impl<A: TypedSchema, B: TypedSchema> TypedSchema for Pipe<A, B> {
    type Output = B::Output;

    fn with_internals(&self, internals: TypeInternals) -> Self {
        Self {
            first: self.first.clone(),
            second: self.second.clone(),
            internals,
        }
    }
}

type TransformFn<T, U> = Arc<dyn Fn(T, &mut RefinementCtx) -> Result<U, String> + Send + Sync>;

/// Second stage of a transform: maps a typed value to a new value.
pub struct Transformer<T, U> {
    func: TransformFn<T, U>,
    internals: TypeInternals,
    _types: PhantomData<fn(T) -> U>,
}

impl<T, U> Transformer<T, U> {
    pub(crate) fn new<F>(f: F) -> Self
    where
        F: Fn(T, &mut RefinementCtx) -> Result<U, String> + Send + Sync + 'static,
    {
        Self {
            func: Arc::new(f),
            internals: TypeInternals::new(Kind::Transform),
            _types: PhantomData,
        }
    }
}

impl<T, U> Clone for Transformer<T, U> {
    fn clone(&self) -> Self {
        Self {
            func: self.func.clone(),
            internals: self.internals.clone(),
            _types: PhantomData,
        }
    }
}

impl<T, U> Schema for Transformer<T, U>
where
    T: FromValue + 'static,
    U: FromValue + Into<Value> + 'static,
{
    fn internals(&self) -> &TypeInternals {
        &self.internals
    }

    fn run(&self, payload: &mut ParsePayload, _state: &mut ParseState<'_>) {
        let input = std::mem::take(&mut payload.value);
        let Some(typed) = T::from_value(&input) else {
            let issue = RawIssue::invalid_type("transform input", input.type_name());
            payload.report(&self.internals, &input, issue);
            payload.value = input;
            return;
        };

        let before = payload.issues.len();
        let mut ctx = RefinementCtx::new();
        let result = (self.func)(typed, &mut ctx);
        for issue in ctx.into_issues() {
            payload.report(&self.internals, &input, issue);
        }
        match result {
            Ok(output) if payload.issues.len() == before => {
                payload.value = output.into();
                finish_wrapped(&self.internals, payload, before);
            }
            Ok(_) => payload.value = input,
            Err(message) => {
                payload.report(&self.internals, &input, RawIssue::custom(message));
                payload.value = input;
            }
        }
    }
}

impl<T, U> TypedSchema for Transformer<T, U>
where
    T: FromValue + 'static,
    U: FromValue + Into<Value> + 'static,
{
    type Output = U;

    fn with_internals(&self, internals: TypeInternals) -> Self {
        Self {
            func: self.func.clone(),
            internals,
            _types: PhantomData,
        }
    }
}
