//! The schema capability traits.
//!
//! [`Schema`] is the object-safe core every kind implements: internals
//! access and the payload-level `run` step. [`TypedSchema`] adds the static
//! output type, the typed parse entry points and the modifier algebra.
//! Composite schemas hold their children as [`SchemaRef`] so that members of
//! different types can live side by side.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::check::{Check, RefinementCtx};
use crate::config::ParseContext;
use crate::error::{IssueCode, RawIssue, ValidationError};
use crate::modifiers::{Fallback, Nilable, Optional, Pipe, Prefault, Transformer, WithDefault};
use crate::parse::{ParsePayload, ParseState};
use crate::types::{Kind, TypeInternals, DESCRIPTION_KEY};
use crate::value::{FromValue, Value};

/// Type-erased schema handle.
pub type SchemaRef = Arc<dyn Schema>;

/// Object-safe schema capability.
pub trait Schema: Send + Sync + 'static {
    fn internals(&self) -> &TypeInternals;

    /// Parses `payload.value` in place, appending issues to the payload.
    fn run(&self, payload: &mut ParsePayload, state: &mut ParseState<'_>);

    fn kind(&self) -> Kind {
        self.internals().kind()
    }

    /// Values this schema accepts when it accepts a fixed set (literals and
    /// enums, possibly wrapped). Used to build discriminator maps.
    fn literal_values(&self) -> Option<Vec<Value>> {
        None
    }

    /// Legal values of the `key` field for keyed schemas.
    fn discriminator_values(&self, _key: &str) -> Option<Vec<Value>> {
        None
    }

    /// Parses a dynamic value. References that pass validation unchanged are
    /// returned as the same reference.
    fn parse_value(&self, input: &Value, ctx: &ParseContext) -> Result<Value, ValidationError> {
        trace!(kind = %self.kind(), "parse start");
        let mut state = ParseState::new(ctx);
        let mut payload = ParsePayload::new(input.clone());
        self.run(&mut payload, &mut state);
        if payload.is_ok() {
            trace!(kind = %self.kind(), "parse ok");
            Ok(payload.value)
        } else {
            debug!(
                kind = %self.kind(),
                issues = payload.issues.len(),
                "parse failed"
            );
            Err(ValidationError::from_raw(payload.issues, ctx))
        }
    }
}

impl Schema for SchemaRef {
    fn internals(&self) -> &TypeInternals {
        self.as_ref().internals()
    }

    fn run(&self, payload: &mut ParsePayload, state: &mut ParseState<'_>) {
        self.as_ref().run(payload, state)
    }

    fn literal_values(&self) -> Option<Vec<Value>> {
        self.as_ref().literal_values()
    }

    fn discriminator_values(&self, key: &str) -> Option<Vec<Value>> {
        self.as_ref().discriminator_values(key)
    }
}

/// A schema with a static output type.
///
/// Modifiers never mutate the receiver: each returns a new schema whose
/// internals are a copy of the receiver's.
pub trait TypedSchema: Schema + Clone + Sized {
    /// The Rust type produced by a successful parse.
    type Output: FromValue + 'static;

    /// Returns a copy of this schema carrying `internals`.
    fn with_internals(&self, internals: TypeInternals) -> Self;

    fn parse(&self, input: impl Into<Value>) -> Result<Self::Output, ValidationError> {
        self.parse_with(input, &ParseContext::default())
    }

    fn parse_with(
        &self,
        input: impl Into<Value>,
        ctx: &ParseContext,
    ) -> Result<Self::Output, ValidationError> {
        let value = self.parse_value(&input.into(), ctx)?;
        Self::Output::from_value(&value).ok_or_else(|| {
            let issue = RawIssue::invalid_type(self.kind().as_str(), value.type_name())
                .with_input(value);
            ValidationError::from_raw(vec![issue], ctx)
        })
    }

    /// Parses `input`, panicking on failure. For call sites where validity is
    /// already established.
    fn must_parse(&self, input: impl Into<Value>) -> Self::Output {
        match self.parse(input) {
            Ok(output) => output,
            Err(err) => {
                let details: Vec<String> = err.issues.iter().map(ToString::to_string).collect();
                panic!("{}: {}", err, details.join("; "))
            }
        }
    }

    /// Erases the static type for use inside composite schemas.
    fn boxed(&self) -> SchemaRef {
        Arc::new(self.clone())
    }

    /// Attaches a check. This is the hook external schema builders use.
    fn check(&self, check: Check) -> Self {
        self.with_internals(self.internals().clone().with_check(check))
    }

    /// Attaches a predicate over the typed output; failures report `custom`
    /// issues with `message`.
    fn refine<F>(&self, predicate: F, message: impl Into<String>) -> Self
    where
        F: Fn(&Self::Output) -> bool + Send + Sync + 'static,
    {
        let check = Check::new("refine", move |value, ctx| {
            if let Some(output) = Self::Output::from_value(value) {
                if !predicate(&output) {
                    ctx.add_issue(RawIssue::new(IssueCode::Custom));
                }
            }
        });
        self.check(check.with_message(message))
    }

    /// Attaches a refinement that may raise any number of issues.
    fn super_refine<F>(&self, refinement: F) -> Self
    where
        F: Fn(&Self::Output, &mut RefinementCtx) + Send + Sync + 'static,
    {
        self.check(Check::new("super_refine", move |value, ctx| {
            if let Some(output) = Self::Output::from_value(value) {
                refinement(&output, ctx);
            }
        }))
    }

    fn describe(&self, description: impl Into<String>) -> Self {
        let description: String = description.into();
        self.with_internals(
            self.internals()
                .clone()
                .with_metadata(DESCRIPTION_KEY, description.into()),
        )
    }

    /// Sets the schema-level message resolver.
    fn error<F>(&self, resolver: F) -> Self
    where
        F: Fn(&RawIssue) -> Option<String> + Send + Sync + 'static,
    {
        let mut internals = self.internals().clone();
        internals.error = Some(Arc::new(resolver));
        self.with_internals(internals)
    }

    /// Accepts absent input (missing field or null).
    fn optional(&self) -> Optional<Self> {
        Optional::new(self, false)
    }

    /// Accepts an explicit null.
    fn nilable(&self) -> Nilable<Self> {
        Nilable::new(self)
    }

    /// Optional and nilable at once.
    fn nullish(&self) -> Optional<Self> {
        Optional::new(self, true)
    }

    /// Substitutes `value` for absent input before validating it.
    fn default(&self, value: Self::Output) -> WithDefault<Self>
    where
        Self::Output: Into<Value>,
    {
        WithDefault::new(self, Fallback::Value(value.into()))
    }

    /// Substitutes `f()` for absent input before validating it. `f` runs once
    /// per absent occurrence.
    fn default_fn<F>(&self, f: F) -> WithDefault<Self>
    where
        F: Fn() -> Self::Output + Send + Sync + 'static,
        Self::Output: Into<Value>,
    {
        WithDefault::new(self, Fallback::from_fn(f))
    }

    /// Returns `value`, unvalidated, whenever this schema fails.
    fn prefault(&self, value: Self::Output) -> Prefault<Self>
    where
        Self::Output: Into<Value>,
    {
        Prefault::new(self, Fallback::Value(value.into()))
    }

    fn prefault_fn<F>(&self, f: F) -> Prefault<Self>
    where
        F: Fn() -> Self::Output + Send + Sync + 'static,
        Self::Output: Into<Value>,
    {
        Prefault::new(self, Fallback::from_fn(f))
    }

    /// Maps the validated output to a new value. Returning `Err` or adding
    /// issues to the context fails the parse.
    fn transform<U, F>(&self, f: F) -> Pipe<Self, Transformer<Self::Output, U>>
    where
        U: FromValue + Into<Value> + 'static,
        F: Fn(Self::Output, &mut RefinementCtx) -> Result<U, String> + Send + Sync + 'static,
    {
        Pipe::new(self, &Transformer::new(f))
    }

    /// Feeds this schema's output into `next`.
    fn pipe<B: TypedSchema>(&self, next: B) -> Pipe<Self, B> {
        Pipe::new(self, &next)
    }
}
