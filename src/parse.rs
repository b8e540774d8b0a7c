//! The generic parse algorithm shared by every concrete schema.

use std::collections::HashSet;

use tracing::trace;

use crate::check::run_checks;
use crate::config::ParseContext;
use crate::error::RawIssue;
use crate::types::{PathSegment, TypeInternals};
use crate::value::{Shared, Value};

/// Per-attempt parse state: the value, its path from the root and the issues
/// collected so far.
///
/// A fresh payload is created for every attempt, including each collection
/// element and each union alternative, so issues never leak between attempts.
#[derive(Debug, Default)]
pub struct ParsePayload {
    pub value: Value,
    pub path: Vec<PathSegment>,
    pub issues: Vec<RawIssue>,
}

impl ParsePayload {
    pub fn new(value: Value) -> Self {
        Self {
            value,
            path: Vec::new(),
            issues: Vec::new(),
        }
    }

    /// Payload for a child value one segment below this one.
    pub fn child(&self, value: Value, segment: PathSegment) -> Self {
        let mut path = self.path.clone();
        path.push(segment);
        Self {
            value,
            path,
            issues: Vec::new(),
        }
    }

    /// Payload for another attempt at the same path.
    pub fn branch(&self, value: Value) -> Self {
        Self {
            value,
            path: self.path.clone(),
            issues: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.issues.is_empty()
    }

    /// Records an issue raised by the schema owning `internals`. The issue
    /// path is taken as relative to this payload.
    pub fn report(&mut self, internals: &TypeInternals, input: &Value, mut issue: RawIssue) {
        if !self.path.is_empty() {
            let mut path = self.path.clone();
            path.append(&mut issue.path);
            issue.path = path;
        }
        if issue.input.is_none() {
            issue.input = Some(input.clone());
        }
        if issue.resolver.is_none() {
            issue.resolver = internals.error.clone();
        }
        self.issues.push(issue);
    }
}

/// State shared by every payload of a single parse call.
#[derive(Debug)]
pub struct ParseState<'a> {
    ctx: &'a ParseContext,
    active: HashSet<(usize, usize)>,
}

impl<'a> ParseState<'a> {
    pub fn new(ctx: &'a ParseContext) -> Self {
        Self {
            ctx,
            active: HashSet::new(),
        }
    }

    pub fn context(&self) -> &ParseContext {
        self.ctx
    }

    /// Marks a reference as under validation by the schema owning
    /// `internals`. Returns false if that schema is already validating it,
    /// which means the value graph loops back onto itself.
    pub(crate) fn enter(&mut self, internals: &TypeInternals, shared: &Shared) -> bool {
        self.active.insert(visit_key(internals, shared))
    }

    pub(crate) fn leave(&mut self, internals: &TypeInternals, shared: &Shared) {
        self.active.remove(&visit_key(internals, shared));
    }
}

fn visit_key(internals: &TypeInternals, shared: &Shared) -> (usize, usize) {
    (internals as *const TypeInternals as usize, shared.addr())
}

/// Opt-in conversion attempted when the input does not narrow directly.
pub(crate) type Coercion = fn(&Value) -> Option<Value>;

/// Parses `payload` for a schema whose type-specific work is `narrow`.
///
/// `narrow` returns the narrowed value when the input has the schema's type,
/// or `None` without recording anything when it does not. Container schemas
/// descend into their children inside `narrow` and record child issues on
/// the payload; checks then run only if no child failed.
///
/// Order: absent input, direct type match, reference (identity preserved),
/// coercion, type error.
pub(crate) fn parse_typed<N>(
    internals: &TypeInternals,
    payload: &mut ParsePayload,
    state: &mut ParseState<'_>,
    narrow: &N,
    coerce: Option<Coercion>,
) where
    N: Fn(&Value, &mut ParsePayload, &mut ParseState<'_>) -> Option<Value>,
{
    if payload.value.is_null() {
        if !internals.tolerates_absent() {
            let issue = RawIssue::invalid_type(internals.kind.as_str(), "null");
            payload.report(internals, &Value::Null, issue);
        }
        return;
    }

    let input = std::mem::take(&mut payload.value);
    let before = payload.issues.len();

    if let Some(narrowed) = narrow(&input, payload, state) {
        finish(internals, payload, narrowed, before);
        return;
    }

    if let Value::Ref(shared) = &input {
        parse_reference(internals, payload, state, narrow, coerce, shared.clone());
        return;
    }

    if internals.coerces() {
        if let Some(coerced) = coerce.and_then(|convert| convert(&input)) {
            trace!(kind = %internals.kind, from = input.type_name(), "coerced input");
            if let Some(narrowed) = narrow(&coerced, payload, state) {
                finish(internals, payload, narrowed, before);
                return;
            }
        }
    }

    let issue = RawIssue::invalid_type(internals.kind.as_str(), input.type_name());
    payload.report(internals, &input, issue);
    payload.value = input;
}

fn finish(internals: &TypeInternals, payload: &mut ParsePayload, narrowed: Value, before: usize) {
    payload.value = narrowed;
    if payload.issues.len() == before {
        run_checks(internals, payload);
    }
}

/// Validates the referenced value. On success the original reference is
/// returned when the content is unchanged, otherwise a fresh reference to the
/// converted content. A reference the same schema is already validating is
/// accepted as-is; any other schema still validates it.
fn parse_reference<N>(
    internals: &TypeInternals,
    payload: &mut ParsePayload,
    state: &mut ParseState<'_>,
    narrow: &N,
    coerce: Option<Coercion>,
    shared: Shared,
) where
    N: Fn(&Value, &mut ParsePayload, &mut ParseState<'_>) -> Option<Value>,
{
    if !state.enter(internals, &shared) {
        trace!(kind = %internals.kind, "reference cycle, accepting visited value");
        payload.value = Value::Ref(shared);
        return;
    }

    let inner = shared.get();
    let mut target = payload.branch(inner.clone());
    parse_typed(internals, &mut target, state, narrow, coerce);
    state.leave(internals, &shared);

    let ok = target.is_ok();
    payload.issues.append(&mut target.issues);
    payload.value = if ok && target.value != inner {
        Value::Ref(Shared::new(target.value))
    } else {
        Value::Ref(shared)
    };
}

/// Runs `internals` checks after a wrapped schema succeeded.
pub(crate) fn finish_wrapped(internals: &TypeInternals, payload: &mut ParsePayload, before: usize) {
    if payload.issues.len() == before {
        run_checks(internals, payload);
    }
}
