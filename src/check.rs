//! The check/refinement pipeline.
//!
//! A [`Check`] is a named predicate attached to a schema. Checks run after the
//! value has been narrowed to the schema's type, in attachment order. A check
//! reports failures by adding issues to its [`RefinementCtx`]; when a failing
//! check is marked `abort`, the remaining checks of that schema are skipped
//! for that value.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use tracing::trace;

use crate::error::RawIssue;
use crate::parse::ParsePayload;
use crate::types::TypeInternals;
use crate::value::Value;

/// Check body. Receives the narrowed value and collects issues in the context.
pub type CheckFn = Arc<dyn Fn(&Value, &mut RefinementCtx) + Send + Sync>;

/// A named validation unit.
#[derive(Clone)]
pub struct Check {
    name: Cow<'static, str>,
    params: serde_json::Map<String, serde_json::Value>,
    abort: bool,
    message: Option<String>,
    func: CheckFn,
}

impl Check {
    pub fn new<F>(name: impl Into<Cow<'static, str>>, func: F) -> Self
    where
        F: Fn(&Value, &mut RefinementCtx) + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            params: serde_json::Map::new(),
            abort: false,
            message: None,
            func: Arc::new(func),
        }
    }

    /// Records a parameter for introspection (e.g. `minimum` for `min_length`).
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Stop running later checks on the same value when this one fails.
    pub fn abort(mut self) -> Self {
        self.abort = true;
        self
    }

    /// Override the message of every issue this check reports.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.params
    }

    pub fn is_abort(&self) -> bool {
        self.abort
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    /// Runs the check body against an already narrowed value.
    pub fn run(&self, value: &Value, ctx: &mut RefinementCtx) {
        (self.func)(value, ctx)
    }
}

impl fmt::Debug for Check {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Check")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("abort", &self.abort)
            .field("message", &self.message)
            .finish()
    }
}

/// Collects issues raised by a check or a transform.
///
/// Issue paths are relative to the value under validation.
#[derive(Debug, Default)]
pub struct RefinementCtx {
    issues: Vec<RawIssue>,
}

impl RefinementCtx {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_issue(&mut self, issue: RawIssue) {
        self.issues.push(issue);
    }

    /// Shorthand for a `custom` issue with a message.
    pub fn custom(&mut self, message: impl Into<String>) {
        self.issues.push(RawIssue::custom(message));
    }

    pub fn issues(&self) -> &[RawIssue] {
        &self.issues
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }

    pub(crate) fn into_issues(self) -> Vec<RawIssue> {
        self.issues
    }
}

/// Runs the checks of `internals` against the payload value.
pub(crate) fn run_checks(internals: &TypeInternals, payload: &mut ParsePayload) {
    if internals.checks.is_empty() {
        return;
    }
    let value = std::mem::take(&mut payload.value);
    for check in &internals.checks {
        let mut ctx = RefinementCtx::new();
        check.run(&value, &mut ctx);
        if !ctx.has_issues() {
            continue;
        }
        for mut issue in ctx.into_issues() {
            if let Some(message) = &check.message {
                issue.message = Some(message.clone());
            }
            payload.report(internals, &value, issue);
        }
        if check.abort {
            trace!(check = %check.name, "check aborted pipeline");
            break;
        }
    }
    payload.value = value;
}
