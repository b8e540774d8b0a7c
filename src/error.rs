//! Issue and error types.
//!
//! A validation failure goes through three stages: a context-free
//! [`RawIssue`] recorded while parsing, an [`Issue`] whose message has been
//! resolved, and the [`ValidationError`] aggregate returned to callers.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::config::ParseContext;
use crate::types::{format_path, PathSegment};
use crate::value::Value;

/// Produces a message for a raw issue, or `None` to defer to the next source.
pub type ErrorResolver = Arc<dyn Fn(&RawIssue) -> Option<String> + Send + Sync>;

/// Message used when no other source produces one.
pub const FALLBACK_MESSAGE: &str = "Invalid input";

/// Category of a validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueCode {
    InvalidType,
    InvalidValue,
    InvalidFormat,
    InvalidUnion,
    InvalidKey,
    /// Reserved for keyed-collection validators outside this crate. Record
    /// values report their own issues at the value's path.
    InvalidElement,
    TooBig,
    TooSmall,
    NotMultipleOf,
    UnrecognizedKeys,
    Custom,
}

impl IssueCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueCode::InvalidType => "invalid_type",
            IssueCode::InvalidValue => "invalid_value",
            IssueCode::InvalidFormat => "invalid_format",
            IssueCode::InvalidUnion => "invalid_union",
            IssueCode::InvalidKey => "invalid_key",
            IssueCode::InvalidElement => "invalid_element",
            IssueCode::TooBig => "too_big",
            IssueCode::TooSmall => "too_small",
            IssueCode::NotMultipleOf => "not_multiple_of",
            IssueCode::UnrecognizedKeys => "unrecognized_keys",
            IssueCode::Custom => "custom",
        }
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure as recorded during parsing, before its message is resolved.
///
/// Paths recorded by checks and transforms are relative to the value being
/// checked; the engine prefixes the payload path when the issue is collected.
#[derive(Clone)]
pub struct RawIssue {
    pub code: IssueCode,
    pub input: Option<Value>,
    pub path: Vec<PathSegment>,
    pub properties: serde_json::Map<String, serde_json::Value>,
    /// Per-check message override. Wins over every resolver.
    pub message: Option<String>,
    /// Issues of each failed alternative (unions) or of a rejected key.
    pub branches: Vec<Vec<RawIssue>>,
    pub(crate) resolver: Option<ErrorResolver>,
}

impl RawIssue {
    pub fn new(code: IssueCode) -> Self {
        Self {
            code,
            input: None,
            path: Vec::new(),
            properties: serde_json::Map::new(),
            message: None,
            branches: Vec::new(),
            resolver: None,
        }
    }

    pub fn invalid_type(expected: impl Into<String>, received: impl Into<String>) -> Self {
        let expected: String = expected.into();
        let received: String = received.into();
        Self::new(IssueCode::InvalidType)
            .with_property("expected", expected)
            .with_property("received", received)
    }

    /// A `custom` issue. `message` is stored as the `message` property, so
    /// resolvers and catalogs still get a say.
    pub fn custom(message: impl Into<String>) -> Self {
        Self::new(IssueCode::Custom).with_property("message", message.into())
    }

    pub fn with_property(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_input(mut self, input: impl Into<Value>) -> Self {
        self.input = Some(input.into());
        self
    }

    /// Sets the path relative to the value being validated.
    pub fn at(mut self, path: impl IntoIterator<Item = PathSegment>) -> Self {
        self.path = path.into_iter().collect();
        self
    }

    pub fn with_branches(mut self, branches: Vec<Vec<RawIssue>>) -> Self {
        self.branches = branches;
        self
    }

    pub fn property(&self, key: &str) -> Option<&serde_json::Value> {
        self.properties.get(key)
    }

    /// Resolves the message by precedence: per-check override, call context
    /// resolver, schema resolver, configured catalog, fallback.
    fn resolve_message(&self, ctx: &ParseContext) -> String {
        if let Some(message) = &self.message {
            return message.clone();
        }
        ctx.error_resolver()
            .and_then(|resolve| resolve(self))
            .or_else(|| self.resolver.as_ref().and_then(|resolve| resolve(self)))
            .or_else(|| ctx.config().catalog().message(self))
            .unwrap_or_else(|| FALLBACK_MESSAGE.to_string())
    }

    pub(crate) fn finalize(self, ctx: &ParseContext) -> Issue {
        let message = self.resolve_message(ctx);
        let input = if ctx.reports_input() {
            self.input.as_ref().map(Value::to_json)
        } else {
            None
        };
        Issue {
            code: self.code,
            path: self.path,
            message,
            input,
            properties: self.properties,
            branches: self
                .branches
                .into_iter()
                .map(|branch| branch.into_iter().map(|raw| raw.finalize(ctx)).collect())
                .collect(),
        }
    }
}

impl fmt::Debug for RawIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawIssue")
            .field("code", &self.code)
            .field("path", &self.path)
            .field("properties", &self.properties)
            .field("message", &self.message)
            .field("branches", &self.branches)
            .finish()
    }
}

/// A finalized validation failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub code: IssueCode,
    pub path: Vec<PathSegment>,
    pub message: String,
    /// Offending input, present only when the parse context reports input.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub properties: serde_json::Map<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub branches: Vec<Vec<Issue>>,
}

impl Issue {
    /// JSON Pointer (RFC 6901) to the invalid value.
    pub fn pointer(&self) -> String {
        format_path(&self.path)
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.pointer(), self.message)
    }
}

/// The error returned by every parse entry point.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("validation failed with {} issue(s)", issues.len())]
pub struct ValidationError {
    /// Issues in discovery order.
    pub issues: Vec<Issue>,
}

impl ValidationError {
    pub(crate) fn from_raw(raw: Vec<RawIssue>, ctx: &ParseContext) -> Self {
        Self {
            issues: raw.into_iter().map(|issue| issue.finalize(ctx)).collect(),
        }
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn codes(&self) -> Vec<IssueCode> {
        self.issues.iter().map(|issue| issue.code).collect()
    }

    /// Groups messages by pointer, preserving discovery order within a pointer.
    pub fn flatten(&self) -> BTreeMap<String, Vec<String>> {
        let mut fields: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for issue in &self.issues {
            fields
                .entry(issue.pointer())
                .or_default()
                .push(issue.message.clone());
        }
        fields
    }
}

/// Errors raised while building a schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("member {index} declares no literal value for discriminator \"{key}\"")]
    MissingDiscriminator { index: usize, key: String },

    #[error("discriminator \"{key}\" value {value} is claimed by members {first} and {second}")]
    DuplicateDiscriminator {
        key: String,
        value: String,
        first: usize,
        second: usize,
    },

    #[error("discriminator \"{key}\" value {value} cannot be used as a lookup key")]
    UnsupportedDiscriminator { key: String, value: String },

    #[error("invalid pattern {pattern:?}: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParseContext;

    #[test]
    fn issue_display() {
        let issue = Issue {
            code: IssueCode::InvalidType,
            path: vec!["buyer".into(), "email".into()],
            message: "expected string, got number".into(),
            input: None,
            properties: serde_json::Map::new(),
            branches: Vec::new(),
        };
        assert_eq!(issue.to_string(), "/buyer/email: expected string, got number");
    }

    #[test]
    fn override_beats_every_resolver() {
        let ctx = ParseContext::new().with_resolver(|_| Some("from context".to_string()));
        let issue = RawIssue::new(IssueCode::Custom)
            .with_message("from check")
            .finalize(&ctx);
        assert_eq!(issue.message, "from check");
    }

    #[test]
    fn custom_text_can_be_resolved() {
        let raw = RawIssue::custom("not allowed");
        assert_eq!(raw.clone().finalize(&ParseContext::new()).message, "not allowed");

        let ctx = ParseContext::new().with_resolver(|issue| {
            (issue.property("message")? == "not allowed").then(|| "nicht erlaubt".to_string())
        });
        assert_eq!(raw.finalize(&ctx).message, "nicht erlaubt");
    }

    #[test]
    fn context_resolver_beats_schema_resolver() {
        let ctx = ParseContext::new().with_resolver(|_| Some("from context".to_string()));
        let mut raw = RawIssue::invalid_type("string", "int");
        raw.resolver = Some(Arc::new(|_: &RawIssue| Some("from schema".to_string())));

        assert_eq!(raw.clone().finalize(&ctx).message, "from context");
        assert_eq!(raw.finalize(&ParseContext::new()).message, "from schema");
    }

    #[test]
    fn catalog_used_without_resolvers() {
        let issue = RawIssue::invalid_type("string", "int").finalize(&ParseContext::new());
        assert_eq!(issue.message, "Invalid input: expected string, received int");
    }

    #[test]
    fn input_reported_only_on_request() {
        let raw = RawIssue::invalid_type("string", "int").with_input(5i64);
        assert_eq!(raw.clone().finalize(&ParseContext::new()).input, None);

        let ctx = ParseContext::new().report_input(true);
        assert_eq!(raw.finalize(&ctx).input, Some(serde_json::json!(5)));
    }

    #[test]
    fn validation_error_display_and_flatten() {
        let ctx = ParseContext::new();
        let err = ValidationError::from_raw(
            vec![
                RawIssue::custom("a").at([PathSegment::from("name")]),
                RawIssue::custom("b").at([PathSegment::from("name")]),
                RawIssue::custom("c"),
            ],
            &ctx,
        );
        assert_eq!(err.to_string(), "validation failed with 3 issue(s)");

        let flat = err.flatten();
        assert_eq!(flat["/name"], vec!["a".to_string(), "b".to_string()]);
        assert_eq!(flat["/"], vec!["c".to_string()]);
    }
}
