//! Core types shared by every schema: kind tags, paths and internals.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::check::Check;
use crate::error::ErrorResolver;

/// Metadata key enabling coercion on primitive schemas.
pub const COERCE_KEY: &str = "coerce";

/// Metadata key holding a human-readable description.
pub const DESCRIPTION_KEY: &str = "description";

/// Kind tag of a schema.
///
/// External consumers (JSON-Schema translators, documentation generators)
/// branch on this tag rather than on concrete schema types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    String,
    Int,
    Float,
    Bool,
    Literal,
    Enum,
    Any,
    Unknown,
    Never,
    Nil,
    Array,
    Object,
    Record,
    Union,
    Intersection,
    DiscriminatedUnion,
    Lazy,
    Optional,
    Nilable,
    Default,
    Prefault,
    Transform,
    Pipe,
}

impl Kind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Kind::String => "string",
            Kind::Int => "int",
            Kind::Float => "float",
            Kind::Bool => "bool",
            Kind::Literal => "literal",
            Kind::Enum => "enum",
            Kind::Any => "any",
            Kind::Unknown => "unknown",
            Kind::Never => "never",
            Kind::Nil => "nil",
            Kind::Array => "array",
            Kind::Object => "object",
            Kind::Record => "record",
            Kind::Union => "union",
            Kind::Intersection => "intersection",
            Kind::DiscriminatedUnion => "discriminated_union",
            Kind::Lazy => "lazy",
            Kind::Optional => "optional",
            Kind::Nilable => "nilable",
            Kind::Default => "default",
            Kind::Prefault => "prefault",
            Kind::Transform => "transform",
            Kind::Pipe => "pipe",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of a path from the root value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => f.write_str(key),
            PathSegment::Index(index) => write!(f, "{}", index),
        }
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        PathSegment::Key(key.to_string())
    }
}

impl From<String> for PathSegment {
    fn from(key: String) -> Self {
        PathSegment::Key(key)
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        PathSegment::Index(index)
    }
}

/// Formats a path as a JSON Pointer (e.g. `/children/0/value`). The root is `/`.
pub fn format_path(path: &[PathSegment]) -> String {
    if path.is_empty() {
        return "/".to_string();
    }
    path.iter().map(|segment| format!("/{}", segment)).collect()
}

/// State every schema embeds.
///
/// Internals are cloned, never shared, when a modifier derives a new schema,
/// so attaching a check to the derived schema leaves the original untouched.
#[derive(Clone)]
pub struct TypeInternals {
    pub(crate) kind: Kind,
    pub(crate) checks: Vec<Check>,
    pub(crate) optional: bool,
    pub(crate) nilable: bool,
    pub(crate) error: Option<ErrorResolver>,
    pub(crate) metadata: BTreeMap<String, serde_json::Value>,
}

impl TypeInternals {
    pub fn new(kind: Kind) -> Self {
        Self {
            kind,
            checks: Vec::new(),
            optional: false,
            nilable: false,
            error: None,
            metadata: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> Kind {
        self.kind
    }

    /// Attached checks, in attachment order.
    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn is_nilable(&self) -> bool {
        self.nilable
    }

    /// True when absent input is accepted as-is.
    pub fn tolerates_absent(&self) -> bool {
        self.optional || self.nilable
    }

    pub fn error_resolver(&self) -> Option<&ErrorResolver> {
        self.error.as_ref()
    }

    pub fn metadata(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.metadata
    }

    pub fn coerces(&self) -> bool {
        self.metadata.get(COERCE_KEY) == Some(&serde_json::Value::Bool(true))
    }

    pub fn description(&self) -> Option<&str> {
        self.metadata.get(DESCRIPTION_KEY).and_then(|v| v.as_str())
    }

    pub(crate) fn with_check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }

    pub(crate) fn with_metadata(mut self, key: &str, value: serde_json::Value) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }
}

impl fmt::Debug for TypeInternals {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeInternals")
            .field("kind", &self.kind)
            .field(
                "checks",
                &self.checks.iter().map(Check::name).collect::<Vec<_>>(),
            )
            .field("optional", &self.optional)
            .field("nilable", &self.nilable)
            .field("error", &self.error.is_some())
            .field("metadata", &self.metadata)
            .finish()
    }
}
