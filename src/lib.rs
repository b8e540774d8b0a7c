//! Composable, strongly-typed runtime validation schemas.
//!
//! A schema describes the shape and constraints of a value. Parsing a value
//! against it either returns the accepted (possibly converted) value, typed
//! as the schema's `Output`, or a [`ValidationError`] listing every issue
//! found, each with its path from the root.
//!
//! # Example
//!
//! ```
//! use valschema::{array, int, object, string, TypedSchema};
//! use serde_json::json;
//!
//! let user = object()
//!     .field("name", string().min(1))
//!     .field("age", int().nonnegative().optional())
//!     .field("tags", array(string()).default(vec![]));
//!
//! let parsed = user.parse(json!({ "name": "ada" })).unwrap();
//! assert_eq!(parsed["tags"].to_json(), json!([]));
//! assert!(!parsed.contains_key("age"));
//!
//! let err = user.parse(json!({ "name": "", "age": -1 })).unwrap_err();
//! assert_eq!(err.issues.len(), 2);
//! assert_eq!(err.issues[0].pointer(), "/name");
//! assert_eq!(err.issues[1].pointer(), "/age");
//! ```
//!
//! # Modifiers
//!
//! | Modifier | Absent input | Present input |
//! |----------|--------------|---------------|
//! | `optional()` | accepted | delegated |
//! | `nilable()` | accepted | delegated |
//! | `default(v)` | `v`, validated | delegated |
//! | `prefault(v)` | delegated; `v` unvalidated on failure | same |
//! | `transform(f)` | as the inner schema | `f` applied to the output |
//!
//! Modifiers never change the receiver; each returns a new schema.
//!
//! # Messages
//!
//! Issue messages are resolved when a parse fails, highest precedence first:
//! a per-check override, the resolver passed in [`ParseContext`], the
//! schema's own resolver set with [`TypedSchema::error`], the configured
//! [`MessageCatalog`], and finally `"Invalid input"`.

mod check;
pub mod checks;
pub mod coerce;
mod composite;
mod config;
mod discriminated;
mod error;
mod lazy;
mod locale;
mod modifiers;
mod parse;
mod primitives;
mod schema;
mod types;
mod value;

pub use check::{Check, CheckFn, RefinementCtx};
pub use composite::{
    array, intersection, object, record, union, Array, Intersection, Object, Record, Union,
    UnknownKeys,
};
pub use config::{Config, ParseContext};
pub use discriminated::{discriminated_union, DiscriminatedUnion, DiscriminatorValue};
pub use error::{
    ErrorResolver, Issue, IssueCode, RawIssue, SchemaError, ValidationError, FALLBACK_MESSAGE,
};
pub use lazy::{lazy, try_lazy, Lazy};
pub use locale::{English, MessageCatalog};
pub use modifiers::{Nilable, Optional, Pipe, Prefault, Transformer, WithDefault};
pub use parse::{ParsePayload, ParseState};
pub use primitives::{
    any, boolean, enumeration, float, int, literal, never, nil, string, unknown, AnySchema,
    BoolSchema, Enumeration, FloatSchema, IntSchema, Literal, NeverSchema, NilSchema,
    StringSchema, UnknownSchema,
};
pub use schema::{Schema, SchemaRef, TypedSchema};
pub use types::{format_path, Kind, PathSegment, TypeInternals, COERCE_KEY, DESCRIPTION_KEY};
pub use value::{FromValue, Map, Shared, Value};
