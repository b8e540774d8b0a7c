//! Deferred schema resolution for recursive schemas.
//!
//! A recursive schema cannot be built eagerly: building it would require
//! building itself first. [`lazy`] stores a getter instead and resolves it on
//! first use. The getter runs at most once per instance; the result is cached
//! for the lifetime of the instance and of every copy derived from it by a
//! modifier.
//!
//! ```
//! use valschema::{array, lazy, object, string, Object, TypedSchema};
//!
//! fn node() -> Object {
//!     object()
//!         .field("value", string())
//!         .field("children", array(lazy(node)))
//! }
//!
//! let tree = serde_json::json!({
//!     "value": "root",
//!     "children": [{ "value": "leaf", "children": [] }]
//! });
//! assert!(node().parse(tree).is_ok());
//! ```
//!
//! The getter above builds a new schema each time a level is entered. That
//! is fine for trees. For values that loop back onto themselves, build the
//! schema once, e.g. in a `LazyLock` static whose getter clones it, so each
//! revisit is recognized.

use std::fmt;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockUpgradableReadGuard};
use tracing::{debug, warn};

use crate::error::RawIssue;
use crate::parse::{finish_wrapped, ParsePayload, ParseState};
use crate::schema::{Schema, TypedSchema};
use crate::types::{Kind, TypeInternals};

type Getter<S> = Box<dyn FnOnce() -> Option<S> + Send + Sync>;

enum LazyState<S> {
    Pending(Getter<S>),
    Resolved(Option<Arc<S>>),
}

struct LazyCell<S> {
    state: RwLock<LazyState<S>>,
}

impl<S> LazyCell<S> {
    fn is_resolved(&self) -> bool {
        matches!(*self.state.read(), LazyState::Resolved(_))
    }

    /// Resolves the getter once. Racing callers serialize on the upgradable
    /// lock and observe the same cached schema.
    fn force(&self) -> Option<Arc<S>> {
        if let LazyState::Resolved(schema) = &*self.state.read() {
            return schema.clone();
        }

        let guard = self.state.upgradable_read();
        if let LazyState::Resolved(schema) = &*guard {
            return schema.clone();
        }
        let mut guard = RwLockUpgradableReadGuard::upgrade(guard);
        // The getter must not force this same cell; it only builds schemas.
        let resolved = match std::mem::replace(&mut *guard, LazyState::Resolved(None)) {
            LazyState::Pending(getter) => getter().map(Arc::new),
            LazyState::Resolved(schema) => schema,
        };
        if resolved.is_some() {
            debug!("lazy schema resolved");
        } else {
            warn!("lazy schema getter returned no schema");
        }
        *guard = LazyState::Resolved(resolved.clone());
        resolved
    }
}

/// A schema whose definition is produced on first use.
pub struct Lazy<S> {
    cell: Arc<LazyCell<S>>,
    internals: TypeInternals,
}

/// Defers building a schema until it is first needed.
pub fn lazy<S, F>(getter: F) -> Lazy<S>
where
    S: TypedSchema,
    F: FnOnce() -> S + Send + Sync + 'static,
{
    try_lazy(move || Some(getter()))
}

/// Like [`lazy`], for getters that may produce no schema. Parsing through an
/// empty getter fails with `invalid_type`; the getter is not retried.
pub fn try_lazy<S, F>(getter: F) -> Lazy<S>
where
    S: TypedSchema,
    F: FnOnce() -> Option<S> + Send + Sync + 'static,
{
    Lazy {
        cell: Arc::new(LazyCell {
            state: RwLock::new(LazyState::Pending(Box::new(getter))),
        }),
        internals: TypeInternals::new(Kind::Lazy),
    }
}

impl<S: TypedSchema> Lazy<S> {
    /// Forces the getter if needed and returns the resolved schema.
    pub fn unwrap(&self) -> Option<Arc<S>> {
        self.cell.force()
    }

    pub fn is_resolved(&self) -> bool {
        self.cell.is_resolved()
    }
}

impl<S> Clone for Lazy<S> {
    fn clone(&self) -> Self {
        Self {
            cell: self.cell.clone(),
            internals: self.internals.clone(),
        }
    }
}

impl<S> fmt::Debug for Lazy<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lazy")
            .field("resolved", &self.cell.is_resolved())
            .field("internals", &self.internals)
            .finish()
    }
}

impl<S: TypedSchema> Schema for Lazy<S> {
    fn internals(&self) -> &TypeInternals {
        &self.internals
    }

    fn run(&self, payload: &mut ParsePayload, state: &mut ParseState<'_>) {
        // Unreached recursive branches must not force the getter.
        if payload.value.is_null() && self.internals.tolerates_absent() {
            return;
        }
        match self.cell.force() {
            Some(schema) => {
                let before = payload.issues.len();
                schema.run(payload, state);
                finish_wrapped(&self.internals, payload, before);
            }
            None => {
                let issue = RawIssue::invalid_type(Kind::Lazy.as_str(), payload.value.type_name())
                    .with_message("lazy schema getter returned no schema");
                let input = payload.value.clone();
                payload.report(&self.internals, &input, issue);
            }
        }
    }
}

impl<S: TypedSchema> TypedSchema for Lazy<S> {
    type Output = S::Output;

    fn with_internals(&self, internals: TypeInternals) -> Self {
        Self {
            cell: self.cell.clone(),
            internals,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::IssueCode;
    use crate::primitives::string;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting() -> (Arc<AtomicUsize>, Lazy<crate::primitives::StringSchema>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let schema = lazy(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            string()
        });
        (calls, schema)
    }

    #[test]
    fn getter_runs_once() {
        let (calls, schema) = counting();
        assert!(!schema.is_resolved());
        for _ in 0..10 {
            assert_eq!(schema.parse("x").unwrap(), "x");
        }
        assert!(schema.parse(3i64).is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(schema.is_resolved());
    }

    #[test]
    fn derived_copies_share_the_cache() {
        let (calls, schema) = counting();
        let described = schema.describe("label");
        described.parse("a").unwrap();
        schema.parse("b").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn nilable_absent_does_not_force() {
        let (calls, schema) = counting();
        let nilable = schema.nilable();
        assert_eq!(nilable.parse(()).unwrap(), None);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(!schema.is_resolved());
    }

    #[test]
    fn empty_getter_is_reported_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let schema = try_lazy(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            None::<crate::primitives::StringSchema>
        });
        for _ in 0..3 {
            let err = schema.parse("x").unwrap_err();
            assert_eq!(err.issues[0].code, IssueCode::InvalidType);
            assert_eq!(err.issues[0].message, "lazy schema getter returned no schema");
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unwrap_forces() {
        let (calls, schema) = counting();
        assert!(schema.unwrap().is_some());
        assert!(schema.unwrap().is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
