//! Built-in checks.
//!
//! Length checks apply to strings (characters), arrays (items) and objects
//! (keys). Numeric checks apply to ints and floats; int against int compares
//! exactly, anything else compares as `f64`.

use std::cmp::Ordering;

use regex::Regex;

use crate::check::Check;
use crate::error::{IssueCode, RawIssue, SchemaError};
use crate::value::Value;

fn measure(value: &Value) -> Option<(usize, &'static str)> {
    match value {
        Value::String(s) => Some((s.chars().count(), "string")),
        Value::Array(items) => Some((items.len(), "array")),
        Value::Object(map) => Some((map.len(), "object")),
        _ => None,
    }
}

fn compare(value: &Value, bound: &Value) -> Option<Ordering> {
    match (value, bound) {
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        _ => value.as_f64()?.partial_cmp(&bound.as_f64()?),
    }
}

fn too_small(origin: &str, minimum: serde_json::Value, inclusive: bool) -> RawIssue {
    RawIssue::new(IssueCode::TooSmall)
        .with_property("origin", origin)
        .with_property("minimum", minimum)
        .with_property("inclusive", inclusive)
}

fn too_big(origin: &str, maximum: serde_json::Value, inclusive: bool) -> RawIssue {
    RawIssue::new(IssueCode::TooBig)
        .with_property("origin", origin)
        .with_property("maximum", maximum)
        .with_property("inclusive", inclusive)
}

pub fn min_length(minimum: usize) -> Check {
    Check::new("min_length", move |value, ctx| {
        if let Some((len, origin)) = measure(value) {
            if len < minimum {
                ctx.add_issue(too_small(origin, minimum.into(), true));
            }
        }
    })
    .with_param("minimum", minimum)
}

pub fn max_length(maximum: usize) -> Check {
    Check::new("max_length", move |value, ctx| {
        if let Some((len, origin)) = measure(value) {
            if len > maximum {
                ctx.add_issue(too_big(origin, maximum.into(), true));
            }
        }
    })
    .with_param("maximum", maximum)
}

/// Exact length. Reports `too_small` or `too_big` with `exact: true`.
pub fn length(exact: usize) -> Check {
    Check::new("length", move |value, ctx| {
        if let Some((len, origin)) = measure(value) {
            let issue = match len.cmp(&exact) {
                Ordering::Less => too_small(origin, exact.into(), true),
                Ordering::Greater => too_big(origin, exact.into(), true),
                Ordering::Equal => return,
            };
            ctx.add_issue(issue.with_property("exact", true));
        }
    })
    .with_param("length", exact)
}

pub fn regex(pattern: Regex) -> Check {
    let source = pattern.as_str().to_string();
    Check::new("regex", move |value, ctx| {
        if let Some(s) = value.as_str() {
            if !pattern.is_match(s) {
                ctx.add_issue(
                    RawIssue::new(IssueCode::InvalidFormat)
                        .with_property("format", "regex")
                        .with_property("pattern", pattern.as_str()),
                );
            }
        }
    })
    .with_param("pattern", source)
}

/// Compiles `pattern` and returns a [`regex`] check.
pub fn try_regex(pattern: &str) -> Result<Check, SchemaError> {
    let compiled = Regex::new(pattern).map_err(|source| SchemaError::InvalidPattern {
        pattern: pattern.to_string(),
        source,
    })?;
    Ok(regex(compiled))
}

fn string_format(
    name: &'static str,
    key: &'static str,
    needle: String,
    matches: fn(&str, &str) -> bool,
) -> Check {
    let param = needle.clone();
    Check::new(name, move |value, ctx| {
        if let Some(s) = value.as_str() {
            if !matches(s, &needle) {
                ctx.add_issue(
                    RawIssue::new(IssueCode::InvalidFormat)
                        .with_property("format", name)
                        .with_property(key, needle.as_str()),
                );
            }
        }
    })
    .with_param(key, param)
}

pub fn starts_with(prefix: impl Into<String>) -> Check {
    string_format("starts_with", "prefix", prefix.into(), |s, p| s.starts_with(p))
}

pub fn ends_with(suffix: impl Into<String>) -> Check {
    string_format("ends_with", "suffix", suffix.into(), |s, p| s.ends_with(p))
}

pub fn includes(needle: impl Into<String>) -> Check {
    string_format("includes", "includes", needle.into(), |s, p| s.contains(p))
}

fn numeric_bound(name: &'static str, bound: Value, fails: fn(Ordering) -> bool) -> Check {
    let json = bound.to_json();
    let (is_min, inclusive) = match name {
        "gte" => (true, true),
        "gt" => (true, false),
        "lte" => (false, true),
        _ => (false, false),
    };
    let param = json.clone();
    Check::new(name, move |value, ctx| {
        let Some(ordering) = compare(value, &bound) else {
            return;
        };
        if fails(ordering) {
            let issue = if is_min {
                too_small("number", json.clone(), inclusive)
            } else {
                too_big("number", json.clone(), inclusive)
            };
            ctx.add_issue(issue);
        }
    })
    .with_param(if is_min { "minimum" } else { "maximum" }, param)
}

pub fn gte(minimum: impl Into<Value>) -> Check {
    numeric_bound("gte", minimum.into(), |o| o == Ordering::Less)
}

pub fn gt(minimum: impl Into<Value>) -> Check {
    numeric_bound("gt", minimum.into(), |o| o != Ordering::Greater)
}

pub fn lte(maximum: impl Into<Value>) -> Check {
    numeric_bound("lte", maximum.into(), |o| o == Ordering::Greater)
}

pub fn lt(maximum: impl Into<Value>) -> Check {
    numeric_bound("lt", maximum.into(), |o| o != Ordering::Less)
}

fn is_multiple(value: &Value, divisor: &Value) -> bool {
    match (value, divisor) {
        (Value::Int(v), Value::Int(d)) => *d != 0 && v.checked_rem(*d).unwrap_or(0) == 0,
        _ => match (value.as_f64(), divisor.as_f64()) {
            (Some(v), Some(d)) if d != 0.0 => {
                let quotient = v / d;
                (quotient - quotient.round()).abs() < 1e-9
            }
            _ => false,
        },
    }
}

pub fn multiple_of(divisor: impl Into<Value>) -> Check {
    let divisor = divisor.into();
    let json = divisor.to_json();
    let param = json.clone();
    Check::new("multiple_of", move |value, ctx| {
        if value.as_f64().is_some() && !is_multiple(value, &divisor) {
            ctx.add_issue(
                RawIssue::new(IssueCode::NotMultipleOf).with_property("divisor", json.clone()),
            );
        }
    })
    .with_param("divisor", param)
}

/// Generic predicate check over the narrowed value. Failures report a
/// `custom` issue carrying `message`.
pub fn custom<F>(name: &'static str, predicate: F, message: impl Into<String>) -> Check
where
    F: Fn(&Value) -> bool + Send + Sync + 'static,
{
    Check::new(name, move |value, ctx| {
        if !predicate(value) {
            ctx.add_issue(RawIssue::new(IssueCode::Custom));
        }
    })
    .with_message(message)
}
