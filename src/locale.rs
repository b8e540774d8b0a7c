//! Message catalogs.
//!
//! A catalog turns a [`RawIssue`] into text. It is consulted after per-check
//! overrides and after every resolver, so it only supplies the default
//! wording. [`English`] is the built-in catalog.

use serde_json::Value as Json;

use crate::error::{IssueCode, RawIssue};

/// Locale-specific issue messages.
pub trait MessageCatalog: Send + Sync {
    /// Short locale identifier, e.g. `"en"`.
    fn name(&self) -> &str;

    /// Message for `issue`, or `None` to fall back to the default text.
    fn message(&self, issue: &RawIssue) -> Option<String>;
}

/// Built-in English messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct English;

impl MessageCatalog for English {
    fn name(&self) -> &str {
        "en"
    }

    fn message(&self, issue: &RawIssue) -> Option<String> {
        let text = match issue.code {
            IssueCode::InvalidType => format!(
                "Invalid input: expected {}, received {}",
                prop(issue, "expected"),
                prop(issue, "received")
            ),
            IssueCode::InvalidValue => match issue.property("values").and_then(Json::as_array) {
                Some(values) if values.len() == 1 => {
                    format!("Invalid input: expected {}", values[0])
                }
                Some(values) => format!("Invalid option: expected one of {}", joined(values, "|")),
                None => "Invalid option".to_string(),
            },
            IssueCode::InvalidFormat => format_message(issue),
            IssueCode::InvalidUnion => "Invalid input".to_string(),
            IssueCode::InvalidKey => format!("Invalid key in {}", prop(issue, "origin")),
            IssueCode::InvalidElement => format!("Invalid element in {}", prop(issue, "origin")),
            IssueCode::TooBig => bound_message(issue, "Too big", "maximum", "<"),
            IssueCode::TooSmall => bound_message(issue, "Too small", "minimum", ">"),
            IssueCode::NotMultipleOf => format!(
                "Invalid number: must be a multiple of {}",
                prop(issue, "divisor")
            ),
            IssueCode::UnrecognizedKeys => {
                let keys = issue
                    .property("keys")
                    .and_then(Json::as_array)
                    .map(|keys| joined(keys, ", "))
                    .unwrap_or_default();
                format!("Unrecognized key(s) in object: {}", keys)
            }
            IssueCode::Custom => match issue.property("message").and_then(Json::as_str) {
                Some(text) => text.to_string(),
                None => "Invalid input".to_string(),
            },
        };
        Some(text)
    }
}

fn prop(issue: &RawIssue, key: &str) -> String {
    match issue.property(key) {
        Some(Json::String(s)) => s.clone(),
        Some(other) => other.to_string(),
        None => "unknown".to_string(),
    }
}

fn joined(values: &[Json], separator: &str) -> String {
    values
        .iter()
        .map(Json::to_string)
        .collect::<Vec<_>>()
        .join(separator)
}

fn format_message(issue: &RawIssue) -> String {
    match issue.property("format").and_then(Json::as_str) {
        Some("starts_with") => format!(
            "Invalid string: must start with \"{}\"",
            prop(issue, "prefix")
        ),
        Some("ends_with") => format!(
            "Invalid string: must end with \"{}\"",
            prop(issue, "suffix")
        ),
        Some("includes") => format!(
            "Invalid string: must include \"{}\"",
            prop(issue, "includes")
        ),
        Some("regex") => format!(
            "Invalid string: must match pattern {}",
            prop(issue, "pattern")
        ),
        Some(other) => format!("Invalid {}", other),
        None => "Invalid format".to_string(),
    }
}

/// Renders `too_big` / `too_small` in the form
/// `Too small: expected string to have >=5 characters`.
fn bound_message(issue: &RawIssue, lead: &str, bound_key: &str, op: &str) -> String {
    let origin = prop(issue, "origin");
    let inclusive = issue
        .property("inclusive")
        .and_then(Json::as_bool)
        .unwrap_or(true);
    let comparator = if inclusive {
        format!("{}=", op)
    } else {
        op.to_string()
    };
    let bound = prop(issue, bound_key);
    match unit(&origin) {
        Some(unit) => format!(
            "{}: expected {} to have {}{} {}",
            lead, origin, comparator, bound, unit
        ),
        None => format!("{}: expected {} to be {}{}", lead, origin, comparator, bound),
    }
}

fn unit(origin: &str) -> Option<&'static str> {
    match origin {
        "string" => Some("characters"),
        "array" => Some("items"),
        "object" | "record" => Some("keys"),
        _ => None,
    }
}
