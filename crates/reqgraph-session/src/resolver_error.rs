//! Classification of resolver-reported errors.
//!
//! The resolver reports failures as free text inside `content.error`. Two
//! messages are recognised and turned into structured kinds; anything else is
//! internal. Nothing here is retried.

use serde_json::Value;
use std::fmt;
use thiserror::Error;

const MISSING_FIELD_PREFIX: &str = "no ";
const MISSING_FIELD_SUFFIX: &str = " found in JSON";
const UNKNOWN_FUNCTION_PREFIX: &str = "no request registered with uuid ";

/// What went wrong on the resolver side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The submitted graph lacks a required field.
    MalformedRequest { field: String },
    /// The graph names a function the resolver does not know.
    UnknownFunction { id: String },
    /// Any other failure.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedRequest { field } => write!(f, "malformed request (missing {field})"),
            Self::UnknownFunction { id } => write!(f, "unknown function {id}"),
            Self::Internal => f.write_str("internal"),
        }
    }
}

/// An error reported by the resolver, with the payload it came from.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct ResolverError {
    pub kind: ErrorKind,
    /// Message text as reported.
    pub message: String,
    /// The original `content.error` payload.
    pub response: Value,
}

impl ResolverError {
    /// Classify a `content.error` payload.
    pub fn from_payload(payload: Value) -> Self {
        match extract_message(&payload) {
            Some(message) => Self {
                kind: classify(&message),
                message,
                response: payload,
            },
            None => Self {
                kind: ErrorKind::Internal,
                message: payload.to_string(),
                response: payload,
            },
        }
    }

    pub fn is_malformed_request(&self) -> bool {
        matches!(self.kind, ErrorKind::MalformedRequest { .. })
    }

    pub fn is_unknown_function(&self) -> bool {
        matches!(self.kind, ErrorKind::UnknownFunction { .. })
    }
}

fn extract_message(payload: &Value) -> Option<String> {
    match payload {
        Value::String(message) => Some(message.clone()),
        Value::Object(object) => ["unknown", "message"]
            .iter()
            .find_map(|key| object.get(*key).and_then(Value::as_str))
            .or_else(|| object.values().find_map(Value::as_str))
            .map(str::to_string),
        _ => None,
    }
}

/// Classify a resolver message.
pub(crate) fn classify(message: &str) -> ErrorKind {
    if let Some(field) = missing_field(message) {
        return ErrorKind::MalformedRequest {
            field: field.to_string(),
        };
    }
    if let Some(id) = unknown_function(message) {
        return ErrorKind::UnknownFunction { id: id.to_string() };
    }
    ErrorKind::Internal
}

// "no <field> found in JSON", optionally followed by ": <details>"
fn missing_field(message: &str) -> Option<&str> {
    let rest = message.strip_prefix(MISSING_FIELD_PREFIX)?;
    let (field, tail) = rest.split_once(MISSING_FIELD_SUFFIX)?;
    let well_formed = !field.is_empty() && !field.contains(char::is_whitespace);
    (well_formed && (tail.is_empty() || tail.starts_with(':'))).then_some(field)
}

// "no request registered with uuid <id>", optionally followed by ". <details>"
fn unknown_function(message: &str) -> Option<&str> {
    let rest = message.strip_prefix(UNKNOWN_FUNCTION_PREFIX)?;
    let id = match rest.split_once(". ") {
        Some((id, _)) => id,
        None => rest.strip_suffix('.').unwrap_or(rest),
    };
    (!id.is_empty()).then_some(id)
}
