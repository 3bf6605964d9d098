//! Versioned function identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies which function a request node invokes.
///
/// The revision is kept as its own field so a resolver can reject an
/// incompatible build by exact structural match instead of parsing a
/// concatenated string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FunctionId {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    revision: Option<String>,
}

impl FunctionId {
    /// Create a function id bound to a resolver revision.
    pub fn versioned(name: impl Into<String>, revision: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            revision: Some(revision.into()),
        }
    }

    /// Create a function id that any resolver revision accepts.
    pub fn unversioned(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            revision: None,
        }
    }

    /// Logical function name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolver revision, if any.
    pub fn revision(&self) -> Option<&str> {
        self.revision.as_deref()
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.revision {
            Some(revision) => write!(f, "{}+{}", self.name, revision),
            None => write!(f, "{}", self.name),
        }
    }
}
