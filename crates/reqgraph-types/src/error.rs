//! Request graph error types.

use crate::CodecError;
use thiserror::Error;

/// Errors raised while building, encoding or decoding a request graph.
///
/// All of these are local: they are detected before anything is sent to a
/// resolver.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// A node transitively references itself
    #[error("Cyclic request graph: node {node} reaches itself")]
    Cycle { node: usize },

    /// A path from the root is longer than the supported nesting
    #[error("Request graph nests deeper than {limit} requests")]
    TooDeep { limit: usize },

    /// An argument references a node index the arena never issued
    #[error("Dangling node reference: {0}")]
    DanglingReference(usize),

    /// Two full node encodings claim the same identity
    #[error("Identity collision: id {0} is defined more than once")]
    IdentityCollision(u64),

    /// A back-reference names an identity that was never defined
    #[error("Unknown back-reference: id {0}")]
    UnknownReference(u64),

    /// A wire node lacks a required field
    #[error("no {0} found in JSON")]
    MissingField(&'static str),

    /// A wire argument is neither a node, a back-reference nor a literal
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A binary payload could not be encoded or decoded
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
}

/// Result type alias using GraphError.
pub type GraphResult<T> = Result<T, GraphError>;
