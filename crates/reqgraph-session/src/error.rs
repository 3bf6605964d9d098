//! Session error types.

use crate::protocol::AsyncId;
use crate::ResolverError;
use reqgraph_types::{CodecError, GraphError};
use std::time::Duration;
use thiserror::Error;

/// Session error type.
#[derive(Error, Debug)]
pub enum SessionError {
    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// The resolver could not be reached
    #[error("Connection error: {0}")]
    Connection(String),

    /// The resolver closed the connection before answering
    #[error("Connection closed by resolver")]
    ConnectionClosed,

    /// No response arrived within the request timeout
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The request graph could not be encoded
    #[error("Request graph error: {0}")]
    Graph(#[from] GraphError),

    /// A binary result could not be decoded
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// The resolver answered with something the protocol does not allow
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// An async request was cancelled before it finished
    #[error("Async request {0} was cancelled")]
    AsyncCancelled(AsyncId),

    /// An async request ended in an error
    #[error("Async request {id} failed: {message}")]
    AsyncFailed { id: AsyncId, message: String },

    /// The resolver reported an error
    #[error(transparent)]
    Resolver(#[from] ResolverError),
}

impl SessionError {
    /// The resolver-reported error, if this is one.
    pub fn as_resolver(&self) -> Option<&ResolverError> {
        match self {
            Self::Resolver(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type alias using SessionError.
pub type SessionResult<T> = Result<T, SessionError>;
