//! Resolver client for reqgraph.
//!
//! This crate provides:
//! - A session that serializes request graphs and submits them to a resolver
//! - WebSocket and in-process transports
//! - The request/response envelope protocol
//! - Asynchronous submission with status polling and cancellation
//! - Classification of resolver-reported errors
//! - Builders for the object-store requests

mod error;
pub mod protocol;
pub mod requests;
mod resolver_error;
mod session;
mod transport;

pub use error::{SessionError, SessionResult};
pub use protocol::{
    AsyncId, AsyncStatus, Content, Envelope, Method, Response, ResultShape, SubContext,
};
pub use resolver_error::{ErrorKind, ResolverError};
pub use session::{MetaInfo, ResolvedValue, Session, SessionConfig, Target};
pub use transport::{ConnectPolicy, LoopbackTransport, Transport, WebSocketTransport};
