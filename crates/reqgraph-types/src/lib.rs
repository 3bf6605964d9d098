//! Request graph types for reqgraph.
//!
//! This crate provides:
//! - A compact binary value codec (MessagePack + base64) for leaf payloads
//! - The request node arena and its tagged argument union
//! - Argument normalization into identity requests
//! - Identity assignment for shared nodes and the canonical wire format

pub mod codec;
mod error;
mod function_id;
pub mod identity;
mod node;
pub mod normalize;
pub mod wire;

pub use codec::{BlobPayload, CodecError, CodecResult, PackValue};
pub use error::{GraphError, GraphResult};
pub use function_id::FunctionId;
pub use identity::{assign_identities, IdentityPlan, MAX_DEPTH};
pub use node::{Arg, CachingLevel, NodeId, RequestGraph, RequestNode, RetryPolicy};
pub use normalize::{normalize, TypeTag};
pub use wire::DecodedGraph;
