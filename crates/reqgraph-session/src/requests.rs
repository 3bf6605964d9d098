//! Builders for the object-store requests.
//!
//! Each builder adds one request to `graph` and returns its node. Id arguments
//! accept either a literal id or the node of an earlier request, so requests
//! compose into a single graph. Object-store requests are fully cached by
//! the resolver; the normalization requests around them are not.
//!
//!
//! ```ignore
//! let object_id = post_object(&mut graph, rev, "array/string", &value)?;
//! let immutable_id = resolve_object_to_immutable(&mut graph, rev, object_id.into())?;
//! let root = retrieve_immutable_object(&mut graph, rev, immutable_id.into())?;
//! ```

use reqgraph_types::{
    normalize, Arg, CachingLevel, FunctionId, GraphResult, NodeId, PackValue, RequestGraph, RequestNode, TypeTag,
};

pub const POST_OBJECT: &str = "rq_post_iss_object_func";
pub const GET_OBJECT_METADATA: &str = "rq_get_iss_object_metadata_func";
pub const RESOLVE_OBJECT_TO_IMMUTABLE: &str = "rq_resolve_iss_object_to_immutable_func";
pub const RETRIEVE_IMMUTABLE_OBJECT: &str = "rq_retrieve_immutable_object_func";

/// Store `value` as a new object of type `schema`; resolves to the object id.
pub fn post_object(
    graph: &mut RequestGraph,
    revision: &str,
    schema: &str,
    value: &PackValue,
) -> GraphResult<NodeId> {
    let payload = normalize(graph, Arg::blob(value), TypeTag::Blob);
    graph.add(
        RequestNode::new(FunctionId::versioned(POST_OBJECT, revision), "post_iss_object")
            .with_arg(Arg::literal(schema))
            .with_arg(payload)
            .with_caching(CachingLevel::Full),
    )
}

/// Resolves to the metadata headers of an object.
pub fn get_object_metadata(
    graph: &mut RequestGraph,
    revision: &str,
    object_id: Arg,
) -> GraphResult<NodeId> {
    let object_id = normalize(graph, object_id, TypeTag::String);
    graph.add(
        RequestNode::new(
            FunctionId::versioned(GET_OBJECT_METADATA, revision),
            "get_iss_object_metadata",
        )
        .with_arg(object_id)
        .with_caching(CachingLevel::Full),
    )
}

/// Resolves an object id to the immutable id of its current content.
pub fn resolve_object_to_immutable(
    graph: &mut RequestGraph,
    revision: &str,
    object_id: Arg,
) -> GraphResult<NodeId> {
    let object_id = normalize(graph, object_id, TypeTag::String);
    graph.add(
        RequestNode::new(
            FunctionId::versioned(RESOLVE_OBJECT_TO_IMMUTABLE, revision),
            "resolve_iss_object_to_immutable",
        )
        .with_arg(object_id)
        // ignore_upgrades
        .with_arg(Arg::literal(false))
        .with_caching(CachingLevel::Full),
    )
}

/// Resolves to the encoded bytes stored under an immutable id.
pub fn retrieve_immutable_object(
    graph: &mut RequestGraph,
    revision: &str,
    immutable_id: Arg,
) -> GraphResult<NodeId> {
    let immutable_id = normalize(graph, immutable_id, TypeTag::String);
    graph.add(
        RequestNode::new(
            FunctionId::versioned(RETRIEVE_IMMUTABLE_OBJECT, revision),
            "retrieve_immutable_object",
        )
        .with_arg(immutable_id)
        .with_caching(CachingLevel::Full),
    )
}
