//! Argument normalization.
//!
//! Functions that expect a request at some argument position accept either a
//! literal or an existing request. Normalization turns the literal case into a
//! trivial identity request so that every such position holds a node.

use crate::{Arg, FunctionId, NodeId, RequestGraph, RequestNode};
use std::fmt;

/// Expected type of a normalized argument, checked by the resolver before use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    String,
    Blob,
    Integer,
    Float,
    Boolean,
    Json,
}

impl TypeTag {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Blob => "blob",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Json => "json",
        }
    }

    /// Function id of the identity request for this type.
    pub fn normalization_function(self) -> FunctionId {
        FunctionId::unversioned(format!("normalization<{}>", self.as_str()))
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Turn `arg` into a node of `graph`.
///
/// A node argument is returned unchanged, which makes normalization
/// idempotent. A literal is wrapped in a new identity request tagged with
/// `tag`. This never fails; whether the argument is a literal or a node was
/// decided when it was built.
pub fn normalize(graph: &mut RequestGraph, arg: Arg, tag: TypeTag) -> NodeId {
    match arg {
        Arg::Node(id) => id,
        Arg::Literal(value) => graph.push_node(
            RequestNode::new(tag.normalization_function(), "arg").with_arg(Arg::Literal(value)),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_is_wrapped() {
        let mut graph = RequestGraph::new();
        let id = normalize(&mut graph, Arg::literal("61e8256000c030b6c41dffee788df15f"), TypeTag::String);

        let node = graph.node(id).unwrap();
        assert_eq!(node.function_id().name(), "normalization<string>");
        assert_eq!(node.function_id().revision(), None);
        assert_eq!(node.title(), "arg");
        assert_eq!(
            node.args(),
            &[Arg::literal("61e8256000c030b6c41dffee788df15f")]
        );
    }

    #[test]
    fn test_normalization_is_idempotent() {
        use crate::codec::PackValue;
        use serde_json::json;

        let literals = [
            (Arg::literal(42), TypeTag::Integer),
            (Arg::literal("61e8256000c030b6c41dffee788df15f"), TypeTag::String),
            (Arg::literal(0.5), TypeTag::Float),
            (Arg::literal(true), TypeTag::Boolean),
            (
                Arg::blob(&PackValue::Array(vec!["abc".into(), "def".into(), "ghi".into()])),
                TypeTag::Blob,
            ),
            (Arg::literal(json!({"nested": {"list": [1, 2, 3]}})), TypeTag::Json),
        ];

        for (literal, tag) in literals {
            let mut graph = RequestGraph::new();
            let wrapped = normalize(&mut graph, literal, tag);
            let snapshot = graph.clone();

            let again = normalize(&mut graph, Arg::Node(wrapped), tag);
            assert_eq!(again, wrapped, "{tag}");
            assert_eq!(graph, snapshot, "{tag}");
            assert_eq!(graph.digest(again).unwrap(), snapshot.digest(wrapped).unwrap());
        }
    }

    #[test]
    fn test_existing_request_is_not_wrapped() {
        let mut graph = RequestGraph::new();
        let request = graph
            .add(
                RequestNode::new(FunctionId::versioned("rq_post_iss_object_func", "g1"), "post")
                    .with_arg(Arg::literal("array/string")),
            )
            .unwrap();

        for tag in [TypeTag::String, TypeTag::Blob, TypeTag::Json] {
            assert_eq!(normalize(&mut graph, Arg::Node(request), tag), request);
        }
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_node_shaped_literal_is_still_a_literal() {
        let mut graph = RequestGraph::new();
        let lookalike = serde_json::json!({
            "function_id": {"name": "post_iss_object"},
            "title": "not a request",
            "args": [],
        });
        let id = normalize(&mut graph, Arg::Literal(lookalike.clone()), TypeTag::Json);

        let node = graph.node(id).unwrap();
        assert_eq!(node.function_id().name(), "normalization<json>");
        assert_eq!(node.args(), &[Arg::Literal(lookalike)]);
    }

    #[test]
    fn test_blob_tag() {
        assert_eq!(TypeTag::Blob.to_string(), "blob");
        assert_eq!(
            TypeTag::Blob.normalization_function(),
            FunctionId::unversioned("normalization<blob>")
        );
    }
}
