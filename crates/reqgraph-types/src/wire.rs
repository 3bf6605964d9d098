//! Canonical wire format of a request graph.
//!
//! ```text
//! { "function_id": {"name": .., "revision": ..}, "title": .., "args": [..],
//!   "id": <identity, shared nodes only>, "retry": {..}?,
//!   "caching": "none" | "memory" | "full"? }
//! ```
//!
//! Each argument is a full node, a back-reference `{"ref": <identity>}` or a
//! literal `{"value": <json>}`. When a context identifier is attached it is
//! the first argument of the root.

use crate::identity::{assign_identities, IdentityPlan, MAX_DEPTH};
use crate::{
    Arg, CachingLevel, FunctionId, GraphError, GraphResult, NodeId, RequestGraph, RequestNode,
    RetryPolicy,
};
use serde_json::{json, Map, Value};
use std::collections::{HashMap, HashSet};

const FUNCTION_ID: &str = "function_id";
const TITLE: &str = "title";
const ARGS: &str = "args";
const IDENTITY: &str = "id";
const REF: &str = "ref";
const VALUE: &str = "value";
const RETRY: &str = "retry";
const CACHING: &str = "caching";

/// A graph read back from its wire form.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedGraph {
    pub graph: RequestGraph,
    pub root: NodeId,
    /// Context identifier taken from the root, when decoded with one.
    pub context_id: Option<String>,
}

/// Encode the graph reachable from `root`.
///
/// Cycles and graphs nested deeper than [`MAX_DEPTH`] are rejected before
/// anything is produced. Shared nodes are emitted in full at their first
/// pre-order visit and as `{"ref": id}` afterwards.
pub fn encode(graph: &RequestGraph, root: NodeId, context_id: Option<&str>) -> GraphResult<Value> {
    let plan = assign_identities(graph, root)?;
    let mut encoded = encode_tree(graph, root, &plan)?;

    if let Some(context_id) = context_id {
        if let Some(args) = encoded.get_mut(ARGS).and_then(Value::as_array_mut) {
            args.insert(0, json!({ VALUE: context_id }));
        }
    }
    Ok(encoded)
}

/// A node whose arguments are being encoded.
struct Frame {
    id: NodeId,
    identity: Option<u64>,
    args: Vec<Value>,
}

fn encode_tree(graph: &RequestGraph, root: NodeId, plan: &IdentityPlan) -> GraphResult<Value> {
    let mut emitted = HashSet::new();
    let identity = plan.identity(root);
    if identity.is_some() {
        emitted.insert(root);
    }
    let mut stack = vec![Frame {
        id: root,
        identity,
        args: Vec::new(),
    }];
    let mut encoded = None;

    while let Some(frame) = stack.last_mut() {
        let node = graph.node(frame.id)?;
        match node.args().get(frame.args.len()) {
            None => {
                let value = node_value(node, frame.identity, std::mem::take(&mut frame.args));
                stack.pop();
                match stack.last_mut() {
                    Some(parent) => parent.args.push(value),
                    None => encoded = Some(value),
                }
            }
            Some(Arg::Literal(value)) => frame.args.push(json!({ VALUE: value })),
            Some(Arg::Node(child)) => {
                match plan.identity(*child) {
                    Some(identity) if emitted.contains(child) => {
                        frame.args.push(json!({ REF: identity }));
                    }
                    identity => {
                        if identity.is_some() {
                            emitted.insert(*child);
                        }
                        stack.push(Frame {
                            id: *child,
                            identity,
                            args: Vec::new(),
                        });
                    }
                }
            }
        }
    }

    encoded.ok_or(GraphError::DanglingReference(root.index()))
}

fn node_value(node: &RequestNode, identity: Option<u64>, args: Vec<Value>) -> Value {
    let mut object = Map::new();
    object.insert(FUNCTION_ID.to_string(), function_id_value(node.function_id()));
    object.insert(TITLE.to_string(), Value::String(node.title().to_string()));
    object.insert(ARGS.to_string(), Value::Array(args));
    if let Some(identity) = identity {
        object.insert(IDENTITY.to_string(), Value::from(identity));
    }
    if let Some(retry) = node.retry() {
        object.insert(
            RETRY.to_string(),
            json!({
                "base_millis": retry.base_millis,
                "max_attempts": retry.max_attempts,
            }),
        );
    }
    if let Some(caching) = node.caching() {
        object.insert(CACHING.to_string(), json!(caching));
    }
    Value::Object(object)
}

fn function_id_value(function_id: &FunctionId) -> Value {
    match function_id.revision() {
        Some(revision) => json!({ "name": function_id.name(), "revision": revision }),
        None => json!({ "name": function_id.name() }),
    }
}

/// Decode a graph that carries no context identifier.
pub fn decode(value: &Value) -> GraphResult<DecodedGraph> {
    let mut decoder = Decoder::default();
    let root = decoder.decode_node(value, 1)?;
    Ok(DecodedGraph {
        graph: decoder.graph,
        root,
        context_id: None,
    })
}

/// Decode a root request whose first argument is the context identifier.
pub fn decode_with_context(value: &Value) -> GraphResult<DecodedGraph> {
    let mut stripped = value.clone();
    let context = stripped
        .get_mut(ARGS)
        .and_then(Value::as_array_mut)
        .filter(|args| !args.is_empty())
        .map(|args| args.remove(0))
        .ok_or(GraphError::MissingField("context_id"))?;
    let context_id = context
        .get(VALUE)
        .and_then(Value::as_str)
        .ok_or(GraphError::MissingField("context_id"))?
        .to_string();

    let mut decoded = decode(&stripped)?;
    decoded.context_id = Some(context_id);
    Ok(decoded)
}

#[derive(Default)]
struct Decoder {
    graph: RequestGraph,
    identities: HashMap<u64, NodeId>,
}

impl Decoder {
    fn decode_node(&mut self, value: &Value, depth: usize) -> GraphResult<NodeId> {
        if depth > MAX_DEPTH {
            return Err(GraphError::TooDeep { limit: MAX_DEPTH });
        }
        let object = value
            .as_object()
            .ok_or_else(|| GraphError::InvalidArgument(format!("expected a request, got {value}")))?;

        let function_id = object
            .get(FUNCTION_ID)
            .ok_or(GraphError::MissingField(FUNCTION_ID))?;
        let function_id: FunctionId = serde_json::from_value(function_id.clone())
            .map_err(|e| GraphError::InvalidArgument(format!("invalid function_id: {e}")))?;
        let title = object
            .get(TITLE)
            .and_then(Value::as_str)
            .ok_or(GraphError::MissingField(TITLE))?;
        let args = object
            .get(ARGS)
            .and_then(Value::as_array)
            .ok_or(GraphError::MissingField(ARGS))?;

        let mut node = RequestNode::new(function_id, title);
        for arg in args {
            node = node.with_arg(self.decode_arg(arg, depth)?);
        }
        if let Some(retry) = object.get(RETRY) {
            let retry: RetryPolicy = serde_json::from_value(retry.clone())
                .map_err(|e| GraphError::InvalidArgument(format!("invalid retry policy: {e}")))?;
            node = node.with_retry(retry);
        }
        if let Some(caching) = object.get(CACHING) {
            let caching: CachingLevel = serde_json::from_value(caching.clone())
                .map_err(|e| GraphError::InvalidArgument(format!("invalid caching level: {e}")))?;
            node = node.with_caching(caching);
        }

        let id = self.graph.add(node)?;
        if let Some(identity) = object.get(IDENTITY) {
            let identity = identity
                .as_u64()
                .ok_or_else(|| GraphError::InvalidArgument(format!("invalid identity {identity}")))?;
            if self.identities.insert(identity, id).is_some() {
                return Err(GraphError::IdentityCollision(identity));
            }
        }
        Ok(id)
    }

    fn decode_arg(&mut self, value: &Value, depth: usize) -> GraphResult<Arg> {
        let object = value
            .as_object()
            .ok_or_else(|| GraphError::InvalidArgument(format!("expected an argument, got {value}")))?;

        if let Some(identity) = object.get(REF) {
            let identity = identity
                .as_u64()
                .ok_or_else(|| GraphError::InvalidArgument(format!("invalid back-reference {identity}")))?;
            return self
                .identities
                .get(&identity)
                .map(|id| Arg::Node(*id))
                .ok_or(GraphError::UnknownReference(identity));
        }
        if let Some(literal) = object.get(VALUE) {
            return Ok(Arg::Literal(literal.clone()));
        }
        Ok(Arg::Node(self.decode_node(value, depth + 1)?))
    }
}
