//! Request nodes and the arena that owns them.
//!
//! Nodes are never shared through pointers. A graph is an arena of nodes and
//! an argument refers to another node by its index in that arena, so a node
//! used at several argument positions is simply the same index appearing more
//! than once.

use crate::codec::{BlobPayload, PackValue};
use crate::{wire, FunctionId, GraphError, GraphResult};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Index of a node inside the [`RequestGraph`] that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in its arena.
    pub fn index(self) -> usize {
        self.0
    }
}

/// One argument position of a request node.
///
/// Whether an argument is a literal or a request is decided when the argument
/// is built, never inferred later from the shape of the value.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// A plain value passed through to the function.
    Literal(serde_json::Value),
    /// The result of another request in the same graph.
    Node(NodeId),
}

impl Arg {
    /// Build a literal argument.
    pub fn literal(value: impl Into<serde_json::Value>) -> Self {
        Self::Literal(value.into())
    }

    /// Build a binary literal carrying the encoded value.
    pub fn blob(value: &PackValue) -> Self {
        Self::blob_payload(BlobPayload::from_value(value))
    }

    /// Build a binary literal from an already-encoded payload.
    pub fn blob_payload(payload: BlobPayload) -> Self {
        Self::Literal(serde_json::json!({
            "as_file": payload.as_file,
            "size": payload.size,
            "blob": payload.blob,
        }))
    }

    /// The referenced node, if this argument is a request.
    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Self::Node(id) => Some(*id),
            Self::Literal(_) => None,
        }
    }
}

impl From<NodeId> for Arg {
    fn from(id: NodeId) -> Self {
        Self::Node(id)
    }
}

/// Retry policy the resolver applies when evaluating a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Delay before the first retry, doubled on each further attempt.
    pub base_millis: u64,
    /// Total attempts, including the first.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_millis: 100,
            max_attempts: 3,
        }
    }
}

/// How the resolver may cache the result of a node.
///
/// Absent on the wire means the resolver's own default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachingLevel {
    /// Evaluate every time.
    None,
    /// Keep results in resolver memory.
    Memory,
    /// Keep results in memory and in secondary storage.
    Full,
}

/// One function invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestNode {
    function_id: FunctionId,
    title: String,
    args: Vec<Arg>,
    retry: Option<RetryPolicy>,
    caching: Option<CachingLevel>,
}

impl RequestNode {
    /// Create a node with no arguments.
    pub fn new(function_id: FunctionId, title: impl Into<String>) -> Self {
        Self {
            function_id,
            title: title.into(),
            args: Vec::new(),
            retry: None,
            caching: None,
        }
    }

    /// Append an argument.
    pub fn with_arg(mut self, arg: impl Into<Arg>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Append several arguments in order.
    pub fn with_args(mut self, args: impl IntoIterator<Item = Arg>) -> Self {
        self.args.extend(args);
        self
    }

    /// Attach a resolver-side retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn with_caching(mut self, caching: CachingLevel) -> Self {
        self.caching = Some(caching);
        self
    }

    pub fn function_id(&self) -> &FunctionId {
        &self.function_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    pub fn retry(&self) -> Option<RetryPolicy> {
        self.retry
    }

    pub fn caching(&self) -> Option<CachingLevel> {
        self.caching
    }
}

/// Arena of request nodes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestGraph {
    nodes: Vec<RequestNode>,
}

impl RequestGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes in the arena, reachable or not.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a node whose node arguments all refer to nodes already in the arena.
    pub fn add(&mut self, node: RequestNode) -> GraphResult<NodeId> {
        for arg in &node.args {
            if let Some(id) = arg.as_node() {
                self.check(id)?;
            }
        }
        self.nodes.push(node);
        Ok(NodeId(self.nodes.len() - 1))
    }

    /// Add a node that has no node arguments.
    pub(crate) fn push_node(&mut self, node: RequestNode) -> NodeId {
        debug_assert!(node.args.iter().all(|arg| arg.as_node().is_none()));
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    /// Look up a node.
    pub fn node(&self, id: NodeId) -> GraphResult<&RequestNode> {
        self.nodes
            .get(id.0)
            .ok_or(GraphError::DanglingReference(id.0))
    }

    /// Append an argument to an existing node.
    ///
    /// Unlike [`RequestGraph::add`] this may point a node at one of its own
    /// ancestors; such a cycle is reported when the graph is encoded.
    pub fn push_arg(&mut self, parent: NodeId, arg: impl Into<Arg>) -> GraphResult<()> {
        let arg = arg.into();
        if let Some(id) = arg.as_node() {
            self.check(id)?;
        }
        self.check(parent)?;
        self.nodes[parent.0].args.push(arg);
        Ok(())
    }

    /// Copy another arena into this one and return where its `root` landed.
    ///
    /// Sharing inside `other` is preserved; nodes of the two arenas stay
    /// distinct even if they are structurally equal.
    pub fn import(&mut self, other: &RequestGraph, root: NodeId) -> GraphResult<NodeId> {
        other.check(root)?;
        let offset = self.nodes.len();
        self.nodes.extend(other.nodes.iter().map(|node| RequestNode {
            args: node
                .args
                .iter()
                .map(|arg| match arg {
                    Arg::Node(id) => Arg::Node(NodeId(id.0 + offset)),
                    Arg::Literal(value) => Arg::Literal(value.clone()),
                })
                .collect(),
            ..node.clone()
        }));
        Ok(NodeId(root.0 + offset))
    }

    /// Content key of the request rooted at `root`.
    ///
    /// Lowercase hex SHA-256 of the canonical wire encoding without a
    /// context identifier, so the key does not depend on the session.
    pub fn digest(&self, root: NodeId) -> GraphResult<String> {
        let encoded = wire::encode(self, root, None)?;
        let mut hasher = Sha256::new();
        hasher.update(encoded.to_string().as_bytes());
        Ok(format!("{:x}", hasher.finalize()))
    }

    fn check(&self, id: NodeId) -> GraphResult<()> {
        if id.0 < self.nodes.len() {
            Ok(())
        } else {
            Err(GraphError::DanglingReference(id.0))
        }
    }
}
