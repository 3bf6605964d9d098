//! Identity assignment for shared nodes.
//!
//! A node referenced from two or more argument positions is serialized once,
//! at its first pre-order visit, and referred to by identity afterwards. The
//! identity counter lives in a single [`IdentityPlan`], so identities are
//! unique within one encoding and may repeat across independent ones.

use crate::{GraphError, GraphResult, NodeId, RequestGraph};
use std::collections::HashMap;

/// Identities for the shared nodes reachable from one root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityPlan {
    identities: HashMap<NodeId, u64>,
}

impl IdentityPlan {
    /// Identity of a shared node, `None` for nodes with a single parent.
    pub fn identity(&self, id: NodeId) -> Option<u64> {
        self.identities.get(&id).copied()
    }

    /// Number of nodes that received an identity.
    pub fn shared_count(&self) -> usize {
        self.identities.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnPath,
    Done,
}

/// Deepest request nesting accepted, counting the root as depth 1.
///
/// Encoders and JSON tooling on both ends of the wire recurse per level, so a
/// bound here keeps deep graphs a typed error instead of a stack overflow.
pub const MAX_DEPTH: usize = 256;

/// Walk the graph from `root`, reject cycles and number the shared nodes.
///
/// The walk is iterative; paths longer than [`MAX_DEPTH`] nodes fail with
/// [`GraphError::TooDeep`]. Children of a shared node are counted once, matching the single full
/// encoding the node gets.
pub fn assign_identities(graph: &RequestGraph, root: NodeId) -> GraphResult<IdentityPlan> {
    graph.node(root)?;

    let mut marks = vec![Mark::Unvisited; graph.len()];
    let mut references: HashMap<NodeId, usize> = HashMap::new();
    let mut preorder = vec![root];
    let mut stack = vec![(root, 0usize)];
    marks[root.index()] = Mark::OnPath;

    while let Some(&(node, pos)) = stack.last() {
        let args = graph.node(node)?.args();
        if pos == args.len() {
            marks[node.index()] = Mark::Done;
            stack.pop();
            continue;
        }
        if let Some(top) = stack.last_mut() {
            top.1 += 1;
        }

        let Some(child) = args[pos].as_node() else {
            continue;
        };
        graph.node(child)?;
        *references.entry(child).or_insert(0) += 1;

        match marks[child.index()] {
            Mark::OnPath => {
                return Err(GraphError::Cycle {
                    node: child.index(),
                })
            }
            Mark::Done => {}
            Mark::Unvisited => {
                if stack.len() >= MAX_DEPTH {
                    return Err(GraphError::TooDeep { limit: MAX_DEPTH });
                }
                marks[child.index()] = Mark::OnPath;
                preorder.push(child);
                stack.push((child, 0));
            }
        }
    }

    let mut identities = HashMap::new();
    let mut next = 1u64;
    for id in preorder {
        if references.get(&id).copied().unwrap_or(0) >= 2 {
            identities.insert(id, next);
            next += 1;
        }
    }

    Ok(IdentityPlan { identities })
}
