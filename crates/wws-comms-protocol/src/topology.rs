//! Relationship queries over a topology snapshot.
//!
//! Nothing here is cached: every call walks the current edges, which keeps
//! the results correct across wholesale snapshot replacement. Results keep
//! the order of the node sequence and only contain nodes that exist, so
//! dangling edges contribute nothing.

use std::collections::HashSet;

use crate::{EdgeKind, Node, Topology};

impl Topology {
    /// Nodes that are not the child end of any parent_child edge.
    pub fn roots(&self) -> Vec<&Node> {
        let child_ids: HashSet<&str> = self
            .edges
            .iter()
            .filter(|e| e.kind == EdgeKind::ParentChild)
            .map(|e| e.to.as_str())
            .collect();
        self.nodes
            .iter()
            .filter(|n| !child_ids.contains(n.id.as_str()))
            .collect()
    }

    /// Nodes spawned by `id`.
    pub fn children_of(&self, id: &str) -> Vec<&Node> {
        let child_ids: HashSet<&str> = self
            .edges
            .iter()
            .filter(|e| e.kind == EdgeKind::ParentChild && e.from == id)
            .map(|e| e.to.as_str())
            .collect();
        self.nodes
            .iter()
            .filter(|n| child_ids.contains(n.id.as_str()))
            .collect()
    }

    /// Nodes sharing a peer edge with `id`, whichever side `id` is on.
    pub fn peers_of(&self, id: &str) -> Vec<&Node> {
        let peer_ids: HashSet<&str> = self
            .edges
            .iter()
            .filter_map(|e| e.peer_partner(id))
            .collect();
        self.nodes
            .iter()
            .filter(|n| peer_ids.contains(n.id.as_str()))
            .collect()
    }
}
