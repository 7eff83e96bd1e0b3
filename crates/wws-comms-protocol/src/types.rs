use std::fmt;

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Lifecycle state reported for an agent.
///
/// The kernel reports states as free-form strings; anything outside the
/// four known states is kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeState {
    Running,
    Suspended,
    Terminated,
    Crashed,
    Other(String),
}

impl NodeState {
    pub fn as_str(&self) -> &str {
        match self {
            NodeState::Running => "Running",
            NodeState::Suspended => "Suspended",
            NodeState::Terminated => "Terminated",
            NodeState::Crashed => "Crashed",
            NodeState::Other(s) => s.as_str(),
        }
    }

    /// Whether the agent is no longer alive.
    pub fn is_dead(&self) -> bool {
        matches!(self, NodeState::Terminated | NodeState::Crashed)
    }
}

impl Default for NodeState {
    fn default() -> Self {
        NodeState::Other(String::new())
    }
}

impl From<String> for NodeState {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "running" => NodeState::Running,
            "suspended" => NodeState::Suspended,
            "terminated" => NodeState::Terminated,
            "crashed" => NodeState::Crashed,
            _ => NodeState::Other(s),
        }
    }
}

impl From<NodeState> for String {
    fn from(state: NodeState) -> Self {
        match state {
            NodeState::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An agent in the topology graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Agent ID, unique within a topology.
    pub id: String,
    /// Human-readable agent name.
    #[serde(default)]
    pub name: String,
    /// Free-form agent category.
    #[serde(rename = "type", default)]
    pub node_type: String,
    #[serde(default)]
    pub state: NodeState,
    /// Model the agent runs on, when the kernel reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Node {
    pub fn new(id: impl Into<String>, name: impl Into<String>, state: NodeState) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            node_type: String::new(),
            state,
            model: None,
        }
    }

    /// Name to show for this node, falling back to its ID.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

/// The kind of relationship between two agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// `from` spawned `to`.
    ParentChild,
    /// Undirected association between two agents.
    Peer,
    /// Relation kind this client does not understand.
    #[serde(other)]
    Unknown,
}

/// A relation between two agents. Endpoints need not exist in the node set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub kind: EdgeKind,
}

impl Edge {
    pub fn parent_child(parent: impl Into<String>, child: impl Into<String>) -> Self {
        Self {
            from: parent.into(),
            to: child.into(),
            kind: EdgeKind::ParentChild,
        }
    }

    pub fn peer(a: impl Into<String>, b: impl Into<String>) -> Self {
        Self {
            from: a.into(),
            to: b.into(),
            kind: EdgeKind::Peer,
        }
    }

    /// The other endpoint of a peer edge touching `id`.
    pub fn peer_partner(&self, id: &str) -> Option<&str> {
        if self.kind != EdgeKind::Peer {
            return None;
        }
        if self.from == id {
            Some(self.to.as_str())
        } else if self.to == id {
            Some(self.from.as_str())
        } else {
            None
        }
    }
}

/// Full snapshot of the agent graph. Never mutated in place; a refresh
/// replaces the whole value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Topology {
    pub fn new(nodes: Vec<Node>, edges: Vec<Edge>) -> Self {
        Self { nodes, edges }
    }

    pub fn from_json(raw: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(raw).map_err(|e| ProtocolError::MalformedTopology(e.to_string()))
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id == id)
    }
}
