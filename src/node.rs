use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// Physical endpoint of a cluster participant.
///
/// Two nodes are the same physical node when they share host and port; the
/// system name is carried along for display only.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Node {
    pub system_name: String,
    pub host: String,
    pub port: u16,
}

impl Node {
    pub fn new(system_name: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            system_name: system_name.into(),
            host: host.into(),
            port,
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.host == other.host && self.port == other.port
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.host.hash(state);
        self.port.hash(state);
    }
}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        self.host
            .cmp(&other.host)
            .then_with(|| self.port.cmp(&other.port))
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.system_name, self.host, self.port)
    }
}

/// Opaque incarnation token of a process.
///
/// Generated once when a process starts; the membership core only compares
/// and hashes it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(Uuid);

impl NodeId {
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Short form is enough to tell incarnations apart in logs
        let simple = self.0.simple().to_string();
        write!(f, "{}", &simple[..8])
    }
}

/// A node plus the incarnation currently running at that address.
///
/// A restart at the same host and port yields a different `UniqueNode`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UniqueNode {
    pub node: Node,
    pub nid: NodeId,
}

impl UniqueNode {
    pub fn new(node: Node, nid: NodeId) -> Self {
        Self { node, nid }
    }

    /// Fresh incarnation at the given address.
    pub fn random(node: Node) -> Self {
        Self::new(node, NodeId::random())
    }

    pub fn is_same_physical_node(&self, other: &UniqueNode) -> bool {
        self.node == other.node
    }
}

impl fmt::Display for UniqueNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.node, self.nid)
    }
}
