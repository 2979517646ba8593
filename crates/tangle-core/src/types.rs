//! Node types shared by the store, the pipeline and the viewers

use serde::{Deserialize, Serialize};

/// A node decoded from an append frame, before it is given a sequence index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNode {
    /// Transaction hash
    pub hash: String,
    /// Transferred value, never negative
    pub value: f64,
    /// First parent reference
    pub trunk: String,
    /// Second parent reference
    pub branch: String,
}

/// A node as held by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Sequence index assigned at append time
    pub index: u64,
    pub hash: String,
    pub value: f64,
    pub trunk: String,
    pub branch: String,
    /// Set once a confirmation for this hash has been seen
    pub confirmed: bool,
}

impl NodeRecord {
    pub fn new(index: u64, node: NewNode) -> Self {
        Self {
            index,
            hash: node.hash,
            value: node.value,
            trunk: node.trunk,
            branch: node.branch,
            confirmed: false,
        }
    }

    /// Wire representation sent to viewers
    pub fn to_tip(&self) -> Tip {
        Tip {
            v: self.value,
            h: self.hash.clone(),
            t: self.trunk.clone(),
            b: self.branch.clone(),
        }
    }
}

/// Compact node shape used on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tip {
    /// Value
    pub v: f64,
    /// Hash
    pub h: String,
    /// Trunk
    pub t: String,
    /// Branch
    pub b: String,
}

impl From<&NewNode> for Tip {
    fn from(node: &NewNode) -> Self {
        Self {
            v: node.value,
            h: node.hash.clone(),
            t: node.trunk.clone(),
            b: node.branch.clone(),
        }
    }
}
