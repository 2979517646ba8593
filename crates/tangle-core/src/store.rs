//! Node Store - append-only record of every observed node
//!
//! Sequence indices start at 0 and are gap-free. The store is owned by the
//! single ingest task, so mutation goes through `&mut self` and no locking
//! is involved.

use crate::{
    error::StoreError,
    types::{NewNode, NodeRecord},
};
use std::collections::HashMap;

/// Append-and-range-query store for nodes
pub trait NodeStore: Send {
    /// Store a node and return its sequence index
    fn append(&mut self, node: NewNode) -> Result<u64, StoreError>;

    /// Mark a node confirmed. Returns its value, or `None` if the hash is unknown.
    fn confirm(&mut self, hash: &str) -> Result<Option<f64>, StoreError>;

    /// Look up a node by hash
    fn get(&self, hash: &str) -> Result<Option<NodeRecord>, StoreError>;

    /// Up to `count` nodes with index in `[index - count, index)`, ascending
    fn range_before(&self, index: u64, count: usize) -> Result<Vec<NodeRecord>, StoreError>;

    /// Number of nodes stored, which is also the next sequence index
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flush pending writes, if the store has any
    fn flush(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Bounds of a backward range query, clipped to `len`
pub(crate) fn range_bounds(index: u64, count: usize, len: u64) -> (u64, u64) {
    let end = index.min(len);
    let start = index.saturating_sub(count as u64).min(end);
    (start, end)
}

/// In-memory node store
#[derive(Debug, Default)]
pub struct MemoryNodeStore {
    /// Nodes in sequence order; position == index
    nodes: Vec<NodeRecord>,
    /// Latest index seen for each hash
    by_hash: HashMap<String, u64>,
}

impl MemoryNodeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NodeStore for MemoryNodeStore {
    fn append(&mut self, node: NewNode) -> Result<u64, StoreError> {
        let index = self.nodes.len() as u64;
        self.by_hash.insert(node.hash.clone(), index);
        self.nodes.push(NodeRecord::new(index, node));
        Ok(index)
    }

    fn confirm(&mut self, hash: &str) -> Result<Option<f64>, StoreError> {
        let Some(&index) = self.by_hash.get(hash) else {
            return Ok(None);
        };
        let record = &mut self.nodes[index as usize];
        record.confirmed = true;
        Ok(Some(record.value))
    }

    fn get(&self, hash: &str) -> Result<Option<NodeRecord>, StoreError> {
        Ok(self
            .by_hash
            .get(hash)
            .map(|&index| self.nodes[index as usize].clone()))
    }

    fn range_before(&self, index: u64, count: usize) -> Result<Vec<NodeRecord>, StoreError> {
        let (start, end) = range_bounds(index, count, self.len());
        Ok(self.nodes[start as usize..end as usize].to_vec())
    }

    fn len(&self) -> u64 {
        self.nodes.len() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(hash: &str, value: f64) -> NewNode {
        NewNode {
            hash: hash.to_string(),
            value,
            trunk: "T".to_string(),
            branch: "B".to_string(),
        }
    }

    fn filled(count: u64) -> MemoryNodeStore {
        let mut store = MemoryNodeStore::new();
        for i in 0..count {
            store.append(node(&format!("H{}", i), 0.0)).unwrap();
        }
        store
    }

    #[test]
    fn test_indices_are_gap_free() {
        let mut store = MemoryNodeStore::new();
        for expected in 0..50 {
            let index = store.append(node(&format!("H{}", expected), 1.0)).unwrap();
            assert_eq!(index, expected);
        }
        assert_eq!(store.len(), 50);
    }

    #[test]
    fn test_confirm_known_and_unknown() {
        let mut store = MemoryNodeStore::new();
        store.append(node("H1", 5.0)).unwrap();

        assert_eq!(store.confirm("H1").unwrap(), Some(5.0));
        assert!(store.get("H1").unwrap().unwrap().confirmed);
        assert_eq!(store.confirm("missing").unwrap(), None);
    }

    #[test]
    fn test_range_before_pages() {
        let store = filled(300);

        let page = store.range_before(250, 100).unwrap();
        assert_eq!(page.len(), 100);
        assert_eq!(page.first().unwrap().index, 150);
        assert_eq!(page.last().unwrap().index, 249);

        let page = store.range_before(50, 100).unwrap();
        assert_eq!(page.len(), 50);
        assert_eq!(page.first().unwrap().index, 0);
        assert!(page.windows(2).all(|w| w[0].index < w[1].index));
    }

    #[test]
    fn test_range_before_clips_to_stored_nodes() {
        let store = filled(10);
        assert_eq!(store.range_before(105, 100).unwrap().len(), 5);
        assert!(store.range_before(500, 100).unwrap().is_empty());
        assert!(store.range_before(0, 100).unwrap().is_empty());
        assert!(MemoryNodeStore::new().range_before(100, 100).unwrap().is_empty());
    }
}
