//! Persistence Layer for the node store
//!
//! Uses sled to keep nodes across restarts. Records are bincode-encoded and
//! keyed by big-endian sequence index so range scans come back in order.

use crate::{
    error::StoreError,
    store::{range_bounds, NodeStore},
    types::{NewNode, NodeRecord},
};
use sled::{Db, IVec};
use std::path::Path;

/// Sled-backed node store
pub struct SledNodeStore {
    /// Sled database instance
    db: Db,
    /// Records by sequence index
    nodes: sled::Tree,
    /// Sequence index by hash
    hashes: sled::Tree,
    /// Index handed to the next append
    next_index: u64,
}

impl SledNodeStore {
    /// Open or create a store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let db = sled::open(&path)?;
        let nodes = db.open_tree("nodes")?;
        let hashes = db.open_tree("hashes")?;

        let next_index = match nodes.last()? {
            Some((key, _)) => decode_index(&key)? + 1,
            None => 0,
        };

        tracing::info!(
            "Opened node store at {:?} ({} nodes)",
            path.as_ref(),
            next_index
        );

        Ok(Self {
            db,
            nodes,
            hashes,
            next_index,
        })
    }

    fn load(&self, index: u64) -> Result<Option<NodeRecord>, StoreError> {
        match self.nodes.get(index.to_be_bytes())? {
            Some(bytes) => Ok(Some(bincode::deserialize(&bytes)?)),
            None => Ok(None),
        }
    }

    fn index_of(&self, hash: &str) -> Result<Option<u64>, StoreError> {
        match self.hashes.get(hash.as_bytes())? {
            Some(key) => Ok(Some(decode_index(&key)?)),
            None => Ok(None),
        }
    }
}

fn decode_index(key: &IVec) -> Result<u64, StoreError> {
    let bytes: [u8; 8] = key
        .as_ref()
        .try_into()
        .map_err(|_| StoreError::CorruptKey(key.len()))?;
    Ok(u64::from_be_bytes(bytes))
}

impl NodeStore for SledNodeStore {
    fn append(&mut self, node: NewNode) -> Result<u64, StoreError> {
        let index = self.next_index;
        let key = index.to_be_bytes();
        let record = NodeRecord::new(index, node);

        self.nodes.insert(key, bincode::serialize(&record)?)?;
        self.hashes.insert(record.hash.as_bytes(), &key[..])?;
        self.next_index += 1;

        Ok(index)
    }

    fn confirm(&mut self, hash: &str) -> Result<Option<f64>, StoreError> {
        let Some(index) = self.index_of(hash)? else {
            return Ok(None);
        };
        let Some(mut record) = self.load(index)? else {
            return Ok(None);
        };

        if !record.confirmed {
            record.confirmed = true;
            self.nodes
                .insert(index.to_be_bytes(), bincode::serialize(&record)?)?;
        }

        Ok(Some(record.value))
    }

    fn get(&self, hash: &str) -> Result<Option<NodeRecord>, StoreError> {
        match self.index_of(hash)? {
            Some(index) => self.load(index),
            None => Ok(None),
        }
    }

    fn range_before(&self, index: u64, count: usize) -> Result<Vec<NodeRecord>, StoreError> {
        let (start, end) = range_bounds(index, count, self.next_index);
        let mut records = Vec::with_capacity((end - start) as usize);

        for result in self.nodes.range(start.to_be_bytes()..end.to_be_bytes()) {
            let (_, value) = result?;
            records.push(bincode::deserialize(&value)?);
        }

        Ok(records)
    }

    fn len(&self) -> u64 {
        self.next_index
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }
}
