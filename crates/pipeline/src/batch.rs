//! Batch buffer - nodes appended since the last node-batch tick

use serde::Serialize;
use tangle_core::Tip;

/// Pending nodes between two batch ticks
#[derive(Debug, Default)]
pub struct BatchBuffer {
    pending: Vec<Tip>,
}

impl BatchBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a node for the next flush
    pub fn push(&mut self, tip: Tip) {
        self.pending.push(tip);
    }

    /// Take the pending nodes, leaving the buffer empty.
    /// Returns `None` when nothing is pending so empty batches are never sent.
    pub fn take(&mut self) -> Option<Vec<Tip>> {
        if self.pending.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.pending))
        }
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Broadcast counters, reported in logs
#[derive(Debug, Clone, Default, Serialize)]
pub struct BroadcastStats {
    pub batches_broadcast: u64,
    pub tips_broadcast: u64,
    pub stats_broadcast: u64,
    pub history_pages_served: u64,
    pub frames_dropped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tip(hash: &str) -> Tip {
        Tip {
            v: 0.0,
            h: hash.to_string(),
            t: "T".to_string(),
            b: "B".to_string(),
        }
    }

    #[test]
    fn test_take_empty_is_none() {
        let mut batch = BatchBuffer::new();
        assert!(batch.take().is_none());
    }

    #[test]
    fn test_take_preserves_order_and_clears() {
        let mut batch = BatchBuffer::new();
        batch.push(tip("A"));
        batch.push(tip("B"));

        let taken = batch.take().unwrap();
        assert_eq!(
            taken.iter().map(|t| t.h.as_str()).collect::<Vec<_>>(),
            vec!["A", "B"]
        );
        assert!(batch.is_empty());
        assert!(batch.take().is_none());
    }
}
