//! Tangle Core - shared building blocks for the visualiser
//!
//! This crate provides the pieces every other crate agrees on:
//! - Decoding of raw feed frames into typed events
//! - The rolling stats window and its aggregator
//! - The append-only node store (in-memory or sled-backed)
//! - Wire events exchanged with viewers

pub mod error;
pub mod feed;
pub mod persistence;
pub mod stats;
pub mod store;
pub mod types;
pub mod wire;

pub use error::StoreError;
pub use feed::{decode_frame, FeedEvent, FEED_TOPICS};
pub use persistence::SledNodeStore;
pub use stats::{StatsAggregator, StatsWindow};
pub use store::{MemoryNodeStore, NodeStore};
pub use types::{NewNode, NodeRecord, Tip};
pub use wire::{LegacyTip, LegacyTipPayload, ServerEvent, TipsPayload, ViewerRequest};

/// Number of nodes returned by one history page
pub const HISTORY_PAGE_SIZE: usize = 100;

/// Default stats broadcast interval in milliseconds
pub const DEFAULT_STATS_INTERVAL_MS: u64 = 60_000;

/// Default node-batch broadcast interval in milliseconds
pub const DEFAULT_BATCH_INTERVAL_MS: u64 = 5_000;
