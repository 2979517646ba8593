//! Feed Decoder
//!
//! Parses space-delimited frames from the upstream feed into typed events.
//! Field positions are fixed by the upstream protocol:
//! - `tx <hash> <addr> <value> <tag> <ts> <idx> <lastIdx> <bundle> <trunk> <branch> ...`
//! - `sn <idx> <hash> ...`
//! - `lmi <prevIdx> <newIdx>`

use crate::types::NewNode;

/// Topics the visualiser subscribes to on the feed
pub const FEED_TOPICS: [&str; 3] = ["tx", "sn", "lmi"];

const TX_HASH: usize = 1;
const TX_VALUE: usize = 3;
const TX_TRUNK: usize = 9;
const TX_BRANCH: usize = 10;
const SN_HASH: usize = 2;
const LMI_INDEX: usize = 2;

/// Event decoded from a single feed frame
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// A new node was attached to the tangle
    Append(NewNode),
    /// A node was confirmed
    Confirm { hash: String },
    /// The latest milestone index moved
    MilestoneUpdate { milestone: u64 },
    /// Unknown topic or malformed frame
    Unrecognized,
}

/// Decode a raw frame. Never fails: anything unusable is `Unrecognized`.
pub fn decode_frame(frame: &str) -> FeedEvent {
    let fields: Vec<&str> = frame.trim_end_matches(['\r', '\n']).split(' ').collect();

    match fields[0] {
        "tx" if fields.len() > TX_BRANCH => FeedEvent::Append(NewNode {
            hash: fields[TX_HASH].to_string(),
            value: clamp_value(fields[TX_VALUE]),
            trunk: fields[TX_TRUNK].to_string(),
            branch: fields[TX_BRANCH].to_string(),
        }),
        "sn" if fields.len() > SN_HASH => FeedEvent::Confirm {
            hash: fields[SN_HASH].to_string(),
        },
        "lmi" if fields.len() > LMI_INDEX => match fields[LMI_INDEX].parse::<u64>() {
            Ok(milestone) => FeedEvent::MilestoneUpdate { milestone },
            Err(_) => FeedEvent::Unrecognized,
        },
        _ => FeedEvent::Unrecognized,
    }
}

/// Parse a value field; anything unparseable, non-finite or non-positive is 0
pub fn clamp_value(raw: &str) -> f64 {
    match raw.parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => value,
        _ => 0.0,
    }
}

impl FeedEvent {
    /// Short name for logging
    pub fn kind(&self) -> &'static str {
        match self {
            FeedEvent::Append(_) => "append",
            FeedEvent::Confirm { .. } => "confirm",
            FeedEvent::MilestoneUpdate { .. } => "milestone",
            FeedEvent::Unrecognized => "unrecognized",
        }
    }
}
