//! Wire events exchanged with viewers
//!
//! Every message is a JSON text frame `{"event": <name>, "data": <payload>}`.

use crate::{stats::StatsWindow, types::Tip};
use serde::{Deserialize, Serialize};

/// Batch of nodes, used for live batches and history pages alike
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TipsPayload {
    pub tips: Vec<Tip>,
}

/// Node wrapper of the single-node `tip` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyTip {
    pub hashes: Tip,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyTipPayload {
    pub tip: LegacyTip,
}

/// Events pushed from the server to viewers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum ServerEvent {
    /// Sent once to each new viewer
    Welcome(StatsWindow),
    /// Broadcast on every stats tick
    Stats(StatsWindow),
    /// New batch, or a private history page
    Tips(TipsPayload),
    /// Single node, legacy variant of `Tips`
    Tip(LegacyTipPayload),
}

impl ServerEvent {
    pub fn tips(tips: Vec<Tip>) -> Self {
        ServerEvent::Tips(TipsPayload { tips })
    }

    pub fn legacy_tip(tip: Tip) -> Self {
        ServerEvent::Tip(LegacyTipPayload {
            tip: LegacyTip { hashes: tip },
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::Welcome(_) => "welcome",
            ServerEvent::Stats(_) => "stats",
            ServerEvent::Tips(_) => "tips",
            ServerEvent::Tip(_) => "tip",
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// Requests sent by a viewer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum ViewerRequest {
    /// Page of up to 100 nodes strictly before the given index
    History(u64),
}

impl ViewerRequest {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}
