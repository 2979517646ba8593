//! Confirmation lookups
//!
//! A confirmation only carries a hash. Whether it counts as a valued
//! confirmation depends on the node's value, which may have to be fetched
//! from the ledger node's HTTP API. Lookups run off the ingest task and
//! report back through a channel.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

/// Offset of the value field within transaction trytes
const VALUE_OFFSET: usize = 2268;
/// Length of the value field in trytes
const VALUE_LENGTH: usize = 27;

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("node api error: {0}")]
    Api(String),

    #[error("malformed transaction: {0}")]
    Malformed(String),
}

/// Resolves the value of a confirmed node
#[async_trait]
pub trait ConfirmationLookup: Send + Sync {
    /// `Ok(None)` when the node is unknown to the lookup source
    async fn value_of(&self, hash: &str) -> Result<Option<f64>, LookupError>;
}

/// Lookup against the ledger node's `getTrytes` command
pub struct NodeApiLookup {
    client: reqwest::Client,
    url: String,
}

#[derive(Debug, Deserialize)]
struct TrytesResponse {
    #[serde(default)]
    trytes: Vec<String>,
    #[serde(default)]
    error: Option<String>,
}

impl NodeApiLookup {
    /// Requests that take longer than `timeout` fail and count as unvalued
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, LookupError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl ConfirmationLookup for NodeApiLookup {
    async fn value_of(&self, hash: &str) -> Result<Option<f64>, LookupError> {
        let response: TrytesResponse = self
            .client
            .post(&self.url)
            .header("X-IOTA-API-Version", "1")
            .json(&json!({ "command": "getTrytes", "hashes": [hash] }))
            .send()
            .await?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(LookupError::Api(error));
        }

        match response.trytes.first() {
            Some(trytes) => decode_value(trytes).map(|value| value.map(|v| v.max(0) as f64)),
            None => Ok(None),
        }
    }
}

/// Decode the value field from transaction trytes.
///
/// A transaction the node has never seen comes back as all `9`s, which
/// decodes to `None`.
pub fn decode_value(trytes: &str) -> Result<Option<i64>, LookupError> {
    let bytes = trytes.as_bytes();
    if bytes.len() < VALUE_OFFSET + VALUE_LENGTH {
        return Err(LookupError::Malformed(format!(
            "expected at least {} trytes, got {}",
            VALUE_OFFSET + VALUE_LENGTH,
            bytes.len()
        )));
    }
    if bytes.iter().all(|&b| b == b'9') {
        return Ok(None);
    }

    let mut value: i64 = 0;
    for &tryte in bytes[VALUE_OFFSET..VALUE_OFFSET + VALUE_LENGTH].iter().rev() {
        let digit = tryte_value(tryte)
            .ok_or_else(|| LookupError::Malformed(format!("invalid tryte {:?}", tryte as char)))?;
        value = value
            .checked_mul(27)
            .and_then(|v| v.checked_add(digit))
            .ok_or_else(|| LookupError::Malformed("value overflow".to_string()))?;
    }

    Ok(Some(value))
}

/// Balanced ternary value of one tryte: `9` = 0, `A..M` = 1..13, `N..Z` = -13..-1
fn tryte_value(tryte: u8) -> Option<i64> {
    match tryte {
        b'9' => Some(0),
        b'A'..=b'M' => Some((tryte - b'A') as i64 + 1),
        b'N'..=b'Z' => Some((tryte - b'N') as i64 - 13),
        _ => None,
    }
}
