//! Store errors

use thiserror::Error;

/// Errors raised by node store implementations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("record encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("corrupt index key ({0} bytes)")]
    CorruptKey(usize),
}
