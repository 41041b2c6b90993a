//! CooldownStore error types

use thiserror::Error;

/// Errors raised while writing the cooldown snapshot
///
/// Loading never fails: a missing or malformed file yields an empty store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to replace cooldown file: {0}")]
    Persist(#[from] tempfile::PersistError),
}
