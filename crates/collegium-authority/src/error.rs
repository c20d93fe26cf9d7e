//! Error types for authority scoring.

use thiserror::Error;

/// Errors raised by the authority scorer and its store.
#[derive(Debug, Error)]
pub enum AuthorityError {
    /// The contributor id is not registered.
    #[error("Unknown contributor: {0}")]
    UnknownContributor(String),

    /// Registration attempted for an id that already exists.
    #[error("Contributor already registered: {0}")]
    DuplicateContributor(String),

    /// Underlying sled database failure.
    #[error("Storage error: {0}")]
    Storage(#[from] sled::Error),

    /// A stored profile could not be (de)serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
