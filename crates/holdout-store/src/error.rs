//! Error types for the store layer.

/// Errors returned by a [`Store`](crate::Store) backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness rule was violated: a duplicate room code, a second
    /// card of one category for a player, or the same card dealt twice.
    #[error("conflict: {0}")]
    Conflict(String),

    /// The row to update or delete does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The backend cannot serve requests right now.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Reference data could not be parsed.
    #[error("invalid reference data: {0}")]
    InvalidReferenceData(#[from] toml::de::Error),
}
