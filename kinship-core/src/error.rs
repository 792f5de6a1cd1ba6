//! Error types for the Kinship core library.

use thiserror::Error;

use crate::types::PlayerId;

/// Top-level error type for all Kinship operations.
///
/// Precondition failures of relationship operations (befriending yourself,
/// accepting a request that does not exist, ...) are not errors; they are
/// reported as [`crate::protocol::Outcome::Rejected`].
#[derive(Error, Debug)]
pub enum KinshipError {
    /// The player's record is not resident in the cache yet.
    #[error("Social data for {0} is still loading")]
    NotReady(PlayerId),

    /// SQLite persistence error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No pooled connection became available in time.
    #[error("Timed out after {waited_ms}ms waiting for a database connection")]
    PoolTimeout {
        /// How long the caller waited.
        waited_ms: u64,
    },

    /// A blocking storage task panicked or was cancelled.
    #[error("Storage worker failed: {0}")]
    Worker(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl KinshipError {
    /// Whether this error means the storage backend failed to complete an
    /// operation (as opposed to a record simply not being loaded yet).
    #[must_use]
    pub fn is_backend_failure(&self) -> bool {
        matches!(
            self,
            Self::Database(_) | Self::PoolTimeout { .. } | Self::Worker(_) | Self::Io(_)
        )
    }
}

impl From<tokio::task::JoinError> for KinshipError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Worker(err.to_string())
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, KinshipError>;
