//! Error types for bsync-core
//!
//! Errors fall into two groups: fatal errors that abort an operation
//! (scan failures, configuration problems) and per-task errors that are
//! stored on an individual upload task and only summarized at the end.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using the crate error
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all bsync operations
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration file could not be read, parsed or written
    #[error("Configuration error: {0}")]
    Config(String),

    /// Alias lookup failed
    #[error("Alias not found: {0}")]
    AliasNotFound(String),

    /// Malformed local or remote path
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Object or bucket does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Authentication or authorization rejected by the store
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Transport-level failure talking to the store
    #[error("Network error: {0}")]
    Network(String),

    /// Local I/O error outside of a single upload task
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Directory traversal could not proceed. Aborts the whole operation.
    #[error("Scan failed: {0}")]
    Scan(String),

    /// Local digest could not be computed for one file
    #[error("Failed to hash {}: {source}", path.display())]
    HashCompute {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Existence or metadata query for one key failed
    #[error("Remote check failed for {key}: {message}")]
    RemoteCheck { key: String, message: String },

    /// The store rejected or failed an upload
    #[error("Upload failed for {key}: {message}")]
    Transfer { key: String, message: String },

    /// One or more tasks failed. Causes were reported as they happened.
    #[error("Some files failed to upload ({failed}/{attempted})")]
    PartialFailure { failed: usize, attempted: usize },

    #[error("{0}")]
    General(String),
}

impl Error {
    /// Process exit code associated with this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::InvalidPath(_) => 2,
            Error::Network(_) | Error::RemoteCheck { .. } => 3,
            Error::Auth(_) => 4,
            Error::NotFound(_) | Error::AliasNotFound(_) => 5,
            _ => 1,
        }
    }

    /// Whether this error belongs to a single task rather than the whole run
    pub fn is_per_task(&self) -> bool {
        matches!(
            self,
            Error::HashCompute { .. } | Error::RemoteCheck { .. } | Error::Transfer { .. }
        )
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(e: toml::ser::Error) -> Self {
        Error::Config(e.to_string())
    }
}

impl From<walkdir::Error> for Error {
    fn from(e: walkdir::Error) -> Self {
        Error::Scan(e.to_string())
    }
}
