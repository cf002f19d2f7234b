//! Error types for postbox-relay.

use postbox_types::{ClientId, WireError};
use std::path::PathBuf;

/// Main error type for postbox-relay operations.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Protocol error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Logging setup error.
    #[error("logging error: {0}")]
    Logging(#[from] crate::logging::LoggingError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Storage layer errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Username already taken.
    #[error("username already registered: {username}")]
    DuplicateUsername {
        /// The rejected username.
        username: String,
    },

    /// A stored row could not be turned back into a record.
    #[error("corrupt row: {reason}")]
    Corrupt {
        /// What was wrong with the row.
        reason: String,
    },

    /// Database path error.
    #[error("invalid database path: {path}")]
    InvalidPath {
        /// The invalid path.
        path: PathBuf,
    },
}

/// Protocol layer errors.
///
/// Every variant is answered with a GeneralError response, except stream
/// failures and truncated headers, which close the connection.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Header or payload could not be decoded.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// Registration with a username that is already taken.
    #[error("username already registered: {username}")]
    DuplicateUsername {
        /// The rejected username.
        username: String,
    },

    /// Request referenced a client that is not registered.
    #[error("unknown client: {client_id}")]
    UnknownClient {
        /// The missing client.
        client_id: ClientId,
    },

    /// SendMessage carried a type byte outside 1..=4.
    #[error("unsupported message type: {0}")]
    UnsupportedMessageType(u8),

    /// Declared payload exceeds the configured limit.
    #[error("payload too large: {size} bytes (limit: {limit} bytes)")]
    PayloadTooLarge {
        /// Declared payload size.
        size: u32,
        /// Configured limit.
        limit: u32,
    },

    /// Storage failed while handling the request.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[source] StorageError),

    /// Stream error.
    #[error("stream error: {0}")]
    Stream(String),
}

impl From<StorageError> for ProtocolError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::DuplicateUsername { username } => {
                ProtocolError::DuplicateUsername { username }
            }
            other => ProtocolError::StorageUnavailable(other),
        }
    }
}

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;

/// Result type alias for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Result type alias for protocol operations.
pub type ProtocolResult<T> = std::result::Result<T, ProtocolError>;
