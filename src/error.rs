// Error handling module
// Defines error types for transport, refresh, storage and API calls

use thiserror::Error;

use crate::models::envelope::ApiErrorBody;
use crate::transport::{ApiResponse, TransportError};

/// Failures of the refresh-token exchange
///
/// Cloneable so a single outcome can be delivered to every queued waiter.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefreshError {
    /// No refresh token stored, the server was not contacted
    #[error("No refresh token available")]
    MissingRefreshToken,

    /// No session id stored, the server was not contacted
    #[error("No session ID available")]
    MissingSessionId,

    /// Stored credential cannot be encoded as a header value
    #[error("Stored credential is not a valid header value: {0}")]
    InvalidHeader(String),

    /// Refresh request never produced a response (timeout, connection refused, ...)
    #[error("Refresh request failed: {0}")]
    Network(TransportError),

    /// Server answered with anything other than a success envelope
    #[error("Failed to refresh token: {status} - {message}")]
    Rejected { status: u16, message: String },

    /// New credentials could not be persisted
    #[error("Failed to persist refreshed credentials: {0}")]
    Storage(String),

    /// Exchange task went away without settling
    #[error("Token refresh was abandoned before it settled")]
    Abandoned,
}

impl RefreshError {
    /// True when the exchange failed because the server could not be reached,
    /// as opposed to the server refusing the credentials
    pub fn is_network(&self) -> bool {
        matches!(self, RefreshError::Network(_))
    }
}

/// Credential storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    /// SQLite failure
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Filesystem failure (key file, permissions)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Encryption or decryption failed
    #[error("Encryption error: {0}")]
    Crypto(String),

    /// Stored value could not be decoded
    #[error("Corrupt value for {key}: {reason}")]
    Corrupt { key: String, reason: String },

    /// A previous holder of the connection lock panicked
    #[error("Storage lock poisoned")]
    Poisoned,

    /// Blocking storage task panicked or was cancelled
    #[error("Storage task failed: {0}")]
    Task(String),
}

/// Errors returned to callers of the API client
#[derive(Error, Debug)]
pub enum ApiError {
    /// Non-2xx response, carried unchanged
    #[error("Request failed with status {}: {}", .0.status.as_u16(), .0.text())]
    Status(ApiResponse),

    /// Network-level failure before a response arrived
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Terminal refresh failure (replaces the 401 that triggered it)
    #[error("Authentication failed: {0}")]
    Refresh(#[from] RefreshError),

    /// Response body did not have the expected shape
    #[error("Invalid response: {0}")]
    Decode(String),

    /// Credential storage failure
    #[error("Credential storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ApiError {
    /// HTTP status of the failed response, if there was one
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status(response) => Some(response.status.as_u16()),
            _ => None,
        }
    }

    /// Message suitable for showing to the user
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Status(response) => {
                let body: ApiErrorBody = response.json().unwrap_or_default();
                body.display_message()
                    .unwrap_or_else(|| format!("Error {}: Something went wrong.", response.status.as_u16()))
            }
            ApiError::Transport(_) => {
                "No response from server. Please check your internet connection.".to_string()
            }
            ApiError::Refresh(err) => err.to_string(),
            ApiError::Decode(_) | ApiError::Storage(_) => "An unexpected error occurred.".to_string(),
        }
    }
}

/// Result type alias for API operations
pub type Result<T> = std::result::Result<T, ApiError>;
