//! Error types for campus-client.

use std::path::PathBuf;
use thiserror::Error;

/// Why a refresh exchange failed.
///
/// Cloneable so that every request queued behind the same refresh receives
/// an identical failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}{}", .message, status_suffix(.status))]
pub struct RefreshFailure {
    /// HTTP status returned by the refresh endpoint, if it answered at all.
    pub status: Option<u16>,
    /// Human readable reason.
    pub message: String,
}

impl RefreshFailure {
    /// Failure caused by a non-2xx answer from the refresh endpoint.
    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Failure that happened before any status was received.
    pub fn other(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (status {})", s)).unwrap_or_default()
}

/// The main error type for campus-client.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ───────────────────────────────────────────────────────
    /// The refresh exchange failed; the session has been terminated.
    #[error("Token refresh failed: {0}")]
    RefreshFailed(RefreshFailure),

    /// The refresh was abandoned before it settled.
    #[error("Token refresh was abandoned before completing")]
    RefreshAborted,

    /// The identity provider token was rejected by the backend.
    #[error("Identity token rejected by the server")]
    InvalidIdentityToken,

    /// The account is valid but not registered on the campus.
    #[error("Account is not registered on the campus: {0}")]
    NotEnrolled(String),

    /// The backend does not allow development logins.
    #[error("Development login is not enabled on the server")]
    DevLoginDisabled,

    /// No campus user matches the requested login.
    #[error("User not found: {0}")]
    UserNotFound(String),

    // ── API ──────────────────────────────────────────────────────────────────
    /// API returned an error response.
    #[error("API error {status}: {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the API.
        message: String,
    },

    /// A response body could not be decoded.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    // ── Storage ──────────────────────────────────────────────────────────────
    /// Storage I/O error.
    #[error("Storage I/O error at {path}: {message}")]
    StorageIo {
        /// Path that caused the error.
        path: PathBuf,
        /// Error description.
        message: String,
    },

    /// Storage serialization error.
    #[error("Storage serialization error: {0}")]
    StorageSerialization(String),

    /// Keyring backend error.
    #[error("Keyring error: {0}")]
    Keyring(String),

    // ── Infrastructure ───────────────────────────────────────────────────────
    /// Network/HTTP error.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid URL.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// A header value could not be built.
    #[error("Invalid header value: {0}")]
    InvalidHeader(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request timeout.
    #[error("Request timed out")]
    Timeout,
}

impl From<RefreshFailure> for Error {
    fn from(failure: RefreshFailure) -> Self {
        Self::RefreshFailed(failure)
    }
}

impl Error {
    /// Returns true if this error means the session is gone and the user
    /// has to log in again.
    #[must_use]
    pub fn requires_reauth(&self) -> bool {
        matches!(
            self,
            Error::RefreshFailed(_)
                | Error::RefreshAborted
                | Error::Api { status: 401, .. }
        )
    }

    /// HTTP status carried by this error, if any.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            Error::RefreshFailed(failure) => failure.status,
            Error::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Creates a storage I/O error.
    #[must_use]
    pub fn storage_io(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::StorageIo {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Convenience type alias.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_reauth() {
        assert!(Error::RefreshFailed(RefreshFailure::other("gone")).requires_reauth());
        assert!(Error::RefreshAborted.requires_reauth());
        assert!(Error::Api { status: 401, message: "Unauthorized".into() }.requires_reauth());

        assert!(!Error::Api { status: 500, message: "Server error".into() }.requires_reauth());
        assert!(!Error::Timeout.requires_reauth());
        assert!(!Error::DevLoginDisabled.requires_reauth());
    }

    #[test]
    fn test_status() {
        let err = Error::RefreshFailed(RefreshFailure::rejected(400, "bad refresh token"));
        assert_eq!(err.status(), Some(400));
        assert_eq!(Error::Timeout.status(), None);
    }

    #[test]
    fn test_error_display() {
        let err = Error::Api { status: 404, message: "Course not found".into() };
        assert_eq!(err.to_string(), "API error 404: Course not found");

        let err = Error::from(RefreshFailure::rejected(400, "invalid refresh token"));
        assert_eq!(
            err.to_string(),
            "Token refresh failed: invalid refresh token (status 400)"
        );
        assert_eq!(RefreshFailure::other("No refresh token stored").to_string(), "No refresh token stored");
    }
}
