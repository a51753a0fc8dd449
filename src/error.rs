// Error handling module
// Defines the failure taxonomy surfaced by the gateway and the typed API layer

use thiserror::Error;

/// Errors that can reach a caller of the gateway
#[derive(Error, Debug)]
pub enum ApiError {
    /// The backend rejected the request. Carries the HTTP status and the
    /// best-effort message extracted from the response body.
    #[error("API error: {status} - {message}")]
    Status { status: u16, message: String },

    /// Credentials are permanently invalid (revoked token or banned account).
    /// Stored tokens have been cleared; the caller must re-authenticate.
    #[error("credentials rejected: {status} - {message}")]
    Unrecoverable { status: u16, message: String },

    /// The refresh exchange failed. Stored tokens have been cleared.
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    /// Transport-level failure (connect, timeout, body read)
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response body did not match the expected shape
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ApiError {
    /// HTTP status carried by this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } | ApiError::Unrecoverable { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }

    /// True when the gateway cleared local credentials as part of this failure
    pub fn cleared_credentials(&self) -> bool {
        matches!(
            self,
            ApiError::Unrecoverable { .. } | ApiError::RefreshFailed(_)
        )
    }
}
