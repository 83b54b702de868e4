//! Error types for the API client collaborators.

use rowmail_auth::CredentialError;
use thiserror::Error;

/// Result type for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors mapped from vendor API responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Credential lifecycle failure surfaced by the transport.
    ///
    /// An invalidated session fails here before any network call.
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// Network failure issuing the call.
    #[error("network error: {0}")]
    Network(String),

    /// The API rejected the access token (401).
    #[error("access token rejected: {0}")]
    Unauthorized(String),

    /// The authenticated principal lacks permission (403).
    #[error("access denied: {0}")]
    Forbidden(String),

    /// Rate limit exceeded (429).
    #[error("rate limit exceeded")]
    RateLimited {
        /// Seconds to wait, when the API said so.
        retry_after: Option<u64>,
    },

    /// Any other non-success response.
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The response body did not parse as expected.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}
