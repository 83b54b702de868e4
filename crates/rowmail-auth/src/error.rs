//! Error types for the credential lifecycle.

use std::io;

use thiserror::Error;

/// Result type for credential operations.
pub type CredentialResult<T> = Result<T, CredentialError>;

/// Errors that can occur while managing credentials.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// Malformed or missing client-secret/configuration data.
    ///
    /// Fatal at session construction.
    #[error("configuration error: {message}")]
    Config { message: String },

    /// The provider rejected an authorization or refresh grant.
    #[error("authorization error: {message}")]
    Auth { message: String },

    /// Transient transport failure talking to the provider.
    #[error("network error: {message}")]
    Network { message: String },

    /// Cache persistence failure.
    ///
    /// Non-fatal during routine operation; the in-memory token stays
    /// authoritative until process restart.
    #[error("credential cache I/O error: {0}")]
    Io(#[from] io::Error),

    /// Terminal state after refresh retries are exhausted.
    ///
    /// Every subsequent call fails with this error until the operator
    /// re-runs the authorization flow.
    #[error("credentials invalidated; re-authorization required")]
    InvalidCredential,
}

impl CredentialError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an authorization error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Returns true if this error is transient and the operation may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network { .. })
    }
}
