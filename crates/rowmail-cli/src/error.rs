//! CLI error types.

use thiserror::Error;

use rowmail_auth::CredentialError;
use rowmail_google::ApiError;

/// Result type for CLI operations.
pub type CliResult<T> = Result<T, CliError>;

/// Errors surfaced to the operator.
#[derive(Debug, Error)]
pub enum CliError {
    /// Credential lifecycle failure.
    #[error(transparent)]
    Credential(#[from] CredentialError),

    /// Vendor API failure.
    #[error(transparent)]
    Api(#[from] ApiError),
}
