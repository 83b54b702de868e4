//! Session configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{CredentialError, CredentialResult};

/// Configuration for an access session.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Path to the client secret JSON file.
    pub secret_path: PathBuf,

    /// Path of the durable token cache.
    ///
    /// Defaults to `~/.local/share/rowmail/tokens.json`.
    pub token_path: PathBuf,

    /// OAuth scopes to request.
    pub scopes: Vec<String>,

    /// Period of the background refresh schedule.
    pub refresh_interval: Duration,

    /// Clock-skew tolerance subtracted from the expiry when deciding
    /// whether the token needs renewal.
    pub expiry_margin: Duration,

    /// HTTP timeout for token endpoint calls.
    pub timeout: Duration,
}

impl AuthConfig {
    /// Default refresh period.
    pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(23 * 60 * 60);

    /// Default expiry safety margin.
    pub const DEFAULT_EXPIRY_MARGIN: Duration = Duration::from_secs(60);

    /// Default HTTP timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

    /// Scope for spreadsheet row access.
    pub const SHEETS_SCOPE: &'static str = "https://www.googleapis.com/auth/spreadsheets";

    /// Scope for message query/send/label access.
    pub const GMAIL_SCOPE: &'static str = "https://www.googleapis.com/auth/gmail.modify";

    /// Creates a configuration with the default scope set and paths.
    pub fn new(secret_path: impl Into<PathBuf>) -> Self {
        Self {
            secret_path: secret_path.into(),
            token_path: Self::default_token_path(),
            scopes: vec![Self::SHEETS_SCOPE.to_string(), Self::GMAIL_SCOPE.to_string()],
            refresh_interval: Self::DEFAULT_REFRESH_INTERVAL,
            expiry_margin: Self::DEFAULT_EXPIRY_MARGIN,
            timeout: Duration::from_secs(Self::DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Returns the default client secret path.
    pub fn default_secret_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rowmail")
            .join("client_secret.json")
    }

    /// Returns the default token cache path.
    pub fn default_token_path() -> PathBuf {
        dirs::home_dir()
            .map(|h| h.join(".local").join("share"))
            .unwrap_or_else(|| PathBuf::from("."))
            .join("rowmail")
            .join("tokens.json")
    }

    /// Sets the token cache path.
    pub fn with_token_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.token_path = path.into();
        self
    }

    /// Sets the requested scopes.
    pub fn with_scopes(mut self, scopes: Vec<String>) -> Self {
        self.scopes = scopes;
        self
    }

    /// Sets the refresh period.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Sets the expiry safety margin.
    pub fn with_expiry_margin(mut self, margin: Duration) -> Self {
        self.expiry_margin = margin;
        self
    }

    /// Sets the HTTP timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Validates the configuration.
    pub fn validate(&self) -> CredentialResult<()> {
        if self.scopes.is_empty() {
            return Err(CredentialError::config("at least one scope is required"));
        }
        if self.refresh_interval.is_zero() {
            return Err(CredentialError::config("refresh interval must be non-zero"));
        }
        Ok(())
    }
}
