//! The cached OAuth token and its expiry/scope semantics.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An OAuth token set: one logical instance per process, shared by
/// reference across every API client collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// Short-lived secret authenticating individual API calls.
    pub access_token: String,

    /// Long-lived secret used to mint new access tokens without
    /// operator interaction.
    pub refresh_token: String,

    /// The token kind, normally `Bearer`.
    pub token_type: String,

    /// Absolute expiry of the access token.
    pub expires_at: DateTime<Utc>,

    /// The scopes the resource owner granted.
    pub scopes: Vec<String>,
}

impl Token {
    /// Creates a new token.
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        token_type: impl Into<String>,
        expires_at: DateTime<Utc>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            token_type: token_type.into(),
            expires_at,
            scopes,
        }
    }

    /// Returns true if the access token expires within the given safety
    /// margin from now.
    pub fn expires_within(&self, margin: Duration) -> bool {
        let margin = chrono::Duration::seconds(margin.as_secs() as i64);
        Utc::now() >= self.expires_at - margin
    }

    /// Returns true if the granted scopes cover every requested scope.
    pub fn has_scopes(&self, requested: &[String]) -> bool {
        requested.iter().all(|scope| self.scopes.contains(scope))
    }

    /// Builds the successor token after a refresh grant.
    ///
    /// The refresh credential and granted scopes carry forward unless the
    /// provider rotated the refresh credential in its response.
    pub fn renewed(
        &self,
        access_token: impl Into<String>,
        expires_at: DateTime<Utc>,
        rotated_refresh_token: Option<String>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: rotated_refresh_token.unwrap_or_else(|| self.refresh_token.clone()),
            token_type: self.token_type.clone(),
            expires_at,
            scopes: self.scopes.clone(),
        }
    }
}
