//! Client identity loading.
//!
//! The client secret file is the JSON downloaded from the Google Cloud
//! Console OAuth 2.0 credentials page. It carries an `installed` (desktop)
//! or `web` section with the client identifier, the client secret, and the
//! provider endpoints.

use std::path::Path;

use serde::Deserialize;
use tracing::debug;

use crate::error::{CredentialError, CredentialResult};

/// OAuth 2.0 client identity, loaded once at startup.
#[derive(Debug, Clone)]
pub struct ClientSecret {
    /// The OAuth 2.0 client ID.
    pub client_id: String,
    /// The OAuth 2.0 client secret.
    pub client_secret: String,
    /// The authorization (consent page) endpoint.
    pub auth_url: String,
    /// The token exchange endpoint.
    pub token_url: String,
    /// The redirect URI presented during authorization.
    pub redirect_uri: String,
}

/// Structure of the credentials JSON file.
#[derive(Debug, Deserialize)]
struct SecretFile {
    /// Credentials for installed (desktop) applications.
    installed: Option<SecretSection>,
    /// Credentials for web applications.
    web: Option<SecretSection>,
}

/// The nested section holding the actual identity.
#[derive(Debug, Deserialize)]
struct SecretSection {
    client_id: String,
    client_secret: String,
    auth_uri: String,
    token_uri: String,
    #[serde(default)]
    redirect_uris: Vec<String>,
}

impl ClientSecret {
    /// Loads the client identity from a credentials JSON file.
    ///
    /// Fails with a configuration error if the file is missing, is not
    /// valid JSON, or lacks a required field.
    pub fn from_file(path: impl AsRef<Path>) -> CredentialResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CredentialError::config(format!(
                "failed to read client secret file {}: {}",
                path.display(),
                e
            ))
        })?;

        debug!(path = %path.display(), "loaded client secret file");
        Self::from_json(&content)
    }

    /// Parses the client identity from a credentials JSON string.
    pub fn from_json(json: &str) -> CredentialResult<Self> {
        let file: SecretFile = serde_json::from_str(json).map_err(|e| {
            CredentialError::config(format!("failed to parse client secret file: {}", e))
        })?;

        let section = file.installed.or(file.web).ok_or_else(|| {
            CredentialError::config(
                "client secret file must contain an 'installed' or 'web' section",
            )
        })?;

        let redirect_uri = section
            .redirect_uris
            .into_iter()
            .next()
            .ok_or_else(|| CredentialError::config("client secret file lists no redirect URIs"))?;

        let secret = Self {
            client_id: section.client_id,
            client_secret: section.client_secret,
            auth_url: section.auth_uri,
            token_url: section.token_uri,
            redirect_uri,
        };
        secret.validate()?;
        Ok(secret)
    }

    /// Validates that the identity is complete and its endpoints parse as URLs.
    pub fn validate(&self) -> CredentialResult<()> {
        if self.client_id.is_empty() {
            return Err(CredentialError::config("client_id is required"));
        }
        if self.client_secret.is_empty() {
            return Err(CredentialError::config("client_secret is required"));
        }
        for (name, value) in [("auth_uri", &self.auth_url), ("token_uri", &self.token_url)] {
            url::Url::parse(value).map_err(|e| {
                CredentialError::config(format!("{} is not a valid URL ({}): {}", name, value, e))
            })?;
        }
        Ok(())
    }
}
