//! Durable token cache.
//!
//! Tokens are stored as a single JSON object. Writes go to a temporary
//! file in the same directory followed by an atomic rename, so a crash
//! mid-write never leaves a truncated or mixed-version cache on disk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{CredentialError, CredentialResult};
use crate::token::Token;

/// File-backed token cache.
///
/// Callers are responsible for serializing writers; the access session
/// routes every save through its own critical path.
#[derive(Debug)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Creates a store backed by the given cache path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the cache path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the cached token.
    ///
    /// Absence of the cache file is not an error; it signals that the
    /// authorization flow is required.
    pub fn load(&self) -> CredentialResult<Option<Token>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no token cache");
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path)?;
        let token: Token = serde_json::from_str(&content).map_err(|e| {
            CredentialError::config(format!(
                "failed to parse token cache {}: {}",
                self.path.display(),
                e
            ))
        })?;

        debug!(path = %self.path.display(), "loaded token cache");
        Ok(Some(token))
    }

    /// Persists the token atomically.
    ///
    /// Serializes to a temporary file next to the cache, then renames it
    /// into place. On Unix the cache is restricted to the owner.
    pub fn save(&self, token: &Token) -> CredentialResult<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(token).map_err(io::Error::other)?;

        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, &self.path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            let _ = fs::set_permissions(&self.path, perms);
        }

        debug!(path = %self.path.display(), "saved token cache");
        Ok(())
    }
}
