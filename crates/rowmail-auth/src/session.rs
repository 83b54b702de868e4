//! The access session: one lock-guarded token shared by every collaborator.
//!
//! The session owns the single live [`Token`] for the process. Readers
//! take a snapshot under a read lock; the background refresher replaces
//! the token under the write lock. Replacements that would move the
//! expiry backwards are discarded, so the expiry observed by any reader
//! is monotonically non-decreasing.

use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::config::AuthConfig;
use crate::error::{CredentialError, CredentialResult};
use crate::flow::{CodePrompt, OAuthClient};
use crate::secret::ClientSecret;
use crate::store::CredentialStore;
use crate::token::Token;
use crate::transport::AuthenticatedTransport;

/// Lock-guarded session state.
#[derive(Debug)]
struct SessionInner {
    token: Token,
    invalidated: bool,
    last_refresh: Option<DateTime<Utc>>,
}

/// A live, authorized session against the provider.
///
/// Cheap to share: wrap in an [`Arc`] and hand clones to the refresher
/// and to every API client collaborator. Not a global; multiple sessions
/// can coexist (tests rely on this).
#[derive(Debug)]
pub struct AccessSession {
    secret: ClientSecret,
    store: CredentialStore,
    refresh_interval: Duration,
    expiry_margin: Duration,
    timeout: Duration,
    inner: RwLock<SessionInner>,
    /// Serializes cache writes so concurrent replacements cannot
    /// interleave file contents.
    persist_lock: Mutex<()>,
}

impl AccessSession {
    /// Establishes a session: loads the cached token, or runs the
    /// interactive authorization flow when no usable cache exists.
    ///
    /// A cached token is reused only when its granted scopes cover the
    /// requested ones; otherwise the flow is forced.
    pub async fn connect(
        config: AuthConfig,
        prompt: &dyn CodePrompt,
    ) -> CredentialResult<Arc<Self>> {
        config.validate()?;
        let secret = ClientSecret::from_file(&config.secret_path)?;
        let store = CredentialStore::new(&config.token_path);

        let token = match store.load()? {
            Some(token) if token.has_scopes(&config.scopes) => {
                debug!("reusing cached token");
                token
            }
            Some(_) => {
                info!("cached token does not cover the requested scopes; re-authorizing");
                Self::run_authorization(&secret, &store, &config, prompt).await?
            }
            None => {
                info!("no cached token; starting interactive authorization");
                Self::run_authorization(&secret, &store, &config, prompt).await?
            }
        };

        Ok(Self::with_token(secret, token, &config))
    }

    /// Creates a session around an already obtained token.
    pub fn with_token(secret: ClientSecret, token: Token, config: &AuthConfig) -> Arc<Self> {
        Arc::new(Self {
            secret,
            store: CredentialStore::new(&config.token_path),
            refresh_interval: config.refresh_interval,
            expiry_margin: config.expiry_margin,
            timeout: config.timeout,
            inner: RwLock::new(SessionInner {
                token,
                invalidated: false,
                last_refresh: None,
            }),
            persist_lock: Mutex::new(()),
        })
    }

    async fn run_authorization(
        secret: &ClientSecret,
        store: &CredentialStore,
        config: &AuthConfig,
        prompt: &dyn CodePrompt,
    ) -> CredentialResult<Token> {
        let oauth = OAuthClient::new(secret.clone(), config.timeout);
        let token = oauth.authorize(&config.scopes, prompt).await?;

        if let Err(err) = store.save(&token) {
            warn!(error = %err, "failed to persist initial token; continuing in memory");
        }
        Ok(token)
    }

    /// Returns a snapshot of the current token.
    ///
    /// Safe for unbounded concurrent callers; blocks only for the read
    /// lock needed to copy the snapshot. Fails with
    /// [`CredentialError::InvalidCredential`] once the session has been
    /// invalidated.
    pub fn token(&self) -> CredentialResult<Token> {
        let inner = self.inner.read().unwrap();
        if inner.invalidated {
            return Err(CredentialError::InvalidCredential);
        }
        Ok(inner.token.clone())
    }

    /// Replaces the current token.
    ///
    /// The replacement is applied only when its expiry is not earlier
    /// than the current one; a loser of that race is discarded and
    /// logged. Returns true when the replacement was applied.
    ///
    /// An applied replacement is persisted best-effort: a cache write
    /// failure is logged and the in-memory token stays authoritative.
    pub fn set_token(&self, new: Token) -> bool {
        {
            let mut inner = self.inner.write().unwrap();
            if inner.invalidated {
                debug!("session invalidated; discarding replacement token");
                return false;
            }
            if new.expires_at < inner.token.expires_at {
                warn!(
                    current = %inner.token.expires_at,
                    offered = %new.expires_at,
                    "discarding replacement token with earlier expiry"
                );
                return false;
            }
            inner.token = new;
            inner.last_refresh = Some(Utc::now());
        }

        // Persist whatever is committed at save time, so the cache file
        // always reflects the latest applied token even when writers race.
        let _guard = self.persist_lock.lock().unwrap();
        let snapshot = self.inner.read().unwrap().token.clone();
        if let Err(err) = self.store.save(&snapshot) {
            warn!(
                error = %err,
                path = %self.store.path().display(),
                "failed to persist token cache"
            );
        }
        true
    }

    /// Returns true when the token has passed (or is within the safety
    /// margin of) its expiry.
    pub fn is_expired(&self) -> bool {
        self.inner
            .read()
            .unwrap()
            .token
            .expires_within(self.expiry_margin)
    }

    /// Moves the session into the terminal invalid-credential state.
    ///
    /// Every subsequent [`token`](Self::token) call fails until the
    /// operator re-runs the authorization flow in a fresh session.
    pub fn invalidate(&self) {
        warn!("session invalidated; re-authorization required");
        self.inner.write().unwrap().invalidated = true;
    }

    /// Returns true when the session has been invalidated.
    pub fn is_invalidated(&self) -> bool {
        self.inner.read().unwrap().invalidated
    }

    /// Timestamp of the last applied replacement.
    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.inner.read().unwrap().last_refresh
    }

    /// The client identity this session authenticates as.
    pub fn secret(&self) -> &ClientSecret {
        &self.secret
    }

    /// The durable cache backing this session.
    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    /// Period of the background refresh schedule.
    pub fn refresh_interval(&self) -> Duration {
        self.refresh_interval
    }

    /// Builds the token endpoint client for this session's identity.
    pub fn exchanger(&self) -> OAuthClient {
        OAuthClient::new(self.secret.clone(), self.timeout)
    }

    /// Hands out an authenticated transport bound to this session.
    pub fn transport(self: Arc<Self>) -> AuthenticatedTransport {
        let timeout = self.timeout;
        AuthenticatedTransport::new(self, timeout)
    }
}
