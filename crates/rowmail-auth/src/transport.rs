//! Authenticated HTTP transport for API client collaborators.
//!
//! The transport injects the freshest known token into every outbound
//! call, reading it at call time rather than caching it at construction.
//! It does not retry the wrapped call; vendor-specific retry policy
//! belongs to the collaborator issuing it.

use std::sync::Arc;
use std::time::Duration;

use crate::error::CredentialResult;
use crate::session::AccessSession;

/// A handle collaborators use to issue authenticated vendor calls.
#[derive(Debug, Clone)]
pub struct AuthenticatedTransport {
    session: Arc<AccessSession>,
    http: reqwest::Client,
}

impl AuthenticatedTransport {
    /// Creates a transport bound to the given session.
    pub fn new(session: Arc<AccessSession>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to create HTTP client");

        Self { session, http }
    }

    /// Prepares an authenticated request.
    ///
    /// Reads the current token immediately before building the request.
    /// Fails fast with [`CredentialError::InvalidCredential`] when the
    /// session is invalidated, without touching the network.
    ///
    /// [`CredentialError::InvalidCredential`]: crate::error::CredentialError::InvalidCredential
    pub fn request(
        &self,
        method: reqwest::Method,
        url: impl reqwest::IntoUrl,
    ) -> CredentialResult<reqwest::RequestBuilder> {
        let token = self.session.token()?;
        Ok(self
            .http
            .request(method, url)
            .bearer_auth(token.access_token))
    }

    /// Prepares an authenticated GET request.
    pub fn get(&self, url: impl reqwest::IntoUrl) -> CredentialResult<reqwest::RequestBuilder> {
        self.request(reqwest::Method::GET, url)
    }

    /// Prepares an authenticated POST request.
    pub fn post(&self, url: impl reqwest::IntoUrl) -> CredentialResult<reqwest::RequestBuilder> {
        self.request(reqwest::Method::POST, url)
    }

    /// The session this transport reads from.
    pub fn session(&self) -> &Arc<AccessSession> {
        &self.session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    use crate::config::AuthConfig;
    use crate::error::CredentialError;
    use crate::secret::ClientSecret;
    use crate::token::Token;

    fn test_secret() -> ClientSecret {
        ClientSecret {
            client_id: "test-id.apps.googleusercontent.com".to_string(),
            client_secret: "test-secret".to_string(),
            auth_url: "https://accounts.google.com/o/oauth2/auth".to_string(),
            token_url: "https://oauth2.googleapis.com/token".to_string(),
            redirect_uri: "urn:ietf:wg:oauth:2.0:oob".to_string(),
        }
    }

    fn token_with_access(access: &str, expiry_secs: i64) -> Token {
        Token::new(
            access,
            "refresh",
            "Bearer",
            Utc::now() + chrono::Duration::seconds(expiry_secs),
            vec!["scope-a".to_string()],
        )
    }

    fn transport_in(dir: &tempfile::TempDir) -> AuthenticatedTransport {
        let config = AuthConfig::new(dir.path().join("client_secret.json"))
            .with_token_path(dir.path().join("tokens.json"));
        let session =
            AccessSession::with_token(test_secret(), token_with_access("at-1", 3600), &config);
        session.transport()
    }

    fn bearer_of(builder: reqwest::RequestBuilder) -> String {
        let request = builder.build().unwrap();
        request
            .headers()
            .get(reqwest::header::AUTHORIZATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn injects_current_bearer_token() {
        let dir = tempfile::tempdir().unwrap();
        let transport = transport_in(&dir);

        let builder = transport.get("https://example.com/v1/resource").unwrap();
        assert_eq!(bearer_of(builder), "Bearer at-1");
    }

    #[tokio::test]
    async fn reads_token_at_call_time() {
        let dir = tempfile::tempdir().unwrap();
        let transport = transport_in(&dir);

        // A refresh lands between two calls; the second call must carry
        // the renewed token.
        transport
            .session()
            .set_token(token_with_access("at-2", 7200));

        let builder = transport.get("https://example.com/v1/resource").unwrap();
        assert_eq!(bearer_of(builder), "Bearer at-2");
    }

    #[tokio::test]
    async fn fails_fast_when_session_is_invalidated() {
        let dir = tempfile::tempdir().unwrap();
        let transport = transport_in(&dir);

        transport.session().invalidate();

        let result = transport.get("https://example.com/v1/resource");
        assert!(matches!(result, Err(CredentialError::InvalidCredential)));
    }
}
