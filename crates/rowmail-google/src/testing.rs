//! Shared fixtures for the client tests.

use chrono::Utc;

use rowmail_auth::{AccessSession, AuthConfig, AuthenticatedTransport, ClientSecret, Token};

/// Builds a transport over a throwaway session with a far-future token.
pub(crate) fn test_transport(dir: &tempfile::TempDir) -> AuthenticatedTransport {
    let secret = ClientSecret {
        client_id: "test-id.apps.googleusercontent.com".to_string(),
        client_secret: "test-secret".to_string(),
        auth_url: "https://accounts.google.com/o/oauth2/auth".to_string(),
        token_url: "https://oauth2.googleapis.com/token".to_string(),
        redirect_uri: "urn:ietf:wg:oauth:2.0:oob".to_string(),
    };
    let token = Token::new(
        "test-access-token",
        "test-refresh-token",
        "Bearer",
        Utc::now() + chrono::Duration::hours(1),
        vec!["scope-a".to_string()],
    );
    let config = AuthConfig::new(dir.path().join("client_secret.json"))
        .with_token_path(dir.path().join("tokens.json"));

    AccessSession::with_token(secret, token, &config).transport()
}
