//! Interactive authorization and token endpoint exchange.
//!
//! First-time authorization is console driven: the consent URL is shown
//! to the operator, who approves access in a browser and pastes the
//! resulting authorization code back. The operator interaction sits
//! behind the [`CodePrompt`] capability so tests can supply a fixed code.
//!
//! The same client performs the refresh grant; the background refresher
//! reaches it through the [`TokenExchanger`] seam.

use std::future::Future;
use std::io::{self, BufRead, Write};
use std::pin::Pin;
use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{CredentialError, CredentialResult};
use crate::secret::ClientSecret;
use crate::token::Token;

/// Attempts the operator gets at pasting a valid authorization code.
const MAX_CODE_ATTEMPTS: u32 = 3;

/// Access token lifetime assumed when the token endpoint omits `expires_in`.
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

/// Boxed future used at the exchanger seam.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Capability supplying the operator-approved authorization code.
pub trait CodePrompt: Send + Sync {
    /// Presents the consent URL and blocks until the operator supplies
    /// the authorization code.
    fn obtain_code(&self, auth_url: &str) -> CredentialResult<String>;
}

/// Production prompt: prints the consent URL and reads the code from stdin.
#[derive(Debug, Default)]
pub struct StdinPrompt;

impl CodePrompt for StdinPrompt {
    fn obtain_code(&self, auth_url: &str) -> CredentialResult<String> {
        eprintln!("\nOpen this URL in your browser and approve access:\n\n{auth_url}\n");
        eprint!("Paste the authorization code here: ");
        io::stderr().flush()?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;

        let code = line.trim().to_string();
        if code.is_empty() {
            return Err(CredentialError::auth("empty authorization code"));
        }
        Ok(code)
    }
}

/// Renews access tokens from a refresh credential.
///
/// [`OAuthClient`] is the production implementation; tests substitute
/// fakes to drive the refresher deterministically.
pub trait TokenExchanger: Send + Sync {
    /// Exchanges the refresh credential carried by `current` for a
    /// renewed token.
    fn refresh(&self, current: Token) -> BoxFuture<'_, CredentialResult<Token>>;
}

/// OAuth client for the provider's authorization and token endpoints.
#[derive(Debug)]
pub struct OAuthClient {
    secret: ClientSecret,
    http: reqwest::Client,
}

impl OAuthClient {
    /// Creates a new OAuth client for the given identity.
    pub fn new(secret: ClientSecret, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to create HTTP client");

        Self { secret, http }
    }

    /// Builds the consent URL for the given scopes.
    ///
    /// `access_type=offline` asks the provider for a refresh credential;
    /// `prompt=consent` forces one to be issued even on re-authorization.
    pub fn build_auth_url(&self, scopes: &[String]) -> String {
        let scope = scopes.join(" ");
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&\
            access_type=offline&prompt=consent",
            self.secret.auth_url,
            urlencoding::encode(&self.secret.client_id),
            urlencoding::encode(&self.secret.redirect_uri),
            urlencoding::encode(&scope),
        )
    }

    /// Runs the interactive authorization flow and returns the initial token.
    ///
    /// A code the provider rejects is retried with a fresh prompt up to
    /// a bounded number of attempts; network failures are not retried.
    /// After exhausting the attempts the flow fails permanently for this
    /// invocation.
    pub async fn authorize(
        &self,
        scopes: &[String],
        prompt: &dyn CodePrompt,
    ) -> CredentialResult<Token> {
        let auth_url = self.build_auth_url(scopes);
        info!("starting interactive authorization");

        let mut last_rejection = None;
        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let code = prompt.obtain_code(&auth_url)?;

            match self.exchange_code(&code, scopes).await {
                Ok(token) => {
                    info!("authorization successful");
                    return Ok(token);
                }
                Err(err @ CredentialError::Auth { .. }) => {
                    warn!(attempt, max = MAX_CODE_ATTEMPTS, error = %err, "authorization code rejected");
                    last_rejection = Some(err);
                }
                Err(other) => return Err(other),
            }
        }

        Err(last_rejection
            .unwrap_or_else(|| CredentialError::auth("authorization attempts exhausted")))
    }

    /// Exchanges an authorization code for the initial token.
    async fn exchange_code(&self, code: &str, scopes: &[String]) -> CredentialResult<Token> {
        let params = [
            ("client_id", self.secret.client_id.as_str()),
            ("client_secret", self.secret.client_secret.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.secret.redirect_uri.as_str()),
        ];

        let grant = self.post_token_request(&params).await?;

        let refresh_token = grant.refresh_token.ok_or_else(|| {
            CredentialError::auth("token endpoint returned no refresh token")
        })?;
        let expires_at =
            Utc::now() + chrono::Duration::seconds(grant.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS));

        // The provider reports the scopes it actually granted; fall back
        // to the requested set when the field is absent.
        let granted = match grant.scope {
            Some(ref s) => s.split_whitespace().map(String::from).collect(),
            None => scopes.to_vec(),
        };

        Ok(Token::new(
            grant.access_token,
            refresh_token,
            grant.token_type.unwrap_or_else(|| "Bearer".to_string()),
            expires_at,
            granted,
        ))
    }

    /// Posts a grant request to the token endpoint and parses the response.
    async fn post_token_request(
        &self,
        params: &[(&str, &str)],
    ) -> CredentialResult<TokenEndpointResponse> {
        let response = self
            .http
            .post(&self.secret.token_url)
            .form(params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CredentialError::network("token endpoint request timed out")
                } else {
                    CredentialError::network(format!("token endpoint request failed: {}", e))
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| CredentialError::network(format!("failed to read response: {}", e)))?;

        if status.is_server_error() {
            return Err(CredentialError::network(format!(
                "token endpoint unavailable ({}): {}",
                status, body
            )));
        }
        if !status.is_success() {
            return Err(CredentialError::auth(format!(
                "token endpoint rejected the grant ({}): {}",
                status, body
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| CredentialError::auth(format!("invalid token response: {}", e)))
    }
}

impl TokenExchanger for OAuthClient {
    fn refresh(&self, current: Token) -> BoxFuture<'_, CredentialResult<Token>> {
        Box::pin(async move {
            debug!("requesting refresh grant");

            let params = [
                ("client_id", self.secret.client_id.as_str()),
                ("client_secret", self.secret.client_secret.as_str()),
                ("refresh_token", current.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ];

            let grant = self.post_token_request(&params).await?;
            let expires_at = Utc::now()
                + chrono::Duration::seconds(grant.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS));

            info!("refresh grant succeeded");
            Ok(current.renewed(grant.access_token, expires_at, grant.refresh_token))
        })
    }
}

/// Response from the provider's token endpoint.
#[derive(Debug, Deserialize)]
struct TokenEndpointResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    scope: Option<String>,
}
