//! Command implementations.

use tracing::info;

use rowmail_auth::{
    AccessSession, AuthConfig, ClientSecret, CredentialStore, OAuthClient, RefresherConfig,
    StdinPrompt, Token, TokenExchanger, TokenRefresher,
};
use rowmail_google::{GmailClient, OutgoingMessage, SheetsClient};

use crate::error::CliResult;

/// Runs the interactive authorization flow.
///
/// Without `--force` a usable token cache is reused as-is; with it the
/// flow runs unconditionally and replaces the cache.
pub async fn auth(config: AuthConfig, force: bool) -> CliResult<()> {
    let token = if force {
        let secret = ClientSecret::from_file(&config.secret_path)?;
        let oauth = OAuthClient::new(secret, config.timeout);
        let token = oauth.authorize(&config.scopes, &StdinPrompt).await?;
        CredentialStore::new(&config.token_path).save(&token)?;
        token
    } else {
        let session = AccessSession::connect(config.clone(), &StdinPrompt).await?;
        session.token()?
    };

    println!("Authorized.");
    print_token(&token, &config);
    Ok(())
}

/// Prints the cached token state.
pub async fn status(config: AuthConfig) -> CliResult<()> {
    let store = CredentialStore::new(&config.token_path);
    match store.load()? {
        Some(token) => {
            println!("Token cache: {}", config.token_path.display());
            print_token(&token, &config);
        }
        None => {
            println!(
                "No token cached at {}; run `rowmail auth`",
                config.token_path.display()
            );
        }
    }
    Ok(())
}

/// Renews the access token once and persists it.
pub async fn refresh(config: AuthConfig) -> CliResult<()> {
    let session = AccessSession::connect(config.clone(), &StdinPrompt).await?;
    let exchanger = session.exchanger();

    let current = session.token()?;
    let renewed = exchanger.refresh(current).await?;
    session.set_token(renewed);

    let token = session.token()?;
    println!("Access token renewed.");
    print_token(&token, &config);
    Ok(())
}

/// Sends a templated message to every recipient row in a sheet range.
///
/// The background refresher runs for the duration of the send, the way
/// a long-lived process would keep the token valid.
pub async fn send(
    config: AuthConfig,
    spreadsheet: &str,
    range: &str,
    subject: &str,
    body: &str,
) -> CliResult<()> {
    let session = AccessSession::connect(config, &StdinPrompt).await?;

    let exchanger = std::sync::Arc::new(session.exchanger());
    let refresher =
        TokenRefresher::new(session.clone(), exchanger, RefresherConfig::default()).spawn();

    let transport = session.clone().transport();
    let sheets = SheetsClient::new(transport.clone());
    let gmail = GmailClient::new(transport);

    let rows = sheets.values_get(spreadsheet, range).await?;
    let mut sent = 0usize;

    for (index, row) in rows.rows_as_text().into_iter().enumerate() {
        let Some(to) = row.first().filter(|cell| !cell.is_empty()) else {
            info!(row = index, "skipping row without a recipient address");
            continue;
        };
        let name = row.get(1).map(String::as_str).unwrap_or_default();

        let message = OutgoingMessage::new(
            to,
            subject.replace("{name}", name),
            body.replace("{name}", name),
        );
        let id = gmail.send_message(&message).await?;
        info!(id = %id, to = %message.to, "message sent");
        sent += 1;
    }

    refresher.stop();
    refresher.join().await;

    println!("Sent {} message(s) from {}!{}", sent, spreadsheet, range);
    Ok(())
}

fn print_token(token: &Token, config: &AuthConfig) {
    let state = if token.expires_within(config.expiry_margin) {
        "expired"
    } else {
        "valid"
    };
    println!("  access token: {} (until {})", state, token.expires_at);
    println!("  scopes: {}", token.scopes.join(" "));
}
