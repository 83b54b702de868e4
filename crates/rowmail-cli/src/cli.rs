//! Command-line interface definition.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use rowmail_auth::AuthConfig;

/// rowmail - sheet-driven mail from the command line
#[derive(Debug, Parser)]
#[command(name = "rowmail")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the OAuth client secret JSON file
    #[arg(long, env = "ROWMAIL_CLIENT_SECRET")]
    pub client_secret: Option<PathBuf>,

    /// Path of the durable token cache
    #[arg(long, env = "ROWMAIL_TOKEN_CACHE")]
    pub token_cache: Option<PathBuf>,

    /// OAuth scope to request (can be repeated)
    #[arg(long, action = clap::ArgAction::Append)]
    pub scope: Vec<String>,

    /// Background refresh interval in seconds
    #[arg(long)]
    pub refresh_interval_secs: Option<u64>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the interactive authorization flow
    Auth {
        /// Re-authorize even when a usable token cache exists
        #[arg(long)]
        force: bool,
    },

    /// Show the cached token state
    Status,

    /// Renew the access token once
    Refresh,

    /// Send a templated message to every recipient row in a sheet range
    Send {
        /// Spreadsheet id
        #[arg(long)]
        spreadsheet: String,

        /// Range holding recipient rows: address in the first column,
        /// name in the second
        #[arg(long, default_value = "Sheet1!A2:B")]
        range: String,

        /// Subject line ({name} is replaced per row)
        #[arg(long)]
        subject: String,

        /// Plain-text body ({name} is replaced per row)
        #[arg(long)]
        body: String,
    },
}

impl Cli {
    /// Builds the session configuration from the global flags.
    pub fn auth_config(&self) -> AuthConfig {
        let secret_path = self
            .client_secret
            .clone()
            .unwrap_or_else(AuthConfig::default_secret_path);

        let mut config = AuthConfig::new(secret_path);
        if let Some(ref path) = self.token_cache {
            config = config.with_token_path(path);
        }
        if !self.scope.is_empty() {
            config = config.with_scopes(self.scope.clone());
        }
        if let Some(secs) = self.refresh_interval_secs {
            config = config.with_refresh_interval(Duration::from_secs(secs));
        }
        config
    }
}
