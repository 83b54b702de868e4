//! OAuth2 credential lifecycle shared by every rowmail API client.
//!
//! This crate owns the single live token for a process: it acquires it
//! (interactively, once), caches it durably, keeps it valid with a
//! scheduled background refresh, and hands out an always-fresh
//! authenticated transport to independent API client collaborators.
//!
//! # Architecture
//!
//! ```text
//! ClientSecret ──┐
//!                ├─▶ AccessSession ◀── TokenRefresher (background task)
//! CredentialStore┘        │
//!   (token cache)         ▼
//!               AuthenticatedTransport ──▶ Sheets / Gmail collaborators
//! ```
//!
//! # Example
//!
//! ```ignore
//! use rowmail_auth::{AccessSession, AuthConfig, RefresherConfig, StdinPrompt, TokenRefresher};
//!
//! let config = AuthConfig::new("client_secret.json");
//! let session = AccessSession::connect(config, &StdinPrompt).await?;
//!
//! let exchanger = std::sync::Arc::new(session.exchanger());
//! let refresher =
//!     TokenRefresher::new(session.clone(), exchanger, RefresherConfig::default()).spawn();
//!
//! let transport = session.clone().transport();
//! // hand `transport` to the Sheets/Gmail clients...
//! # refresher.stop();
//! ```

pub mod config;
pub mod error;
pub mod flow;
pub mod refresher;
pub mod secret;
pub mod session;
pub mod store;
pub mod token;
pub mod transport;

pub use config::AuthConfig;
pub use error::{CredentialError, CredentialResult};
pub use flow::{BoxFuture, CodePrompt, OAuthClient, StdinPrompt, TokenExchanger};
pub use refresher::{RefresherConfig, RefresherHandle, TokenRefresher};
pub use secret::ClientSecret;
pub use session::AccessSession;
pub use store::CredentialStore;
pub use token::Token;
pub use transport::AuthenticatedTransport;
