//! Thin Google API clients over the authenticated transport.
//!
//! These collaborators own vendor request/response shaping, pagination
//! and domain error mapping. They do no credential management: each call
//! goes through an [`AuthenticatedTransport`] handle obtained from the
//! access session, which injects the freshest known token at call time.
//!
//! [`AuthenticatedTransport`]: rowmail_auth::AuthenticatedTransport
//!
//! # Example
//!
//! ```ignore
//! use rowmail_google::{GmailClient, OutgoingMessage, SheetsClient};
//!
//! let transport = session.transport();
//! let sheets = SheetsClient::new(transport.clone());
//! let gmail = GmailClient::new(transport);
//!
//! let rows = sheets.values_get(&sheet_id, "Recipients!A2:C").await?;
//! for row in rows.rows_as_text() {
//!     gmail
//!         .send_message(&OutgoingMessage::new(&row[0], "Hello", &row[1]))
//!         .await?;
//! }
//! ```

pub mod error;
pub mod gmail;
mod response;
pub mod sheets;
#[cfg(test)]
pub(crate) mod testing;

pub use error::{ApiError, ApiResult};
pub use gmail::{GmailClient, Message, MessageHeader, MessagePayload, MessageRef, OutgoingMessage};
pub use sheets::{AppendSummary, SheetsClient, ValueRange};
