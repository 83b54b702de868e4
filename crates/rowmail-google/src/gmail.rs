//! Gmail message client.
//!
//! Query, fetch, send and label messages for the authenticated user.
//! Like the Sheets client, this owns vendor request/response shaping
//! only; every call reads the live token through the transport.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use tracing::debug;

use rowmail_auth::AuthenticatedTransport;

use crate::error::{ApiError, ApiResult};
use crate::response::read_success;

/// Base URL for the Gmail API v1.
const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1";

/// Gmail API client for the authenticated user (`users/me`).
#[derive(Debug, Clone)]
pub struct GmailClient {
    transport: AuthenticatedTransport,
    base_url: String,
}

impl GmailClient {
    /// Creates a Gmail client over the given transport.
    pub fn new(transport: AuthenticatedTransport) -> Self {
        Self {
            transport,
            base_url: GMAIL_API_BASE.to_string(),
        }
    }

    /// Overrides the API base URL (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Lists message references matching a Gmail search query.
    ///
    /// Follows `nextPageToken` until the listing is exhausted or
    /// `max_results` references have been collected.
    pub async fn list_messages(
        &self,
        query: &str,
        max_results: Option<usize>,
    ) -> ApiResult<Vec<MessageRef>> {
        let url = format!("{}/users/me/messages", self.base_url);

        let mut refs = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self.transport.get(&url)?.query(&[("q", query)]);
            if let Some(ref token) = page_token {
                request = request.query(&[("pageToken", token.as_str())]);
            }

            let body = read_success(request).await?;
            let page: MessageListResponse = serde_json::from_str(&body).map_err(|e| {
                ApiError::InvalidResponse(format!("failed to parse message list: {}", e))
            })?;

            refs.extend(page.messages);

            if let Some(max) = max_results {
                if refs.len() >= max {
                    refs.truncate(max);
                    break;
                }
            }

            match page.next_page_token {
                Some(token) => page_token = Some(token),
                None => break,
            }
        }

        debug!(count = refs.len(), query, "listed messages");
        Ok(refs)
    }

    /// Fetches a message's metadata: labels, snippet and key headers.
    pub async fn get_message(&self, id: &str) -> ApiResult<Message> {
        let url = format!(
            "{}/users/me/messages/{}",
            self.base_url,
            urlencoding::encode(id)
        );

        let request = self.transport.get(&url)?.query(&[
            ("format", "metadata"),
            ("metadataHeaders", "From"),
            ("metadataHeaders", "Subject"),
            ("metadataHeaders", "Date"),
        ]);

        let body = read_success(request).await?;
        serde_json::from_str(&body)
            .map_err(|e| ApiError::InvalidResponse(format!("failed to parse message: {}", e)))
    }

    /// Sends a message and returns its assigned id.
    pub async fn send_message(&self, message: &OutgoingMessage) -> ApiResult<String> {
        let url = format!("{}/users/me/messages/send", self.base_url);
        let raw = URL_SAFE_NO_PAD.encode(message.to_rfc822());

        let request = self
            .transport
            .post(&url)?
            .json(&serde_json::json!({ "raw": raw }));

        let body = read_success(request).await?;
        let sent: MessageRef = serde_json::from_str(&body).map_err(|e| {
            ApiError::InvalidResponse(format!("failed to parse send response: {}", e))
        })?;

        debug!(id = %sent.id, to = %message.to, "sent message");
        Ok(sent.id)
    }

    /// Adds and removes labels on a message.
    pub async fn modify_labels(
        &self,
        id: &str,
        add: &[String],
        remove: &[String],
    ) -> ApiResult<()> {
        let url = format!(
            "{}/users/me/messages/{}/modify",
            self.base_url,
            urlencoding::encode(id)
        );

        let request = self.transport.post(&url)?.json(&serde_json::json!({
            "addLabelIds": add,
            "removeLabelIds": remove,
        }));

        read_success(request).await?;
        debug!(id, added = add.len(), removed = remove.len(), "modified labels");
        Ok(())
    }
}

/// An outbound plain-text message.
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
}

impl OutgoingMessage {
    /// Creates an outgoing message.
    pub fn new(
        to: impl Into<String>,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
        }
    }

    /// Renders the RFC 822 form the send endpoint expects.
    pub fn to_rfc822(&self) -> String {
        format!(
            "To: {}\r\nSubject: {}\r\nMIME-Version: 1.0\r\n\
            Content-Type: text/plain; charset=\"UTF-8\"\r\n\r\n{}",
            self.to, self.subject, self.body
        )
    }
}

/// A message reference from a listing.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    /// The message id.
    pub id: String,
    /// The thread the message belongs to.
    #[serde(default)]
    pub thread_id: Option<String>,
}

/// Response from the messages.list endpoint.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
    next_page_token: Option<String>,
}

/// Message metadata.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// The message id.
    pub id: String,
    /// Labels currently applied.
    #[serde(default)]
    pub label_ids: Vec<String>,
    /// Short snippet of the body.
    #[serde(default)]
    pub snippet: String,
    /// Header container.
    #[serde(default)]
    pub payload: Option<MessagePayload>,
}

impl Message {
    /// Returns a header value by case-insensitive name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.payload.as_ref()?.headers.iter().find_map(|h| {
            h.name
                .eq_ignore_ascii_case(name)
                .then_some(h.value.as_str())
        })
    }
}

/// Payload carrying the metadata headers.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    /// The requested headers.
    #[serde(default)]
    pub headers: Vec<MessageHeader>,
}

/// A single message header.
#[derive(Debug, Clone, Deserialize)]
pub struct MessageHeader {
    /// Header name.
    pub name: String,
    /// Header value.
    pub value: String,
}
