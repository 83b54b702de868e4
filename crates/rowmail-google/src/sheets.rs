//! Google Sheets values client.
//!
//! Row-oriented access to the Sheets v4 values API. This client owns
//! request/response shaping and error mapping only; authentication comes
//! from the transport, which reads the live token on every call.

use serde::Deserialize;
use tracing::debug;

use rowmail_auth::AuthenticatedTransport;

use crate::error::{ApiError, ApiResult};
use crate::response::read_success;

/// Base URL for the Sheets API v4.
const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4";

/// Google Sheets API client.
#[derive(Debug, Clone)]
pub struct SheetsClient {
    transport: AuthenticatedTransport,
    base_url: String,
}

impl SheetsClient {
    /// Creates a Sheets client over the given transport.
    pub fn new(transport: AuthenticatedTransport) -> Self {
        Self {
            transport,
            base_url: SHEETS_API_BASE.to_string(),
        }
    }

    /// Overrides the API base URL (tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Reads the values in an A1-notation range.
    pub async fn values_get(&self, spreadsheet_id: &str, range: &str) -> ApiResult<ValueRange> {
        let url = format!(
            "{}/spreadsheets/{}/values/{}",
            self.base_url,
            urlencoding::encode(spreadsheet_id),
            urlencoding::encode(range)
        );

        let body = read_success(self.transport.get(&url)?).await?;
        let values: ValueRange = serde_json::from_str(&body)
            .map_err(|e| ApiError::InvalidResponse(format!("failed to parse value range: {}", e)))?;

        debug!(
            rows = values.values.len(),
            spreadsheet = spreadsheet_id,
            range,
            "fetched sheet values"
        );
        Ok(values)
    }

    /// Appends rows after the table found in the given range.
    pub async fn values_append(
        &self,
        spreadsheet_id: &str,
        range: &str,
        rows: Vec<Vec<serde_json::Value>>,
    ) -> ApiResult<AppendSummary> {
        let url = format!(
            "{}/spreadsheets/{}/values/{}:append",
            self.base_url,
            urlencoding::encode(spreadsheet_id),
            urlencoding::encode(range)
        );

        let request = self
            .transport
            .post(&url)?
            .query(&[("valueInputOption", "USER_ENTERED")])
            .json(&serde_json::json!({ "values": rows }));

        let body = read_success(request).await?;
        let response: AppendResponse = serde_json::from_str(&body).map_err(|e| {
            ApiError::InvalidResponse(format!("failed to parse append response: {}", e))
        })?;

        let summary = response.updates.unwrap_or_default();
        debug!(
            rows = summary.updated_rows,
            spreadsheet = spreadsheet_id,
            range,
            "appended sheet rows"
        );
        Ok(summary)
    }
}

/// A block of cell values from the API.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueRange {
    /// The range the values cover.
    pub range: Option<String>,
    /// Row-major cell values.
    #[serde(default)]
    pub values: Vec<Vec<serde_json::Value>>,
}

impl ValueRange {
    /// Returns the rows with every cell rendered as text.
    pub fn rows_as_text(&self) -> Vec<Vec<String>> {
        self.values
            .iter()
            .map(|row| row.iter().map(cell_text).collect())
            .collect()
    }
}

/// Renders a cell value the way the sheet displays it.
fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Response from the append endpoint.
#[derive(Debug, Deserialize)]
struct AppendResponse {
    #[serde(default)]
    updates: Option<AppendSummary>,
}

/// Summary of an append operation.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppendSummary {
    /// Rows written.
    #[serde(default)]
    pub updated_rows: u32,
    /// Cells written.
    #[serde(default)]
    pub updated_cells: u32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::testing::test_transport;

    fn client(server: &MockServer, dir: &tempfile::TempDir) -> SheetsClient {
        SheetsClient::new(test_transport(dir)).with_base_url(server.uri())
    }

    #[tokio::test]
    async fn values_get_parses_rows() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/spreadsheets/sheet-1/values/Sheet1%21A2%3AC"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "range": "Sheet1!A2:C4",
                "majorDimension": "ROWS",
                "values": [
                    ["alice@example.com", "Alice", 3],
                    ["bob@example.com", "Bob", 5]
                ]
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let values = client(&server, &dir)
            .values_get("sheet-1", "Sheet1!A2:C")
            .await
            .unwrap();

        assert_eq!(values.values.len(), 2);
        assert_eq!(
            values.rows_as_text()[0],
            vec!["alice@example.com", "Alice", "3"]
        );
    }

    #[tokio::test]
    async fn values_get_handles_empty_range() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "range": "Sheet1!A2:C2"
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let values = client(&server, &dir)
            .values_get("sheet-1", "Sheet1!A2:C")
            .await
            .unwrap();
        assert!(values.values.is_empty());
    }

    #[tokio::test]
    async fn values_append_posts_rows() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/spreadsheets/sheet-1/values/Sheet1%21A%3AC:append"))
            .and(query_param("valueInputOption", "USER_ENTERED"))
            .and(body_string_contains("carol@example.com"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "updates": { "updatedRows": 1, "updatedCells": 3 }
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let summary = client(&server, &dir)
            .values_append(
                "sheet-1",
                "Sheet1!A:C",
                vec![vec![
                    json!("carol@example.com"),
                    json!("Carol"),
                    json!("sent"),
                ]],
            )
            .await
            .unwrap();

        assert_eq!(summary.updated_rows, 1);
        assert_eq!(summary.updated_cells, 3);
    }

    #[tokio::test]
    async fn unauthorized_is_mapped() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = client(&server, &dir)
            .values_get("sheet-1", "A1:B2")
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn rate_limit_carries_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let err = client(&server, &dir)
            .values_get("sheet-1", "A1:B2")
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ApiError::RateLimited {
                retry_after: Some(30)
            }
        ));
    }

    #[test]
    fn cell_text_rendering() {
        assert_eq!(cell_text(&json!("plain")), "plain");
        assert_eq!(cell_text(&json!(42)), "42");
        assert_eq!(cell_text(&json!(true)), "true");
    }
}
