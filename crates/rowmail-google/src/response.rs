//! Shared response triage for vendor API calls.

use crate::error::{ApiError, ApiResult};

/// Sends a prepared request and returns the successful response body.
///
/// Non-success statuses are mapped to typed errors; the wrapped call is
/// never retried here.
pub(crate) async fn read_success(builder: reqwest::RequestBuilder) -> ApiResult<String> {
    let response = builder.send().await.map_err(|e| {
        if e.is_timeout() {
            ApiError::Network("request timed out".to_string())
        } else if e.is_connect() {
            ApiError::Network(format!("connection failed: {}", e))
        } else {
            ApiError::Network(format!("request failed: {}", e))
        }
    })?;

    let status = response.status();

    if status == reqwest::StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized(
            "access token expired or invalid".to_string(),
        ));
    }

    if status == reqwest::StatusCode::FORBIDDEN {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Forbidden(body));
    }

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        return Err(ApiError::RateLimited { retry_after });
    }

    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Api {
            status: status.as_u16(),
            body,
        });
    }

    response
        .text()
        .await
        .map_err(|e| ApiError::Network(format!("failed to read response: {}", e)))
}
