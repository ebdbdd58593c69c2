//! Shared HTTP plumbing for the analysis backends.

use std::time::Duration;

use super::AnalysisError;

/// Connect timeout, independent of the per-request timeout.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Longest error body kept in `BackendStatus` (bytes).
const MAX_ERROR_BODY: usize = 512;

/// Build the HTTP client shared by all backends.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .timeout(timeout)
        .build()
}

/// Send a prepared request and return the raw body of a 2xx response.
///
/// Transport failures become `BackendUnreachable`, non-2xx statuses become
/// `BackendStatus`. Body parsing is left to the caller so that a bad body is
/// reported as `ResponseMalformed`, never as a network problem.
pub async fn send_for_body(
    request: reqwest::RequestBuilder,
    endpoint: &str,
) -> Result<String, AnalysisError> {
    let response = request
        .send()
        .await
        .map_err(|e| unreachable_error(e, endpoint))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AnalysisError::BackendStatus {
            status: status.as_u16(),
            body: truncate(body, MAX_ERROR_BODY),
        });
    }

    response
        .text()
        .await
        .map_err(|e| unreachable_error(e, endpoint))
}

/// reqwest puts the full URL in its error text and query strings may carry
/// an API key, so the URL is dropped before the error is kept.
fn unreachable_error(e: reqwest::Error, endpoint: &str) -> AnalysisError {
    let detail = if e.is_connect() {
        "connection refused or host unreachable".to_string()
    } else if e.is_timeout() {
        "request timed out".to_string()
    } else {
        e.without_url().to_string()
    };
    AnalysisError::BackendUnreachable {
        endpoint: endpoint.to_string(),
        detail,
    }
}

fn truncate(mut body: String, max: usize) -> String {
    if body.len() > max {
        let mut cut = max;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
        body.push('…');
    }
    body
}
