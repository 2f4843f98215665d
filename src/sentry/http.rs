//! HTTP utilities for Sentry REST API calls

use anyhow::{Context, Result};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and strips control characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Non-success answer from the Sentry API.
///
/// Travels inside `anyhow::Error`; use [`api_status`] to get the status back.
#[derive(Debug, thiserror::Error)]
#[error("API request to {url} failed: {status}")]
pub struct SentryApiError {
    pub status: StatusCode,
    pub url: String,
}

/// Status code of a failed API call, if the error came from one.
pub fn api_status(error: &anyhow::Error) -> Option<StatusCode> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<SentryApiError>())
        .map(|e| e.status)
}

/// True when the API answered 404.
pub fn is_not_found(error: &anyhow::Error) -> bool {
    api_status(error) == Some(StatusCode::NOT_FOUND)
}

/// HTTP client wrapper for Sentry API calls
#[derive(Clone)]
pub struct SentryHttpClient {
    client: Client,
}

impl SentryHttpClient {
    /// Create a new HTTP client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(format!("sentry-iac/{}", crate::VERSION))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Make a GET request to the Sentry API
    pub async fn get(&self, url: &str, token: &str) -> Result<Value> {
        self.send(Method::GET, url, token, None).await
    }

    /// Make a POST request to the Sentry API
    pub async fn post(&self, url: &str, token: &str, body: Option<&Value>) -> Result<Value> {
        self.send(Method::POST, url, token, body).await
    }

    /// Make a PUT request to the Sentry API
    pub async fn put(&self, url: &str, token: &str, body: Option<&Value>) -> Result<Value> {
        self.send(Method::PUT, url, token, body).await
    }

    /// Make a DELETE request to the Sentry API
    pub async fn delete(&self, url: &str, token: &str) -> Result<Value> {
        self.send(Method::DELETE, url, token, None).await
    }

    async fn send(
        &self,
        method: Method,
        url: &str,
        token: &str,
        body: Option<&Value>,
    ) -> Result<Value> {
        tracing::debug!("{} {}", method, url);

        let mut request = self.client.request(method.clone(), url).bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("call to {} {} failed", method, url))?;

        let status = response.status();
        let response_body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            // Only the sanitized, truncated body is logged
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&response_body));
            return Err(SentryApiError {
                status,
                url: url.to_string(),
            }
            .into());
        }

        // 204 No Content and friends
        if response_body.is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&response_body).context("Failed to parse response JSON")
    }
}

/// Format a Sentry API error for display
pub fn format_api_error(error: &anyhow::Error) -> String {
    match api_status(error).map(|s| s.as_u16()) {
        Some(401) => "Authentication failed. Check the Sentry auth token.".to_string(),
        Some(403) => "Permission denied. The token lacks the required scopes.".to_string(),
        Some(404) => "Resource not found.".to_string(),
        Some(409) => "Resource conflict. The slug may already be taken.".to_string(),
        Some(429) => "Rate limit exceeded. Please try again later.".to_string(),
        Some(400) => "Invalid request. Check your parameters.".to_string(),
        Some(code) if code >= 500 => {
            "Sentry service temporarily unavailable. Please try again.".to_string()
        }
        _ => {
            let error_str = format!("{:#}", error);
            let sanitized = error_str
                .chars()
                .filter(|c| c.is_ascii_graphic() || *c == ' ')
                .take(120)
                .collect::<String>();

            if sanitized.len() < error_str.len() {
                format!("{}...", sanitized)
            } else {
                sanitized
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_truncates_long_bodies() {
        let body = "x".repeat(500);
        let sanitized = sanitize_for_log(&body);
        assert!(sanitized.starts_with(&"x".repeat(MAX_LOG_BODY_LENGTH)));
        assert!(sanitized.contains("[truncated, 500 bytes total]"));
    }

    #[test]
    fn test_sanitize_strips_control_characters() {
        assert_eq!(sanitize_for_log("a\nb\tc d"), "abc d");
    }

    #[test]
    fn test_api_status_survives_context() {
        let err: anyhow::Error = SentryApiError {
            status: StatusCode::NOT_FOUND,
            url: "https://sentry.example/api/0/projects/o/p/".to_string(),
        }
        .into();
        let err = err.context("could not read project");
        assert_eq!(api_status(&err), Some(StatusCode::NOT_FOUND));
        assert!(is_not_found(&err));
    }

    #[test]
    fn test_format_api_error() {
        let conflict: anyhow::Error = SentryApiError {
            status: StatusCode::CONFLICT,
            url: "u".to_string(),
        }
        .into();
        assert!(format_api_error(&conflict).contains("slug"));

        let other = anyhow::anyhow!("connection refused");
        assert_eq!(format_api_error(&other), "connection refused");
    }
}
