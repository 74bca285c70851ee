//! HTTP utilities for OpenStack REST API calls

use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::Value;

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Header carrying the keystone token
pub const AUTH_TOKEN_HEADER: &str = "X-Auth-Token";

/// Truncate a response body and strip control characters before logging
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let cut = (0..=MAX_LOG_BODY_LENGTH)
            .rev()
            .find(|i| body.is_char_boundary(*i))
            .unwrap_or(0);
        format!("{}... [truncated, {} bytes total]", &body[..cut], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// HTTP client wrapper for OpenStack API calls
#[derive(Clone)]
pub struct OpenStackHttpClient {
    client: Client,
}

impl OpenStackHttpClient {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("stackquery/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// GET a JSON document
    pub async fn get(&self, url: &str, token: &str) -> Result<Value> {
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .header(AUTH_TOKEN_HEADER, token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            // Only the sanitized body is logged; the error carries the status alone
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(anyhow::anyhow!("API request failed: {}", status));
        }

        serde_json::from_str(&body).context("Failed to parse response JSON")
    }
}

/// Format an OpenStack API error for display
pub fn format_openstack_error(error: &anyhow::Error) -> String {
    let error_str = format!("{:#}", error);

    if error_str.contains("401") {
        return "Authentication failed. Check that OS_AUTH_TOKEN holds a valid token.".to_string();
    }
    if error_str.contains("403") {
        return "Permission denied. The token's roles do not allow this listing.".to_string();
    }
    if error_str.contains("404") {
        return "Endpoint not found. Check the service endpoints in the config file.".to_string();
    }
    if error_str.contains("429") {
        return "Rate limit exceeded. Please try again later.".to_string();
    }
    if error_str.contains("400") {
        return "Invalid request. Check the filter parameters.".to_string();
    }
    if error_str.contains("500") || error_str.contains("503") {
        return "OpenStack service temporarily unavailable. Please try again.".to_string();
    }

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_truncates_long_bodies() {
        let body = "x".repeat(500);
        let sanitized = sanitize_for_log(&body);
        assert!(sanitized.contains("truncated, 500 bytes total"));
        assert!(sanitized.len() < 300);
    }

    #[test]
    fn test_sanitize_strips_control_chars() {
        assert_eq!(sanitize_for_log("bad\nbody\t!"), "badbody!");
    }

    #[test]
    fn test_format_error_by_status() {
        let err = anyhow::anyhow!("API request failed: 401 Unauthorized");
        assert!(format_openstack_error(&err).contains("OS_AUTH_TOKEN"));
        let err = anyhow::anyhow!("API request failed: 503 Service Unavailable");
        assert!(format_openstack_error(&err).contains("temporarily unavailable"));
    }
}
