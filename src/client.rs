use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct AskRequest<'a> {
    message: &'a str,
}

/// Success body of `POST /ask`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AskResponse {
    pub response: String,
    #[serde(rename = "rawMarkdown", default)]
    pub raw_markdown: Option<String>,
}

impl AskResponse {
    /// Markdown to store for re-rendering: the service's markdown field, or
    /// the response text when that field is missing or empty.
    pub fn markdown_source(&self) -> &str {
        match &self.raw_markdown {
            Some(md) if !md.is_empty() => md,
            _ => &self.response,
        }
    }
}

/// Every way an ask can fail. The exchange treats them all alike.
#[derive(Debug, thiserror::Error)]
pub enum AskError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

// ── Client ────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AskClient {
    http: reqwest::Client,
    pub endpoint: String,
}

impl AskClient {
    pub fn new(endpoint: String, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { http, endpoint })
    }

    /// One question, one answer. No retries.
    pub async fn ask(&self, message: &str) -> Result<AskResponse, AskError> {
        let resp = self
            .http
            .post(ask_url(&self.endpoint))
            .header("Content-Type", "application/json")
            .json(&AskRequest { message })
            .send()
            .await?;

        let status = resp.status();
        let text = resp.text().await?;
        if !status.is_success() {
            return Err(AskError::Status { status, body: text });
        }
        Ok(serde_json::from_str(&text)?)
    }
}

fn ask_url(endpoint: &str) -> String {
    format!("{}/ask", endpoint.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ask_url() {
        assert_eq!(ask_url("http://localhost:5000"), "http://localhost:5000/ask");
        assert_eq!(ask_url("http://localhost:5000/"), "http://localhost:5000/ask");
        assert_eq!(ask_url("https://host/chat/"), "https://host/chat/ask");
    }

    #[test]
    fn test_request_body() {
        let body = serde_json::to_value(AskRequest { message: "Hello" }).unwrap();
        assert_eq!(body, serde_json::json!({"message": "Hello"}));
    }

    #[test]
    fn test_response_without_markdown() {
        let r: AskResponse = serde_json::from_str(r#"{"response":"Hi there"}"#).unwrap();
        assert_eq!(r.raw_markdown, None);
        assert_eq!(r.markdown_source(), "Hi there");
    }

    #[test]
    fn test_response_with_markdown() {
        let r: AskResponse =
            serde_json::from_str(r#"{"response":"Hi","rawMarkdown":"**Hi**"}"#).unwrap();
        assert_eq!(r.markdown_source(), "**Hi**");

        let empty: AskResponse =
            serde_json::from_str(r#"{"response":"Hi","rawMarkdown":""}"#).unwrap();
        assert_eq!(empty.markdown_source(), "Hi");
    }

    #[test]
    fn test_response_missing_field_is_decode_error() {
        let err: AskError = serde_json::from_str::<AskResponse>(r#"{"answer":"x"}"#)
            .unwrap_err()
            .into();
        assert!(matches!(err, AskError::Decode(_)));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_transport_error() {
        let client =
            AskClient::new("http://127.0.0.1:9".to_string(), Duration::from_secs(2)).unwrap();
        let err = client.ask("hello").await.unwrap_err();
        assert!(matches!(err, AskError::Transport(_)));
    }
}
