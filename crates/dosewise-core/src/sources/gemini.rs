//! Generative-model client (Gemini `generateContent`).

use std::time::Duration;

use async_trait::async_trait;
use dosewise_llm::parse_completion;
use serde::Serialize;
use tracing::debug;

use super::{http_client, FetchResult, LanguageModel, SourceError};

pub const GEMINI_SOURCE: &str = "Google Gemini AI";
pub const GEMINI_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const GEMINI_MODEL: &str = "gemini-1.5-flash";

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

impl<'a> GenerateRequest<'a> {
    fn from_prompt(prompt: &'a str) -> Self {
        Self {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
        }
    }
}

/// Gemini client. The API key travels as the `key` query parameter.
pub struct GeminiClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: http_client(timeout),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    fn url(&self) -> String {
        format!("{}/{}:generateContent", self.endpoint, self.model)
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    fn name(&self) -> &str {
        GEMINI_SOURCE
    }

    async fn complete(&self, prompt: &str) -> FetchResult<String> {
        if self.api_key.is_empty() {
            return Err(SourceError::MissingApiKey);
        }

        let url = self.url();
        debug!(model = %self.model, prompt_chars = prompt.chars().count(), "calling generative model");
        let resp = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&GenerateRequest::from_prompt(prompt))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp.text().await?;
        let text = parse_completion(&body)?;
        if text.trim().is_empty() {
            return Err(SourceError::EmptyCompletion);
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_body_shape() {
        let body = serde_json::to_value(GenerateRequest::from_prompt("hello")).unwrap();
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hello");
    }

    #[test]
    fn test_url() {
        let client = GeminiClient::new(format!("{GEMINI_ENDPOINT}/"), GEMINI_MODEL, "k", Duration::from_secs(1));
        assert_eq!(
            client.url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[tokio::test]
    async fn test_missing_key_fails_without_request() {
        let client = GeminiClient::new(GEMINI_ENDPOINT, GEMINI_MODEL, "", Duration::from_secs(1));
        assert!(matches!(client.complete("hi").await, Err(SourceError::MissingApiKey)));
    }
}
