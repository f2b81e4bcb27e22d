//! Dosage sources: authority HTTP adapters and the generative-model adapters.
//!
//! Every adapter swallows its own failures. A network error, a non-2xx status
//! or an unreadable body becomes `None` for that source and a log line, never
//! an error for the caller.

mod dailymed;
mod fallback;
mod gemini;
mod openfda;
mod rxnorm;
mod verifier;

pub use dailymed::*;
pub use fallback::*;
pub use gemini::*;
pub use openfda::*;
pub use rxnorm::*;
pub use verifier::*;

use std::time::Duration;

use async_trait::async_trait;
use dosewise_llm::ExtractionError;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{Ingredient, SourceResult};

/// Source errors. Internal to adapters.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("server returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Answer extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("no model API key configured")]
    MissingApiKey,

    #[error("model returned an empty completion")]
    EmptyCompletion,
}

impl SourceError {
    /// Whether the remote side answered "no such drug" rather than failing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SourceError::Status { status: 404, .. })
    }
}

pub type FetchResult<T> = Result<T, SourceError>;

/// A dosage data source queried with a parsed ingredient list.
#[async_trait]
pub trait DosageSource: Send + Sync {
    /// Display name, listed in `ResolutionResult::sources`.
    fn name(&self) -> &str;

    /// Look the ingredients up. `None` means not found or unavailable.
    async fn query(&self, ingredients: &[Ingredient]) -> Option<SourceResult>;
}

/// Narrow capability over a generative language model: prompt in, text out.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Display name of the model-backed source.
    fn name(&self) -> &str;

    /// Send one prompt and return the first completion's text.
    async fn complete(&self, prompt: &str) -> FetchResult<String>;
}

/// Build an HTTP client with a per-request timeout.
pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|e| {
            warn!(error = %e, "falling back to default HTTP client");
            reqwest::Client::new()
        })
}

/// GET a JSON document, failing on non-2xx.
pub(crate) async fn get_json(
    client: &reqwest::Client,
    url: &str,
    query: &[(&str, String)],
) -> FetchResult<Value> {
    debug!(url = %url, "querying source");
    let resp = client.get(url).query(query).send().await?;
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(SourceError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let body = resp.text().await?;
    Ok(serde_json::from_str(&body)?)
}

/// Map an adapter's fetch outcome to the never-failing query contract.
pub(crate) fn settle(source: &str, outcome: FetchResult<Option<SourceResult>>) -> Option<SourceResult> {
    match outcome {
        Ok(Some(result)) => {
            debug!(source = %source, "source found a match");
            Some(result)
        }
        Ok(None) => {
            debug!(source = %source, "source had no match");
            None
        }
        Err(e) if e.is_not_found() => {
            debug!(source = %source, "source had no match");
            None
        }
        Err(e) => {
            warn!(source = %source, error = %e, "source unavailable");
            None
        }
    }
}

/// First non-blank string of a label field that is either a string or an
/// array of strings.
pub(crate) fn first_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => crate::models::non_empty(s),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .find_map(|s| crate::models::non_empty(s)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_first_text() {
        let doc = json!({
            "array": ["", "  first  ", "second"],
            "string": "plain",
            "blank": ["  "],
            "number": 5
        });

        assert_eq!(first_text(doc.get("array")), Some("first".into()));
        assert_eq!(first_text(doc.get("string")), Some("plain".into()));
        assert_eq!(first_text(doc.get("blank")), None);
        assert_eq!(first_text(doc.get("number")), None);
        assert_eq!(first_text(doc.get("missing")), None);
    }

    #[test]
    fn test_not_found_status() {
        let missing = SourceError::Status { status: 404, body: String::new() };
        assert!(missing.is_not_found());

        let broken = SourceError::Status { status: 500, body: String::new() };
        assert!(!broken.is_not_found());
        assert!(settle("Test", Err(broken)).is_none());
    }

    #[test]
    fn test_timeout_is_unavailable() {
        let elapsed = SourceError::Timeout(Duration::from_secs(10));
        assert!(!elapsed.is_not_found());
        assert_eq!(elapsed.to_string(), "timed out after 10s");
        assert!(settle("Test", Err(elapsed)).is_none());
    }
}
