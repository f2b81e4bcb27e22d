//! Drug-label registry adapter (openFDA `drug/label` endpoint).

use std::time::Duration;

use async_trait::async_trait;
use dosewise_llm::truncate_chars;
use serde_json::Value;

use super::{first_text, get_json, http_client, settle, DosageSource, FetchResult};
use crate::models::{Confidence, Ingredient, SourceResult};

pub const OPENFDA_SOURCE: &str = "FDA OpenFDA";
pub const OPENFDA_BASE_URL: &str = "https://api.fda.gov";

const COMMON_USE_MAX_CHARS: usize = 200;
const DOSAGE_MAX_CHARS: usize = 500;
const WARNINGS_MAX_CHARS: usize = 300;
const SEARCH_LIMIT: &str = "5";

/// openFDA drug label search by generic name.
pub struct OpenFdaSource {
    client: reqwest::Client,
    base_url: String,
}

impl OpenFdaSource {
    /// `base_url` should be like `https://api.fda.gov` (no trailing slash).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn fetch(&self, name: &str) -> FetchResult<Option<SourceResult>> {
        let url = format!("{}/drug/label.json", self.base_url);
        let query = [
            ("search", format!("openfda.generic_name:\"{}\"", name.replace('"', ""))),
            ("limit", SEARCH_LIMIT.to_string()),
        ];
        let body = get_json(&self.client, &url, &query).await?;
        Ok(parse_label_response(&body, name))
    }
}

#[async_trait]
impl DosageSource for OpenFdaSource {
    fn name(&self) -> &str {
        OPENFDA_SOURCE
    }

    async fn query(&self, ingredients: &[Ingredient]) -> Option<SourceResult> {
        let primary = ingredients.first()?;
        settle(OPENFDA_SOURCE, self.fetch(&primary.name).await)
    }
}

/// Turn a label search response into a result. `None` when there are no results.
pub fn parse_label_response(body: &Value, ingredient: &str) -> Option<SourceResult> {
    let label = body.get("results")?.as_array()?.first()?;
    let openfda = label.get("openfda");

    let mut result = SourceResult::found(OPENFDA_SOURCE, ingredient, Confidence::High);
    result.dosage_form = Some(
        first_text(openfda.and_then(|o| o.get("route"))).unwrap_or_else(|| "Unknown".into()),
    );
    result.product_type = first_text(openfda.and_then(|o| o.get("product_type")));
    result.common_use = first_text(label.get("indications_and_usage"))
        .map(|v| truncate_chars(&v, COMMON_USE_MAX_CHARS));
    result.dosage = Some(
        first_text(label.get("dosage_and_administration"))
            .map(|v| truncate_chars(&v, DOSAGE_MAX_CHARS))
            .unwrap_or_else(|| "Not specified".into()),
    );
    result.warnings =
        first_text(label.get("warnings")).map(|v| truncate_chars(&v, WARNINGS_MAX_CHARS));

    Some(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_label_response() {
        let body = json!({
            "meta": {"results": {"total": 1}},
            "results": [{
                "openfda": {
                    "generic_name": ["ACETAMINOPHEN"],
                    "route": ["ORAL"],
                    "product_type": ["HUMAN OTC DRUG"]
                },
                "indications_and_usage": ["temporarily relieves minor aches and pains"],
                "dosage_and_administration": ["adults: take 2 caplets every 6 hours"],
                "warnings": ["Liver warning: severe liver damage may occur"]
            }]
        });

        let result = parse_label_response(&body, "paracetamol").unwrap();
        assert!(result.found);
        assert_eq!(result.source, OPENFDA_SOURCE);
        assert_eq!(result.ingredient, "paracetamol");
        assert_eq!(result.dosage_form.as_deref(), Some("ORAL"));
        assert_eq!(result.product_type.as_deref(), Some("HUMAN OTC DRUG"));
        assert_eq!(result.dosage.as_deref(), Some("adults: take 2 caplets every 6 hours"));
        assert_eq!(result.confidence, Confidence::High);
    }

    #[test]
    fn test_missing_fields_default() {
        let body = json!({"results": [{"openfda": {}}]});

        let result = parse_label_response(&body, "x").unwrap();
        assert_eq!(result.dosage_form.as_deref(), Some("Unknown"));
        assert_eq!(result.dosage.as_deref(), Some("Not specified"));
        assert!(result.common_use.is_none());
        assert!(result.warnings.is_none());
    }

    #[test]
    fn test_long_sections_truncated() {
        let long = "x".repeat(2_000);
        let body = json!({"results": [{
            "dosage_and_administration": [long.clone()],
            "indications_and_usage": [long.clone()],
            "warnings": [long]
        }]});

        let result = parse_label_response(&body, "x").unwrap();
        assert_eq!(result.dosage.unwrap().chars().count(), DOSAGE_MAX_CHARS);
        assert_eq!(result.common_use.unwrap().chars().count(), COMMON_USE_MAX_CHARS);
        assert_eq!(result.warnings.unwrap().chars().count(), WARNINGS_MAX_CHARS);
    }

    #[test]
    fn test_empty_or_malformed() {
        assert!(parse_label_response(&json!({"results": []}), "x").is_none());
        assert!(parse_label_response(&json!({"error": {"code": "NOT_FOUND"}}), "x").is_none());
        assert!(parse_label_response(&json!({"results": "oops"}), "x").is_none());
    }

    #[test]
    fn test_base_url_trimmed() {
        let source = OpenFdaSource::new("https://api.fda.gov/", Duration::from_secs(1));
        assert_eq!(source.base_url, "https://api.fda.gov");
    }
}
