//! Terminology adapter (RxNorm via RxNav).
//!
//! Two calls: an approximate-term match to get an RxCUI, then the concept
//! properties for its preferred name.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{get_json, http_client, settle, DosageSource, FetchResult};
use crate::models::{non_empty, Confidence, Ingredient, SourceResult};

pub const RXNORM_SOURCE: &str = "RxNorm NLM";
pub const RXNORM_BASE_URL: &str = "https://rxnav.nlm.nih.gov";

const MAX_ENTRIES: &str = "5";

/// RxNorm approximate-term lookup.
pub struct RxNormSource {
    client: reqwest::Client,
    base_url: String,
}

impl RxNormSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn fetch(&self, name: &str) -> FetchResult<Option<SourceResult>> {
        let url = format!("{}/REST/approximateTerm.json", self.base_url);
        let query = [("term", name.to_string()), ("maxEntries", MAX_ENTRIES.to_string())];
        let candidates = get_json(&self.client, &url, &query).await?;

        let Some(rxcui) = parse_best_rxcui(&candidates) else {
            return Ok(None);
        };

        let url = format!("{}/REST/rxcui/{}/properties.json", self.base_url, rxcui);
        let properties = get_json(&self.client, &url, &[]).await?;
        Ok(Some(parse_properties(&properties, &rxcui, name)))
    }
}

#[async_trait]
impl DosageSource for RxNormSource {
    fn name(&self) -> &str {
        RXNORM_SOURCE
    }

    async fn query(&self, ingredients: &[Ingredient]) -> Option<SourceResult> {
        let primary = ingredients.first()?;
        settle(RXNORM_SOURCE, self.fetch(&primary.name).await)
    }
}

/// RxCUI of the first approximate-match candidate.
pub fn parse_best_rxcui(body: &Value) -> Option<String> {
    body.get("approximateGroup")?
        .get("candidate")?
        .as_array()?
        .iter()
        .find_map(|c| match c.get("rxcui")? {
            Value::String(s) => non_empty(s),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

/// Build the result from a properties response, falling back to the lookup name.
pub fn parse_properties(body: &Value, rxcui: &str, lookup_name: &str) -> SourceResult {
    let name = body
        .get("properties")
        .and_then(|p| p.get("name"))
        .and_then(Value::as_str)
        .and_then(non_empty)
        .unwrap_or_else(|| lookup_name.to_string());

    let mut result = SourceResult::found(RXNORM_SOURCE, name, Confidence::High);
    result.reference_id = Some(rxcui.to_string());
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_best_rxcui() {
        let body = json!({
            "approximateGroup": {
                "inputTerm": "paracetamol",
                "candidate": [
                    {"rxcui": "", "score": "10"},
                    {"rxcui": "161", "score": "9.5", "rank": "1"},
                    {"rxcui": "313782", "rank": "2"}
                ]
            }
        });
        assert_eq!(parse_best_rxcui(&body), Some("161".into()));
    }

    #[test]
    fn test_parse_best_rxcui_empty() {
        assert_eq!(parse_best_rxcui(&json!({"approximateGroup": {"inputTerm": "zzz"}})), None);
        assert_eq!(parse_best_rxcui(&json!({"approximateGroup": {"candidate": []}})), None);
        assert_eq!(parse_best_rxcui(&json!({})), None);
    }

    #[test]
    fn test_parse_properties() {
        let body = json!({"properties": {"rxcui": "161", "name": "acetaminophen", "tty": "IN"}});
        let result = parse_properties(&body, "161", "paracetamol");

        assert!(result.found);
        assert_eq!(result.ingredient, "acetaminophen");
        assert_eq!(result.reference_id.as_deref(), Some("161"));
        assert_eq!(result.confidence, Confidence::High);
        assert!(result.dosage.is_none());
    }

    #[test]
    fn test_parse_properties_falls_back_to_lookup_name() {
        let result = parse_properties(&json!({}), "161", "paracetamol");
        assert_eq!(result.ingredient, "paracetamol");
    }
}
