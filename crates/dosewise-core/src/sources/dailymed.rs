//! Structured-label repository adapter (DailyMed SPL search).

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::{get_json, http_client, settle, DosageSource, FetchResult};
use crate::models::{non_empty, Confidence, Ingredient, SourceResult};

pub const DAILYMED_SOURCE: &str = "DailyMed";
pub const DAILYMED_BASE_URL: &str = "https://dailymed.nlm.nih.gov";

/// DailyMed SPL search by drug name.
pub struct DailyMedSource {
    client: reqwest::Client,
    base_url: String,
}

impl DailyMedSource {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: http_client(timeout),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    async fn fetch(&self, name: &str) -> FetchResult<Option<SourceResult>> {
        let url = format!("{}/dailymed/services/v2/spls.json", self.base_url);
        let body = get_json(&self.client, &url, &[("drug_name", name.to_string())]).await?;
        Ok(parse_spls(&body, name))
    }
}

#[async_trait]
impl DosageSource for DailyMedSource {
    fn name(&self) -> &str {
        DAILYMED_SOURCE
    }

    async fn query(&self, ingredients: &[Ingredient]) -> Option<SourceResult> {
        let primary = ingredients.first()?;
        settle(DAILYMED_SOURCE, self.fetch(&primary.name).await)
    }
}

/// A hit is any SPL in `data`; the first one's set id is kept.
pub fn parse_spls(body: &Value, ingredient: &str) -> Option<SourceResult> {
    let first = body.get("data")?.as_array()?.first()?;

    let mut result = SourceResult::found(DAILYMED_SOURCE, ingredient, Confidence::Medium);
    result.reference_id = first.get("setid").and_then(Value::as_str).and_then(non_empty);
    Some(result)
}
