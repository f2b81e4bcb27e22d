//! Drug-interaction check across a patient's medications.
//!
//! One model call per distinct medication set; answers are cached by the
//! sorted set, independent of request language.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dosewise_llm::{build_interaction_prompt, parse_interaction_report, InteractionReport, Language};
use serde::{Deserialize, Serialize};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::cache::{cache_key, ResponseCache};
use crate::sources::LanguageModel;

/// Cache namespace for interaction reports.
pub const INTERACTION_CACHE_NAMESPACE: &str = "interactions";

const DEFAULT_INTERACTION_TIMEOUT: Duration = Duration::from_secs(15);

const TOO_FEW_EN: &str = "Please add at least 2 medications to check";
const TOO_FEW_AR: &str = "يرجى إضافة دوائين على الأقل للفحص";
const UNAVAILABLE_EN: &str = "Interaction check is unavailable right now. Please try again later";
const UNAVAILABLE_AR: &str = "فحص التفاعلات غير متاح حاليا. يرجى المحاولة لاحقا";

/// A medication on the patient's list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MedicationRef {
    pub brand_name: String,
    #[serde(default)]
    pub active_ingredient: Option<String>,
}

impl MedicationRef {
    pub fn new(brand_name: impl Into<String>, active_ingredient: Option<&str>) -> Self {
        Self {
            brand_name: brand_name.into(),
            active_ingredient: active_ingredient.map(str::to_string),
        }
    }

    fn active(&self) -> &str {
        self.active_ingredient.as_deref().unwrap_or("").trim()
    }

    /// Case-folded `(active, brand)`, the canonical ordering.
    fn sort_key(&self) -> (String, String) {
        (self.active().to_lowercase(), self.brand_name.trim().to_lowercase())
    }

    /// `active|brand`, case-folded.
    fn key_material(&self) -> String {
        let (active, brand) = self.sort_key();
        format!("{active}|{brand}")
    }

    /// `n. Brand (Active: ingredient)` line for the prompt.
    fn prompt_line(&self, position: usize) -> String {
        let brand = match self.brand_name.trim() {
            "" => "Unknown",
            brand => brand,
        };
        match self.active() {
            "" => format!("{position}. {brand}"),
            active => format!("{position}. {brand} (Active: {active})"),
        }
    }
}

/// Outcome of an interaction check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InteractionCheck {
    #[serde(flatten)]
    pub report: InteractionReport,
    /// Localized explanation when no check could be made
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    /// `YYYY-MM-DD HH:MM` UTC
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checked_date: Option<String>,
    #[serde(default)]
    pub medications_checked: usize,
}

impl InteractionCheck {
    fn unchecked(details: &str, medications_checked: usize) -> Self {
        Self {
            report: InteractionReport::default(),
            details: Some(details.to_string()),
            checked_date: None,
            medications_checked,
        }
    }

    fn checked(report: InteractionReport, medications_checked: usize) -> Self {
        Self {
            report,
            details: None,
            checked_date: Some(Utc::now().format("%Y-%m-%d %H:%M").to_string()),
            medications_checked,
        }
    }

    pub fn has_interactions(&self) -> bool {
        self.report.has_interactions
    }
}

/// Checks medication lists for interactions with a language model.
pub struct InteractionChecker {
    model: Arc<dyn LanguageModel>,
    cache: ResponseCache,
    timeout: Duration,
}

impl InteractionChecker {
    pub fn new(model: Arc<dyn LanguageModel>, cache: ResponseCache) -> Self {
        Self {
            model,
            cache,
            timeout: DEFAULT_INTERACTION_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Check `medications` against each other.
    ///
    /// Fewer than two medications never reach the model. A failed or
    /// unreadable model answer yields an empty report that is not cached.
    pub async fn check(&self, medications: &[MedicationRef], language: Language) -> InteractionCheck {
        if medications.len() < 2 {
            let details = if language.is_arabic() { TOO_FEW_AR } else { TOO_FEW_EN };
            return InteractionCheck::unchecked(details, medications.len());
        }

        let mut sorted = medications.to_vec();
        sorted.sort_by_cached_key(MedicationRef::sort_key);

        let material = sorted
            .iter()
            .map(MedicationRef::key_material)
            .collect::<Vec<_>>()
            .join("-");
        let key = cache_key(INTERACTION_CACHE_NAMESPACE, &material);

        if let Some(cached) = self.cache.get::<InteractionCheck>(&key).await {
            info!(count = sorted.len(), "interaction check served from cache");
            return cached;
        }
        debug!(count = sorted.len(), "interaction cache miss");

        let list = sorted
            .iter()
            .enumerate()
            .map(|(idx, med)| med.prompt_line(idx + 1))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = build_interaction_prompt(&list, language);

        let text = match timeout(self.timeout, self.model.complete(&prompt)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                warn!(model = %self.model.name(), error = %e, "interaction check failed");
                return self.unavailable(language, sorted.len());
            }
            Err(_) => {
                warn!(model = %self.model.name(), timeout_ms = self.timeout.as_millis() as u64, "interaction check timed out");
                return self.unavailable(language, sorted.len());
            }
        };

        match parse_interaction_report(&text) {
            Ok(report) => {
                info!(count = sorted.len(), interactions = report.interactions.len(), "interaction check complete");
                let result = InteractionCheck::checked(report, sorted.len());
                self.cache.put(&key, &result).await;
                result
            }
            Err(e) => {
                warn!(error = %e, "unreadable interaction report");
                InteractionCheck::checked(InteractionReport::default(), sorted.len())
            }
        }
    }

    fn unavailable(&self, language: Language, count: usize) -> InteractionCheck {
        let details = if language.is_arabic() { UNAVAILABLE_AR } else { UNAVAILABLE_EN };
        InteractionCheck::unchecked(details, count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{FetchResult, SourceError};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedModel {
        reply: Option<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedModel {
        fn replying(reply: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.map(str::to_string),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        fn name(&self) -> &str {
            "Scripted"
        }

        async fn complete(&self, prompt: &str) -> FetchResult<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone().ok_or(SourceError::EmptyCompletion)
        }
    }

    const REPORT: &str = r#"Sure! {"has_interactions": true, "total_interactions": 1, "interactions": [
        {"severity": "moderate", "drug1": "Aspirin", "drug2": "Warfarin", "effect": "Bleeding risk", "action": "Monitor INR"}
    ]} Hope this helps."#;

    fn meds() -> Vec<MedicationRef> {
        vec![
            MedicationRef::new("Warfarin", Some("warfarin")),
            MedicationRef::new("Aspirin", Some("acetylsalicylic acid")),
        ]
    }

    #[tokio::test]
    async fn test_too_few_medications() {
        let model = ScriptedModel::replying(Some(REPORT));
        let checker = InteractionChecker::new(model.clone(), ResponseCache::in_memory());

        let result = checker.check(&meds()[..1], Language::Arabic).await;

        assert!(!result.has_interactions());
        assert_eq!(result.details.as_deref(), Some(TOO_FEW_AR));
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_check_sorts_and_caches() {
        let model = ScriptedModel::replying(Some(REPORT));
        let checker = InteractionChecker::new(model.clone(), ResponseCache::in_memory());

        let first = checker.check(&meds(), Language::English).await;
        assert!(first.has_interactions());
        assert_eq!(first.report.total_interactions, 1);
        assert_eq!(first.medications_checked, 2);
        assert!(first.checked_date.is_some());

        let prompt = model.prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains("1. Aspirin (Active: acetylsalicylic acid)\n2. Warfarin (Active: warfarin)"));

        // Reversed order and another language hit the same entry.
        let mut reversed = meds();
        reversed.reverse();
        let second = checker.check(&reversed, Language::Arabic).await;

        assert_eq!(second, first);
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_failure_is_empty_and_uncached() {
        let model = ScriptedModel::replying(None);
        let checker = InteractionChecker::new(model.clone(), ResponseCache::in_memory());

        let result = checker.check(&meds(), Language::English).await;
        assert!(!result.has_interactions());
        assert!(result.report.interactions.is_empty());
        assert_eq!(result.details.as_deref(), Some(UNAVAILABLE_EN));

        checker.check(&meds(), Language::English).await;
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn test_unparseable_answer_is_empty_report() {
        let model = ScriptedModel::replying(Some("I cannot answer that."));
        let checker = InteractionChecker::new(model.clone(), ResponseCache::in_memory());

        let result = checker.check(&meds(), Language::English).await;
        assert!(!result.has_interactions());
        assert_eq!(result.report.total_interactions, 0);
        assert!(result.details.is_none());
        assert_eq!(result.medications_checked, 2);
    }

    #[test]
    fn test_prompt_line_without_active() {
        let med = MedicationRef::new("Panadol", None);
        assert_eq!(med.prompt_line(3), "3. Panadol");
        assert_eq!(med.key_material(), "|panadol");
    }

    #[test]
    fn test_flattened_serialization() {
        let check = InteractionCheck::checked(InteractionReport::default(), 2);
        let json = serde_json::to_value(&check).unwrap();

        assert_eq!(json["has_interactions"], false);
        assert_eq!(json["medications_checked"], 2);
        assert!(json.get("details").is_none());
    }
}
