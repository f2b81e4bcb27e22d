//! AI fallback source: asks a generative model for the six dosage fields.

use std::sync::Arc;

use async_trait::async_trait;
use dosewise_llm::{make_fallback_prompt, parse_structured_answer, truncate_chars};
use tracing::{debug, warn};

use super::{DosageSource, LanguageModel};
use crate::models::{describe_ingredients, non_empty, Confidence, Ingredient, SourceResult};

/// Disclaimer attached to every AI-sourced result.
pub const AI_DISCLAIMER: &str = "AI-generated information - Please verify with healthcare professional";

const DOSAGE_FORM_MAX_CHARS: usize = 100;
const COMMON_USE_MAX_CHARS: usize = 200;
const DOSAGE_MAX_CHARS: usize = 500;
const ADMINISTRATION_MAX_CHARS: usize = 300;
const DURATION_MAX_CHARS: usize = 200;
const WARNINGS_MAX_CHARS: usize = 300;
/// Raw text kept as the dosage when the answer has no labels at all.
const RAW_DOSAGE_MAX_CHARS: usize = 300;

/// Fallback source backed by a language model.
///
/// Results are always [`Confidence::Low`].
pub struct AiFallbackSource {
    model: Arc<dyn LanguageModel>,
}

impl AiFallbackSource {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl DosageSource for AiFallbackSource {
    fn name(&self) -> &str {
        self.model.name()
    }

    async fn query(&self, ingredients: &[Ingredient]) -> Option<SourceResult> {
        let primary = ingredients.first()?;
        let prompt = make_fallback_prompt(
            &describe_ingredients(ingredients),
            &primary.original_name,
            primary.language,
        );

        match self.model.complete(&prompt).await {
            Ok(text) => Some(answer_to_result(self.name(), &primary.name, &text)),
            Err(e) => {
                warn!(source = %self.name(), error = %e, "AI fallback unavailable");
                None
            }
        }
    }
}

/// Convert a model answer into a low-confidence result.
///
/// An answer with no recognizable labels keeps its leading raw text as the dosage.
pub fn answer_to_result(source: &str, ingredient: &str, text: &str) -> SourceResult {
    let mut result = SourceResult::found(source, ingredient, Confidence::Low);
    result.note = Some(AI_DISCLAIMER.to_string());

    match parse_structured_answer(text) {
        Ok(answer) => {
            let capped = |value: &str, max: usize| non_empty(truncate_chars(value, max));
            result.dosage_form = capped(&answer.dosage_form, DOSAGE_FORM_MAX_CHARS);
            result.common_use = capped(&answer.common_use, COMMON_USE_MAX_CHARS);
            result.dosage = capped(&answer.dosage, DOSAGE_MAX_CHARS);
            result.administration_method = capped(&answer.administration, ADMINISTRATION_MAX_CHARS);
            result.treatment_duration = capped(&answer.duration, DURATION_MAX_CHARS);
            result.warnings = capped(&answer.warnings, WARNINGS_MAX_CHARS);
        }
        Err(e) => {
            debug!(error = %e, "unstructured AI answer, keeping raw text");
            result.dosage = non_empty(truncate_chars(text.trim(), RAW_DOSAGE_MAX_CHARS));
        }
    }

    result
}
