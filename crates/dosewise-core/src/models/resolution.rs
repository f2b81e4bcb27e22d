//! The externally visible result of a dosage resolution.

use chrono::{DateTime, Utc};
use dosewise_llm::Language;
use serde::{Deserialize, Serialize};

use super::{Confidence, Ingredient, SourceResult};

/// Dosage form reported when the winning source has none.
pub const DEFAULT_DOSAGE_FORM: &str = "Unknown";

/// Dosage text reported when the winning source has none.
pub const DEFAULT_DOSAGE: &str = "See prescribing information";

pub const GENERAL_INFO_WARNING_EN: &str =
    "This is general information. Consult your doctor for accurate dosage.";
pub const GENERAL_INFO_WARNING_AR: &str =
    "هذه معلومات عامة. استشر الطبيب للجرعة الدقيقة المناسبة لحالتك.";

pub const NOT_FOUND_WARNING: &str = "Consult your doctor or pharmacist for accurate dosage information. / استشر طبيبك أو صيدليك للحصول على معلومات الجرعة الدقيقة.";
pub const NOT_FOUND_MESSAGE: &str =
    "No dosage information found in any source / لم يتم العثور على معلومات الجرعة";
pub const UNPARSED_MESSAGE: &str = "Could not parse drug name / لم يتم التعرف على اسم الدواء";

/// General-information disclaimer in the request language.
pub fn general_warning(language: Language) -> &'static str {
    match language {
        Language::Arabic => GENERAL_INFO_WARNING_AR,
        Language::English => GENERAL_INFO_WARNING_EN,
    }
}

/// Advisory outcome of asking the model to double-check a dosage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AiVerification {
    pub verified: bool,
    /// 0 - 100
    pub confidence: u8,
    pub reason: String,
}

impl AiVerification {
    /// Outcome recorded when the verifier could not be reached or understood.
    pub fn failed() -> Self {
        Self {
            verified: false,
            confidence: 0,
            reason: "Verification failed".into(),
        }
    }
}

/// One resolution answer.
///
/// When `found` is false every optional field is `None`, `sources` is empty and
/// `confidence_tier` is absent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionResult {
    pub found: bool,
    pub ingredients: Vec<Ingredient>,
    pub dosage_form: Option<String>,
    pub common_use: Option<String>,
    pub dosage: Option<String>,
    pub administration_method: Option<String>,
    pub treatment_duration: Option<String>,
    pub warnings: Option<String>,
    /// Every source that found the drug, in priority order
    pub sources: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_tier: Option<Confidence>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_verification: Option<AiVerification>,
    /// Disclaimer carried over when the answer came from the AI fallback
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_note: Option<String>,
    /// Bilingual explanation when nothing was found
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub warning_message: String,
    pub language: Language,
    pub timestamp: DateTime<Utc>,
}

impl ResolutionResult {
    /// Build a positive result from the priority winner.
    ///
    /// The winner's fields are used verbatim; `sources` lists every member so
    /// corroboration stays visible.
    pub fn resolved(
        ingredients: Vec<Ingredient>,
        language: Language,
        best: &SourceResult,
        sources: Vec<String>,
        tier: Confidence,
        ai_sourced: bool,
    ) -> Self {
        let text = |value: &Option<String>| Some(value.clone().unwrap_or_default());

        Self {
            found: true,
            ingredients,
            dosage_form: Some(
                best.dosage_form
                    .clone()
                    .unwrap_or_else(|| DEFAULT_DOSAGE_FORM.to_string()),
            ),
            common_use: text(&best.common_use),
            dosage: Some(best.dosage.clone().unwrap_or_else(|| DEFAULT_DOSAGE.to_string())),
            administration_method: text(&best.administration_method),
            treatment_duration: text(&best.treatment_duration),
            warnings: text(&best.warnings),
            sources,
            confidence_tier: Some(tier),
            ai_verification: None,
            ai_note: if ai_sourced { best.note.clone() } else { None },
            message: None,
            warning_message: general_warning(language).to_string(),
            language,
            timestamp: Utc::now(),
        }
    }

    /// Build a negative result.
    pub fn unresolved(ingredients: Vec<Ingredient>, language: Language, message: &str) -> Self {
        Self {
            found: false,
            ingredients,
            dosage_form: None,
            common_use: None,
            dosage: None,
            administration_method: None,
            treatment_duration: None,
            warnings: None,
            sources: Vec::new(),
            confidence_tier: None,
            ai_verification: None,
            ai_note: None,
            message: Some(message.to_string()),
            warning_message: NOT_FOUND_WARNING.to_string(),
            language,
            timestamp: Utc::now(),
        }
    }

    /// Attach advisory verification metadata.
    pub fn with_verification(mut self, verification: AiVerification) -> Self {
        self.ai_verification = Some(verification);
        self
    }

    /// Re-stamp the language-dependent envelope for another request that
    /// shares this result's signature.
    pub fn localized_for(mut self, ingredients: Vec<Ingredient>, language: Language) -> Self {
        if self.found {
            self.warning_message = general_warning(language).to_string();
        }
        self.ingredients = ingredients;
        self.language = language;
        self
    }
}
