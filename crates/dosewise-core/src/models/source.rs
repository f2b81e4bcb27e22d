//! Per-source lookup results.

use serde::{Deserialize, Serialize};

/// Confidence label for a single source or for a whole resolution.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }
}

/// What one source returned for one lookup. Never mutated after an adapter
/// hands it back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceResult {
    /// Display name of the source
    pub source: String,
    /// Ingredient name as the source reported it
    pub ingredient: String,
    pub found: bool,
    pub dosage_form: Option<String>,
    pub common_use: Option<String>,
    pub dosage: Option<String>,
    pub administration_method: Option<String>,
    pub treatment_duration: Option<String>,
    pub warnings: Option<String>,
    /// Product type (label registry only)
    pub product_type: Option<String>,
    /// Source-native identifier (RxCUI, SPL set id)
    pub reference_id: Option<String>,
    pub confidence: Confidence,
    pub note: Option<String>,
}

impl SourceResult {
    /// A positive result with no detail fields filled in.
    pub fn found(source: impl Into<String>, ingredient: impl Into<String>, confidence: Confidence) -> Self {
        Self {
            source: source.into(),
            ingredient: ingredient.into(),
            found: true,
            dosage_form: None,
            common_use: None,
            dosage: None,
            administration_method: None,
            treatment_duration: None,
            warnings: None,
            product_type: None,
            reference_id: None,
            confidence,
            note: None,
        }
    }
}

/// `Some(trimmed)` unless the value is blank.
pub(crate) fn non_empty(value: impl AsRef<str>) -> Option<String> {
    let value = value.as_ref().trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
