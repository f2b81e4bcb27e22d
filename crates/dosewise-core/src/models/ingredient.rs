//! Parsed active ingredients.

use dosewise_llm::Language;
use serde::{Deserialize, Serialize};

/// One active ingredient parsed from a drug name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Ingredient {
    /// Lookup name (lowercase, Arabic terms transliterated)
    pub name: String,
    /// Concentration value, if the input carried one
    pub strength: Option<f64>,
    /// Canonical unit symbol (mg, g, ml, mcg, %)
    pub unit: Option<String>,
    /// The drug name exactly as the caller supplied it
    pub original_name: String,
    /// Language of the original input
    pub language: Language,
}

impl Ingredient {
    /// Create an ingredient without a concentration.
    pub fn new(name: impl Into<String>, original_name: impl Into<String>, language: Language) -> Self {
        Self {
            name: name.into(),
            strength: None,
            unit: None,
            original_name: original_name.into(),
            language,
        }
    }

    /// Attach a concentration.
    pub fn with_strength(mut self, strength: f64, unit: impl Into<String>) -> Self {
        self.strength = Some(strength);
        self.unit = Some(unit.into());
        self
    }

    /// Concentration as written in prompts, e.g. `500mg`.
    pub fn strength_label(&self) -> Option<String> {
        match (self.strength, &self.unit) {
            (Some(strength), Some(unit)) => Some(format!("{strength}{unit}")),
            (Some(strength), None) => Some(strength.to_string()),
            _ => None,
        }
    }

    /// Human-readable label, e.g. `paracetamol 500mg`.
    pub fn label(&self) -> String {
        match self.strength_label() {
            Some(strength) => format!("{} {}", self.name, strength),
            None => self.name.clone(),
        }
    }

    /// Canonical `name|strength|unit` form used for cache signatures.
    pub fn signature(&self) -> String {
        format!(
            "{}|{}|{}",
            self.name.trim().to_lowercase(),
            self.strength.map(|s| s.to_string()).unwrap_or_default(),
            self.unit.as_deref().unwrap_or_default().to_lowercase()
        )
    }
}

/// Join ingredient labels with ` + `, in declared order.
pub fn describe_ingredients(ingredients: &[Ingredient]) -> String {
    ingredients
        .iter()
        .map(Ingredient::label)
        .collect::<Vec<_>>()
        .join(" + ")
}

/// Order-preserving, case-folded signature of an ingredient list.
pub fn ingredient_signature(ingredients: &[Ingredient]) -> String {
    ingredients
        .iter()
        .map(Ingredient::signature)
        .collect::<Vec<_>>()
        .join(";")
}
