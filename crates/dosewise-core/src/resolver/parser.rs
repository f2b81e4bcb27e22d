//! Drug name parser.
//!
//! Handles:
//! - Language detection (any Arabic-block character => Arabic)
//! - Arabic drug term transliteration (باراسيتامول→paracetamol)
//! - Combination splitting on `+`, `/`, `,`
//! - Strength/unit extraction with Arabic unit normalization (مجم→mg)

use std::collections::HashMap;

use dosewise_llm::Language;
use regex::Regex;

use crate::models::Ingredient;

/// Separators between ingredients of a combination product.
const SEGMENT_SEPARATORS: [char; 4] = ['+', '/', ',', '،'];

/// Parser from free-text drug names to ingredient lists.
pub struct NameParser {
    /// Arabic term → English lookup name, applied in insertion order
    terms: Vec<(String, String)>,
    /// Unit token → canonical symbol
    units: HashMap<String, String>,
    /// `(name)(strength)(unit)`, rebuilt when units change
    strength_pattern: Regex,
}

impl Default for NameParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Detect request language from the raw drug name.
pub fn detect_language(text: &str) -> Language {
    if text.chars().any(|c| ('\u{0600}'..='\u{06FF}').contains(&c)) {
        Language::Arabic
    } else {
        Language::English
    }
}

/// Map Arabic-Indic and Eastern Arabic-Indic digits to ASCII.
fn fold_digit(c: char) -> char {
    match c {
        '\u{0660}'..='\u{0669}' => char::from(b'0' + (c as u32 - 0x0660) as u8),
        '\u{06F0}'..='\u{06F9}' => char::from(b'0' + (c as u32 - 0x06F0) as u8),
        _ => c,
    }
}

impl NameParser {
    /// Create a parser with the built-in term and unit tables.
    pub fn new() -> Self {
        let units = Self::default_units();
        let strength_pattern = Self::build_strength_pattern(&units);
        Self {
            terms: Self::default_terms(),
            units,
            strength_pattern,
        }
    }

    /// Parse a drug name into its ingredients, in declared order.
    ///
    /// Never fails: a non-blank input that yields no segment becomes a single
    /// ingredient without strength. Blank input yields an empty list.
    pub fn parse(&self, raw: &str) -> Vec<Ingredient> {
        let original = raw.trim();
        if original.is_empty() {
            return Vec::new();
        }

        let language = detect_language(original);
        let lookup = match language {
            Language::Arabic => self.translate(original),
            Language::English => original.to_lowercase(),
        };

        let mut ingredients: Vec<Ingredient> = lookup
            .split(SEGMENT_SEPARATORS)
            .map(str::trim)
            .filter(|segment| !segment.is_empty())
            .map(|segment| self.parse_segment(segment, original, language))
            .collect();

        if ingredients.is_empty() {
            ingredients.push(Ingredient::new(lookup.trim(), original, language));
        }

        ingredients
    }

    /// Extract one ingredient from a single segment.
    ///
    /// Only the first strength token is used when a segment holds several.
    fn parse_segment(&self, segment: &str, original: &str, language: Language) -> Ingredient {
        if let Some(caps) = self.strength_pattern.captures(segment) {
            let name = caps.get(1).map(|m| m.as_str().trim()).unwrap_or_default();
            let strength = caps.get(2).and_then(|m| m.as_str().parse::<f64>().ok());
            let unit = caps.get(3).map(|m| self.normalize_unit(m.as_str()));

            if let (false, Some(strength), Some(unit)) = (name.is_empty(), strength, unit) {
                return Ingredient::new(name.to_lowercase(), original, language)
                    .with_strength(strength, unit);
            }
        }

        Ingredient::new(segment.to_lowercase(), original, language)
    }

    /// Replace known Arabic drug terms with their English lookup names.
    ///
    /// Arabic-Indic digits are folded to ASCII so strengths parse.
    pub fn translate(&self, text: &str) -> String {
        let mut translated: String = text.to_lowercase().chars().map(fold_digit).collect();
        for (arabic, english) in &self.terms {
            if translated.contains(arabic.as_str()) {
                translated = translated.replace(arabic.as_str(), english);
            }
        }
        translated
    }

    /// Map a unit token to its canonical English symbol.
    pub fn normalize_unit(&self, unit: &str) -> String {
        let lower = unit.trim().to_lowercase();
        self.units.get(&lower).cloned().unwrap_or(lower)
    }

    /// Add a custom Arabic term mapping.
    pub fn add_term(&mut self, arabic: &str, english: &str) {
        let arabic = arabic.trim().to_lowercase();
        let english = english.trim().to_lowercase();
        match self.terms.iter_mut().find(|(a, _)| *a == arabic) {
            Some(entry) => entry.1 = english,
            None => self.terms.push((arabic, english)),
        }
    }

    /// Add a custom unit token.
    pub fn add_unit(&mut self, token: &str, canonical: &str) {
        self.units
            .insert(token.trim().to_lowercase(), canonical.trim().to_lowercase());
        self.strength_pattern = Self::build_strength_pattern(&self.units);
    }

    fn build_strength_pattern(units: &HashMap<String, String>) -> Regex {
        // Longest tokens first so `mcg` wins over `g` and `ملغ` over `مل`
        let mut tokens: Vec<&String> = units.keys().collect();
        tokens.sort_by(|a, b| b.chars().count().cmp(&a.chars().count()).then(a.cmp(b)));
        let alternation = tokens
            .iter()
            .map(|t| regex::escape(t))
            .collect::<Vec<_>>()
            .join("|");

        // The name must end on a non-digit so `500mg` alone is not split into `5` + `00mg`.
        // The unit must not run into a letter, so `50 gummies` is not `50 g`.
        let pattern = format!(r"(?i)^(.*?\D)\s*([0-9]+(?:\.[0-9]+)?)\s*({alternation})(?:[^\p{{L}}]|$)");
        // Tokens are escaped, so the pattern is always valid.
        Regex::new(&pattern).unwrap_or_else(|e| panic!("invalid strength pattern {pattern}: {e}"))
    }

    /// Default Arabic drug terms.
    fn default_terms() -> Vec<(String, String)> {
        [
            ("باراسيتامول", "paracetamol"),
            ("ايبوبروفين", "ibuprofen"),
            ("اسبرين", "aspirin"),
            ("اموكسيسيلين", "amoxicillin"),
            ("ديكلوفيناك", "diclofenac"),
            ("اومفيزول", "omeprazole"),
            ("ميتفورمين", "metformin"),
            ("كافيين", "caffeine"),
        ]
        .into_iter()
        .map(|(a, e)| (a.to_string(), e.to_string()))
        .collect()
    }

    /// Default unit tokens.
    fn default_units() -> HashMap<String, String> {
        let mut map = HashMap::new();

        // Mass
        map.insert("mg".into(), "mg".into());
        map.insert("g".into(), "g".into());
        map.insert("mcg".into(), "mcg".into());
        map.insert("مجم".into(), "mg".into());
        map.insert("ملغ".into(), "mg".into());
        map.insert("جم".into(), "g".into());
        map.insert("ميكروغرام".into(), "mcg".into());

        // Volume
        map.insert("ml".into(), "ml".into());
        map.insert("مل".into(), "ml".into());

        // Percentage (creams, drops)
        map.insert("%".into(), "%".into());

        map
    }
}
