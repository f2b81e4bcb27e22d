//! Typed extraction of generative-model answers.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Extraction errors.
#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid response format: {0}")]
    InvalidFormat(String),

    #[error("No answer labels found in response")]
    MissingLabels,
}

pub type ExtractionResult<T> = Result<T, ExtractionError>;

/// Labels requested by the dosage fallback prompt, in prompt order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerLabel {
    DosageForm,
    CommonUse,
    Dosage,
    Administration,
    Duration,
    Warnings,
}

impl AnswerLabel {
    pub const ALL: [AnswerLabel; 6] = [
        AnswerLabel::DosageForm,
        AnswerLabel::CommonUse,
        AnswerLabel::Dosage,
        AnswerLabel::Administration,
        AnswerLabel::Duration,
        AnswerLabel::Warnings,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerLabel::DosageForm => "DOSAGE_FORM",
            AnswerLabel::CommonUse => "COMMON_USE",
            AnswerLabel::Dosage => "DOSAGE",
            AnswerLabel::Administration => "ADMINISTRATION",
            AnswerLabel::Duration => "DURATION",
            AnswerLabel::Warnings => "WARNINGS",
        }
    }

    /// Pattern capturing this label's value up to any other label or end of text.
    fn pattern(&self) -> Regex {
        let others = Self::ALL
            .iter()
            .filter(|l| *l != self)
            .map(|l| l.as_str())
            .collect::<Vec<_>>()
            .join("|");
        let pattern = format!(
            r"(?is)\b{}\s*:\s*(.*?)\s*(?:\b(?:{})\s*:|\z)",
            self.as_str(),
            others
        );
        // Built from fixed label names only.
        Regex::new(&pattern).unwrap_or_else(|e| panic!("invalid label pattern {pattern}: {e}"))
    }
}

static LABEL_PATTERNS: LazyLock<Vec<(AnswerLabel, Regex)>> =
    LazyLock::new(|| AnswerLabel::ALL.iter().map(|l| (*l, l.pattern())).collect());

/// The six-field answer to a dosage fallback prompt.
///
/// Labels the model left out are empty strings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StructuredAnswer {
    pub dosage_form: String,
    pub common_use: String,
    pub dosage: String,
    pub administration: String,
    pub duration: String,
    pub warnings: String,
}

impl StructuredAnswer {
    fn slot(&mut self, label: AnswerLabel) -> &mut String {
        match label {
            AnswerLabel::DosageForm => &mut self.dosage_form,
            AnswerLabel::CommonUse => &mut self.common_use,
            AnswerLabel::Dosage => &mut self.dosage,
            AnswerLabel::Administration => &mut self.administration,
            AnswerLabel::Duration => &mut self.duration,
            AnswerLabel::Warnings => &mut self.warnings,
        }
    }
}

/// Parse a `LABEL: value` answer into its six fields.
///
/// Fails with [`ExtractionError::MissingLabels`] when not a single label is
/// present, so the caller can fall back to the raw text.
pub fn parse_structured_answer(text: &str) -> ExtractionResult<StructuredAnswer> {
    if text.trim().is_empty() {
        return Err(ExtractionError::InvalidFormat("Empty response".into()));
    }

    let mut answer = StructuredAnswer::default();
    let mut matched = 0;

    for (label, pattern) in LABEL_PATTERNS.iter() {
        if let Some(caps) = pattern.captures(text) {
            matched += 1;
            let value = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            *answer.slot(*label) = clean_value(value);
        }
    }

    if matched == 0 {
        return Err(ExtractionError::MissingLabels);
    }

    Ok(answer)
}

/// Strip whitespace and markdown emphasis left around a label value.
fn clean_value(value: &str) -> String {
    value
        .trim_matches(|c: char| c.is_whitespace() || c == '*' || c == '_')
        .to_string()
}

/// Truncate to at most `max_chars` characters (not bytes).
pub fn truncate_chars(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

/// Parsed `Yes|95|reason` verification answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerificationAnswer {
    pub verified: bool,
    /// 0 - 100
    pub confidence: u8,
    pub reason: String,
}

/// Parse a pipe-delimited verification answer.
pub fn parse_verification_answer(text: &str) -> ExtractionResult<VerificationAnswer> {
    // Models sometimes add a preamble line; use the first line with a pipe
    let line = text
        .lines()
        .find(|l| l.contains('|'))
        .ok_or_else(|| ExtractionError::InvalidFormat("No '|' separator found".into()))?;

    let parts: Vec<&str> = line.splitn(3, '|').collect();
    if parts.len() < 3 {
        return Err(ExtractionError::InvalidFormat(format!(
            "Expected 3 fields, found {}",
            parts.len()
        )));
    }

    let verdict = parts[0]
        .trim()
        .trim_matches(|c: char| !c.is_alphanumeric())
        .to_lowercase();
    let verified = match verdict.as_str() {
        "yes" => true,
        "no" => false,
        other => {
            return Err(ExtractionError::InvalidFormat(format!(
                "Unexpected verdict: {other}"
            )))
        }
    };

    let confidence = parts[1]
        .trim()
        .trim_end_matches('%')
        .parse::<u32>()
        .map_err(|_| ExtractionError::InvalidFormat(format!("Bad confidence: {}", parts[1])))?
        .min(100) as u8;

    Ok(VerificationAnswer {
        verified,
        confidence,
        reason: parts[2].trim().to_string(),
    })
}

/// Response envelope of a `generateContent` call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionResponse {
    #[serde(default)]
    pub candidates: Vec<CompletionCandidate>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionCandidate {
    #[serde(default)]
    pub content: CompletionContent,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionContent {
    #[serde(default)]
    pub parts: Vec<CompletionPart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompletionPart {
    #[serde(default)]
    pub text: Option<String>,
}

impl CompletionResponse {
    /// Text of the first part of the first candidate.
    pub fn first_text(&self) -> Option<&str> {
        self.candidates
            .first()?
            .content
            .parts
            .first()?
            .text
            .as_deref()
    }
}

/// Locate the first completion's text in a raw response body.
pub fn parse_completion(body: &str) -> ExtractionResult<String> {
    let response: CompletionResponse = serde_json::from_str(body)?;
    response
        .first_text()
        .map(str::to_string)
        .ok_or_else(|| ExtractionError::InvalidFormat("No completion text in response".into()))
}

/// Interaction severity as reported by the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Severe,
    Moderate,
    Minor,
    #[serde(other)]
    Unknown,
}

/// One reported interaction between two medications.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Interaction {
    pub severity: Severity,
    #[serde(default)]
    pub drug1: String,
    #[serde(default)]
    pub drug2: String,
    #[serde(default)]
    pub effect: String,
    #[serde(default)]
    pub action: String,
}

/// Raw interaction report from the model.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InteractionReport {
    #[serde(default)]
    pub has_interactions: bool,
    #[serde(default)]
    pub total_interactions: u32,
    #[serde(default)]
    pub interactions: Vec<Interaction>,
}

/// Parse an interaction report, tolerating text around the JSON object.
pub fn parse_interaction_report(text: &str) -> ExtractionResult<InteractionReport> {
    let json_start = text.find('{').ok_or_else(|| {
        ExtractionError::InvalidFormat("No JSON object found in response".into())
    })?;
    let json_end = text.rfind('}').ok_or_else(|| {
        ExtractionError::InvalidFormat("No closing brace found in response".into())
    })?;
    if json_end < json_start {
        return Err(ExtractionError::InvalidFormat(
            "Closing brace before opening brace".into(),
        ));
    }

    let report: InteractionReport = serde_json::from_str(&text[json_start..=json_end])?;
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_ANSWER: &str = "DOSAGE_FORM: Tablets\n\
COMMON_USE: Pain relief and fever\n\
DOSAGE: 500-1000mg every 4-6 hours\nMaximum 4g per day\n\
ADMINISTRATION: Swallow with water\n\
DURATION: Up to 3 days for fever\n\
WARNINGS: Avoid alcohol. Liver damage in overdose.";

    #[test]
    fn test_parse_structured_answer() {
        let answer = parse_structured_answer(FULL_ANSWER).unwrap();
        assert_eq!(answer.dosage_form, "Tablets");
        assert_eq!(answer.common_use, "Pain relief and fever");
        assert_eq!(answer.dosage, "500-1000mg every 4-6 hours\nMaximum 4g per day");
        assert_eq!(answer.administration, "Swallow with water");
        assert_eq!(answer.duration, "Up to 3 days for fever");
        assert_eq!(answer.warnings, "Avoid alcohol. Liver damage in overdose.");
    }

    #[test]
    fn test_dosage_label_not_confused_with_dosage_form() {
        let answer = parse_structured_answer("DOSAGE_FORM: Syrup\nWARNINGS: none").unwrap();
        assert_eq!(answer.dosage_form, "Syrup");
        assert_eq!(answer.dosage, "");
    }

    #[test]
    fn test_missing_labels_default_to_empty() {
        let answer = parse_structured_answer("Some preamble\nDOSAGE: 10mg once daily").unwrap();
        assert_eq!(answer.dosage, "10mg once daily");
        assert_eq!(answer.dosage_form, "");
        assert_eq!(answer.warnings, "");
    }

    #[test]
    fn test_markdown_and_case() {
        let answer =
            parse_structured_answer("**Dosage_Form:** Cream\n**dosage:** Apply twice daily").unwrap();
        assert_eq!(answer.dosage_form, "Cream");
        assert_eq!(answer.dosage, "Apply twice daily");
    }

    #[test]
    fn test_no_labels_is_error() {
        assert!(matches!(
            parse_structured_answer("I cannot help with that."),
            Err(ExtractionError::MissingLabels)
        ));
        assert!(matches!(
            parse_structured_answer("   "),
            Err(ExtractionError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_truncate_chars_counts_characters() {
        assert_eq!(truncate_chars("باراسيتامول", 4), "بارا");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }

    #[test]
    fn test_parse_verification_answer() {
        let answer = parse_verification_answer("Yes|95|Standard adult dose").unwrap();
        assert!(answer.verified);
        assert_eq!(answer.confidence, 95);
        assert_eq!(answer.reason, "Standard adult dose");

        let answer = parse_verification_answer("Sure.\nNo | 40% | Too high | for children").unwrap();
        assert!(!answer.verified);
        assert_eq!(answer.confidence, 40);
        assert_eq!(answer.reason, "Too high | for children");
    }

    #[test]
    fn test_parse_verification_answer_failures() {
        assert!(parse_verification_answer("Yes, looks right").is_err());
        assert!(parse_verification_answer("Yes|95").is_err());
        assert!(parse_verification_answer("Maybe|50|unsure").is_err());
        assert!(parse_verification_answer("Yes|high|ok").is_err());
    }

    #[test]
    fn test_verification_confidence_clamped() {
        let answer = parse_verification_answer("yes|250|very sure").unwrap();
        assert_eq!(answer.confidence, 100);
    }

    #[test]
    fn test_parse_completion() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"DOSAGE: 5mg"}],"role":"model"}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "DOSAGE: 5mg");

        assert!(parse_completion(r#"{"candidates":[]}"#).is_err());
        assert!(parse_completion("not json").is_err());
    }

    #[test]
    fn test_parse_interaction_report_with_prefix() {
        let text = r#"Here is the analysis:
{"has_interactions": true, "total_interactions": 1, "interactions": [
  {"severity": "moderate", "drug1": "Marevan", "drug2": "Brufen", "effect": "Bleeding risk", "action": "Avoid"}
]}
Thanks"#;
        let report = parse_interaction_report(text).unwrap();
        assert!(report.has_interactions);
        assert_eq!(report.interactions.len(), 1);
        assert_eq!(report.interactions[0].severity, Severity::Moderate);
        assert_eq!(report.interactions[0].drug1, "Marevan");
    }

    #[test]
    fn test_unknown_severity() {
        let text = r#"{"has_interactions": true, "total_interactions": 1, "interactions": [{"severity": "major"}]}"#;
        let report = parse_interaction_report(text).unwrap();
        assert_eq!(report.interactions[0].severity, Severity::Unknown);
    }

    #[test]
    fn test_parse_interaction_report_invalid() {
        assert!(parse_interaction_report("no json here").is_err());
        assert!(parse_interaction_report("} backwards {").is_err());
    }
}
