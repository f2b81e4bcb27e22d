//! Prompts for dosage fallback, dosage verification and interaction checks.
//!
//! The fallback prompt asks for six `LABEL: value` lines so the answer can be
//! parsed with [`crate::parse_structured_answer`].

use serde::{Deserialize, Serialize};

/// Language of a request, derived from the drug name the user typed.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Language {
    #[serde(rename = "ar")]
    Arabic,
    #[default]
    #[serde(rename = "en")]
    English,
}

impl Language {
    /// ISO 639-1 code.
    pub fn code(&self) -> &'static str {
        match self {
            Language::Arabic => "ar",
            Language::English => "en",
        }
    }

    /// Parse an ISO 639-1 code. Anything other than `ar` is English.
    pub fn from_code(code: &str) -> Self {
        if code.trim().eq_ignore_ascii_case("ar") {
            Language::Arabic
        } else {
            Language::English
        }
    }

    pub fn is_arabic(&self) -> bool {
        matches!(self, Language::Arabic)
    }

    /// English name of the language, used inside prompts.
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::Arabic => "Arabic",
            Language::English => "English",
        }
    }
}

/// Dosage fallback prompt in English.
pub fn make_fallback_prompt_en(drug: &str, original_name: &str) -> String {
    format!(
        r#"You are a medical information expert. Provide detailed information for this medication:

Drug: {drug}
Original Name: {original_name}

Please provide the following information clearly and organized:
1. Dosage form (tablets, cream, spray, injection, liquid, etc.)
2. Most common medical use
3. Standard adult dosage based on form
4. Administration method (how to take or apply)
5. Typical treatment duration
6. Important warnings

Response format (use this exact format):
DOSAGE_FORM: [type of medication]
COMMON_USE: [most common use]
DOSAGE: [standard dosage]
ADMINISTRATION: [how to use]
DURATION: [treatment duration]
WARNINGS: [important warnings]

Keep it concise and useful (under 300 words)."#
    )
}

/// Dosage fallback prompt in Arabic. Labels stay in English so one parser
/// handles both languages.
pub fn make_fallback_prompt_ar(drug: &str, original_name: &str) -> String {
    format!(
        r#"أنت خبير معلومات طبية. قدم معلومات مفصلة عن هذا الدواء:

الدواء: {drug}
الاسم الأصلي: {original_name}

يرجى تقديم المعلومات التالية بشكل واضح ومنظم:
1. نوع الدواء (أقراص، كريم، بخاخ، حقن، سائل، إلخ)
2. الاستخدام الطبي الأكثر شيوعاً
3. الجرعة المعتادة للبالغين حسب النوع
4. طريقة الاستخدام (كيفية تناول أو تطبيق الدواء)
5. مدة العلاج المعتادة
6. تحذيرات هامة

صيغة الإجابة (استخدم هذا التنسيق بالضبط):
DOSAGE_FORM: [نوع الدواء]
COMMON_USE: [الاستخدام الأكثر شيوعاً]
DOSAGE: [الجرعة المعتادة]
ADMINISTRATION: [طريقة الاستخدام]
DURATION: [مدة العلاج]
WARNINGS: [التحذيرات]

اجعل الإجابة موجزة ومفيدة (أقل من 300 كلمة)."#
    )
}

/// Build the fallback prompt for the request language.
pub fn make_fallback_prompt(drug: &str, original_name: &str, language: Language) -> String {
    match language {
        Language::Arabic => make_fallback_prompt_ar(drug, original_name),
        Language::English => make_fallback_prompt_en(drug, original_name),
    }
}

/// Prompt asking the model to validate a candidate dosage.
///
/// The answer is expected as `Yes|95|reason`.
pub fn make_verification_prompt(drug: &str, dosage: &str) -> String {
    format!(
        r#"You are a medical information validator.
Verify if this dosage information is correct:

Drug: {drug}
Dosage Info: {dosage}

Answer ONLY with:
1. Yes or No
2. Confidence score (0-100)
3. Brief reason (max 50 words)

Format: Yes|95|Reason here"#
    )
}

/// System context for interaction checks.
pub const INTERACTION_SYSTEM_PROMPT: &str = "You are a clinical pharmacist. Check interactions ONLY between different medications, NOT between ingredients within the same medication. Return JSON only.";

/// User prompt for an interaction check over a numbered medication list.
pub fn make_interaction_prompt(medication_list: &str, language: Language) -> String {
    let lang = language.display_name();
    format!(
        r#"Analyze drug interactions between these DIFFERENT medications:
{medication_list}

IMPORTANT:
- Check interactions ONLY between different medications (different brand names)
- Do NOT check interactions between ingredients within the same medication
- If ingredients are from same brand, they are in ONE medication

Return ONLY valid JSON (no markdown):
{{
  "has_interactions": true/false,
  "total_interactions": number,
  "interactions": [
    {{
      "severity": "severe/moderate/minor",
      "drug1": "first brand name",
      "drug2": "second brand name",
      "effect": "brief clinical effect in {lang}",
      "action": "recommendation in {lang}"
    }}
  ]
}}

Check interactions between DIFFERENT medications only. If no interactions found, return empty interactions array."#
    )
}

/// Single-text prompt for an interaction check, system context first.
///
/// The generative endpoint accepts one text field, so the system context is
/// inlined ahead of the request.
pub fn build_interaction_prompt(medication_list: &str, language: Language) -> String {
    let mut prompt = String::new();
    prompt.push_str(INTERACTION_SYSTEM_PROMPT);
    prompt.push_str("\n\n");
    prompt.push_str(&make_interaction_prompt(medication_list, language));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_prompt_lists_all_labels() {
        for language in [Language::English, Language::Arabic] {
            let prompt = make_fallback_prompt("paracetamol 500mg", "Panadol", language);
            for label in [
                "DOSAGE_FORM:",
                "COMMON_USE:",
                "DOSAGE:",
                "ADMINISTRATION:",
                "DURATION:",
                "WARNINGS:",
            ] {
                assert!(prompt.contains(label), "{label} missing for {language:?}");
            }
            assert!(prompt.contains("paracetamol 500mg"));
            assert!(prompt.contains("Panadol"));
        }
    }

    #[test]
    fn test_fallback_prompt_language() {
        let ar = make_fallback_prompt("paracetamol", "باراسيتامول", Language::Arabic);
        assert!(ar.contains("أنت خبير معلومات طبية"));

        let en = make_fallback_prompt("paracetamol", "paracetamol", Language::English);
        assert!(en.starts_with("You are a medical information expert"));
    }

    #[test]
    fn test_verification_prompt() {
        let prompt = make_verification_prompt("ibuprofen 200mg", "200-400mg every 6 hours");
        assert!(prompt.contains("ibuprofen 200mg"));
        assert!(prompt.contains("200-400mg every 6 hours"));
        assert!(prompt.contains("Yes|95|"));
    }

    #[test]
    fn test_interaction_prompt() {
        let prompt = build_interaction_prompt("1. Panadol (Active: paracetamol)\n2. Marevan", Language::Arabic);
        assert!(prompt.starts_with(INTERACTION_SYSTEM_PROMPT));
        assert!(prompt.contains("1. Panadol (Active: paracetamol)"));
        assert!(prompt.contains("brief clinical effect in Arabic"));
    }

    #[test]
    fn test_language_codes() {
        assert_eq!(Language::from_code("ar"), Language::Arabic);
        assert_eq!(Language::from_code("AR"), Language::Arabic);
        assert_eq!(Language::from_code("en"), Language::English);
        assert_eq!(Language::from_code("fr"), Language::English);
        assert_eq!(Language::Arabic.code(), "ar");
        assert_eq!(serde_json::to_string(&Language::Arabic).unwrap(), "\"ar\"");
    }
}
