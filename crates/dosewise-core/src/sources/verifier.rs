//! AI cross-check of an authority-sourced dosage.

use std::sync::Arc;

use dosewise_llm::{make_verification_prompt, parse_verification_answer};
use tracing::{debug, warn};

use super::LanguageModel;
use crate::models::{describe_ingredients, AiVerification, Ingredient};

/// Asks the model whether a dosage looks right. Advisory only.
pub struct AiVerifier {
    model: Arc<dyn LanguageModel>,
}

impl AiVerifier {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Verify `candidate_dosage` for the ingredients.
    ///
    /// Never fails: transport or parse problems yield [`AiVerification::failed`].
    pub async fn verify(&self, ingredients: &[Ingredient], candidate_dosage: &str) -> AiVerification {
        let prompt = make_verification_prompt(&describe_ingredients(ingredients), candidate_dosage);

        let text = match self.model.complete(&prompt).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "verification call failed");
                return AiVerification::failed();
            }
        };

        match parse_verification_answer(&text) {
            Ok(answer) => {
                debug!(verified = answer.verified, confidence = answer.confidence, "verification answer");
                AiVerification {
                    verified: answer.verified,
                    confidence: answer.confidence,
                    reason: answer.reason,
                }
            }
            Err(e) => {
                warn!(error = %e, "unreadable verification answer");
                AiVerification::failed()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{FetchResult, SourceError};
    use async_trait::async_trait;
    use dosewise_llm::Language;
    use std::sync::Mutex;

    /// Model returning a fixed reply and recording prompts.
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
    }

    #[async_trait]
    impl LanguageModel for ScriptedModel {
        fn name(&self) -> &str {
            "Scripted"
        }

        async fn complete(&self, prompt: &str) -> FetchResult<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone().ok_or(SourceError::Status {
                status: 503,
                body: "unavailable".into(),
            })
        }
    }

    fn ingredients() -> Vec<Ingredient> {
        vec![Ingredient::new("ibuprofen", "Ibuprofen 400mg", Language::English).with_strength(400.0, "mg")]
    }

    #[tokio::test]
    async fn test_verified_answer() {
        let model = ScriptedModel::replying(Some("Yes|90|Matches label"));
        let verifier = AiVerifier::new(model.clone());

        let outcome = verifier.verify(&ingredients(), "400mg every 8 hours").await;
        assert!(outcome.verified);
        assert_eq!(outcome.confidence, 90);
        assert_eq!(outcome.reason, "Matches label");

        let prompts = model.prompts.lock().unwrap();
        assert!(prompts[0].contains("ibuprofen 400mg"));
        assert!(prompts[0].contains("400mg every 8 hours"));
    }

    #[tokio::test]
    async fn test_transport_failure() {
        let verifier = AiVerifier::new(ScriptedModel::replying(None));
        assert_eq!(verifier.verify(&ingredients(), "x").await, AiVerification::failed());
    }

    #[tokio::test]
    async fn test_unparseable_answer() {
        let verifier = AiVerifier::new(ScriptedModel::replying(Some("Looks fine to me")));
        let outcome = verifier.verify(&ingredients(), "x").await;
        assert!(!outcome.verified);
        assert_eq!(outcome.confidence, 0);
        assert_eq!(outcome.reason, "Verification failed");
    }
}
