//! Dosage resolution pipeline.
//!
//! Pipeline: Parse → Cache lookup → Authorities (concurrent) → AI fallback →
//! Selection → Verification → Cache write

mod parser;
mod selection;

pub use parser::*;
pub use selection::*;

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use thiserror::Error;
use tokio::time::timeout;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::cache::{cache_key, CacheBackend, CacheError, MemoryCache, ResponseCache, SqliteCache};
use crate::config::{ConfigError, DosageConfig};
use crate::models::{
    ingredient_signature, AiVerification, Ingredient, ResolutionResult, SourceResult, NOT_FOUND_MESSAGE,
    UNPARSED_MESSAGE,
};
use crate::sources::{
    settle, AiFallbackSource, AiVerifier, DailyMedSource, DosageSource, GeminiClient, LanguageModel, OpenFdaSource,
    RxNormSource, SourceError,
};

/// Cache namespace for dosage answers.
pub const DOSAGE_CACHE_NAMESPACE: &str = "dosage";

/// Resolver construction errors.
#[derive(Error, Debug)]
pub enum ResolverError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

pub type ResolverResult<T> = Result<T, ResolverError>;

/// Upper bounds for each external stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageTimeouts {
    /// Per authority source
    pub authority: Duration,
    pub fallback: Duration,
    pub verification: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            authority: Duration::from_secs(10),
            fallback: Duration::from_secs(15),
            verification: Duration::from_secs(15),
        }
    }
}

/// Where a resolution currently is. Used for tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionStage {
    Init,
    ParsingIngredients,
    QueryingAuthorities,
    AuthoritiesFound,
    AuthoritiesExhausted,
    QueryingAiFallback,
    Resolved,
    Unresolved,
}

impl ResolutionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolutionStage::Init => "init",
            ResolutionStage::ParsingIngredients => "parsing_ingredients",
            ResolutionStage::QueryingAuthorities => "querying_authorities",
            ResolutionStage::AuthoritiesFound => "authorities_found",
            ResolutionStage::AuthoritiesExhausted => "authorities_exhausted",
            ResolutionStage::QueryingAiFallback => "querying_ai_fallback",
            ResolutionStage::Resolved => "resolved",
            ResolutionStage::Unresolved => "unresolved",
        }
    }

    fn enter(self) -> Self {
        debug!(stage = self.as_str(), "resolution stage");
        self
    }
}

/// Resolves free-text drug names to dosage information.
///
/// Authorities are queried together and awaited together; each is bounded by
/// its own timeout so a slow source only loses its own slot. The AI fallback
/// runs only when no authority found the drug.
pub struct DosageResolver {
    parser: NameParser,
    authorities: Vec<Arc<dyn DosageSource>>,
    fallback: Option<Arc<dyn DosageSource>>,
    verifier: Option<AiVerifier>,
    cache: Option<ResponseCache>,
    timeouts: StageTimeouts,
}

impl DosageResolver {
    pub fn builder() -> DosageResolverBuilder {
        DosageResolverBuilder::default()
    }

    /// Wire the default HTTP adapters.
    ///
    /// Authorities in priority order: OpenFDA, RxNorm, DailyMed. The AI
    /// fallback and verifier are only attached when a model key is configured.
    pub fn from_config(config: &DosageConfig) -> ResolverResult<Self> {
        config.validate()?;

        let authority_timeout = config.authority_timeout();
        let mut builder = Self::builder()
            .authority(Arc::new(OpenFdaSource::new(&config.openfda_base_url, authority_timeout)))
            .authority(Arc::new(RxNormSource::new(&config.rxnorm_base_url, authority_timeout)))
            .authority(Arc::new(DailyMedSource::new(&config.dailymed_base_url, authority_timeout)))
            .timeouts(StageTimeouts {
                authority: authority_timeout,
                fallback: config.fallback_timeout(),
                verification: config.verification_timeout(),
            });

        if let Some(key) = config.api_key() {
            let fallback_model: Arc<dyn LanguageModel> = Arc::new(GeminiClient::new(
                &config.llm_endpoint,
                &config.llm_model,
                key,
                config.fallback_timeout(),
            ));
            let verification_model: Arc<dyn LanguageModel> = Arc::new(GeminiClient::new(
                &config.llm_endpoint,
                &config.llm_model,
                key,
                config.verification_timeout(),
            ));
            builder = builder
                .fallback(Arc::new(AiFallbackSource::new(fallback_model)))
                .verifier(AiVerifier::new(verification_model));
        } else {
            info!("no model API key configured, AI fallback and verification disabled");
        }

        if config.cache_enabled {
            let backend: Arc<dyn CacheBackend> = match &config.cache_path {
                Some(path) => Arc::new(SqliteCache::open(path)?),
                None => Arc::new(MemoryCache::new()),
            };
            builder = builder.cache(ResponseCache::new(backend, config.cache_ttl()));
        }

        Ok(builder.build())
    }

    pub fn parser(&self) -> &NameParser {
        &self.parser
    }

    pub fn cache(&self) -> Option<&ResponseCache> {
        self.cache.as_ref()
    }

    pub fn timeouts(&self) -> StageTimeouts {
        self.timeouts
    }

    /// Authority names in priority order.
    pub fn authority_names(&self) -> Vec<&str> {
        self.authorities.iter().map(|source| source.name()).collect()
    }

    pub fn has_fallback(&self) -> bool {
        self.fallback.is_some()
    }

    pub fn has_verifier(&self) -> bool {
        self.verifier.is_some()
    }

    /// Resolve a drug name. Never fails: every problem ends as `found = false`
    /// or as a missing source.
    pub async fn resolve_dosage(&self, drug_name: &str, use_ai_verification: bool) -> ResolutionResult {
        let request_id = Uuid::new_v4();
        let span = info_span!("resolve_dosage", %request_id, drug = %drug_name);
        self.run(drug_name, use_ai_verification).instrument(span).await
    }

    async fn run(&self, drug_name: &str, use_ai_verification: bool) -> ResolutionResult {
        ResolutionStage::Init.enter();

        ResolutionStage::ParsingIngredients.enter();
        let ingredients = self.parser.parse(drug_name);
        let Some(primary) = ingredients.first() else {
            ResolutionStage::Unresolved.enter();
            return ResolutionResult::unresolved(Vec::new(), detect_language(drug_name), UNPARSED_MESSAGE);
        };
        let language = primary.language;
        let primary_name = primary.name.clone();
        debug!(count = ingredients.len(), signature = %ingredient_signature(&ingredients), "parsed ingredients");

        let key = cache_key(DOSAGE_CACHE_NAMESPACE, &ingredient_signature(&ingredients));
        let cached = match &self.cache {
            Some(cache) => cache.get::<ResolutionResult>(&key).await,
            None => None,
        };
        if let Some(cached) = cached {
            info!(sources = ?cached.sources, "served from cache");
            return cached.localized_for(ingredients, language);
        }

        let mut selection = self.query_authorities(&ingredients).await;
        flag_name_mismatches(&primary_name, selection.members());

        if selection.is_empty() {
            ResolutionStage::AuthoritiesExhausted.enter();
            if let Some(result) = self.query_fallback(&ingredients).await {
                selection = Selection::from_fallback(result);
            }
        } else {
            ResolutionStage::AuthoritiesFound.enter();
        }

        let (Some(best), Some(tier)) = (selection.best(), selection.tier()) else {
            ResolutionStage::Unresolved.enter();
            info!("no source found the drug");
            return ResolutionResult::unresolved(ingredients, language, NOT_FOUND_MESSAGE);
        };

        let source_dosage = best.dosage.clone();
        let mut result = ResolutionResult::resolved(
            ingredients,
            language,
            best,
            selection.source_names(),
            tier,
            selection.is_ai_sourced(),
        );

        if use_ai_verification && !selection.is_ai_sourced() {
            match (&self.verifier, source_dosage) {
                (Some(verifier), Some(candidate)) => {
                    let verification = self.verify(verifier, &result.ingredients, &candidate).await;
                    result = result.with_verification(verification);
                }
                (Some(_), None) => debug!("winning source carries no dosage, skipping verification"),
                (None, _) => {}
            }
        }

        ResolutionStage::Resolved.enter();
        info!(
            sources = ?result.sources,
            tier = tier.as_str(),
            language = language.code(),
            "resolved dosage"
        );

        if let Some(cache) = &self.cache {
            cache.put(&key, &result).await;
        }
        result
    }

    async fn query_authorities(&self, ingredients: &[Ingredient]) -> Selection {
        ResolutionStage::QueryingAuthorities.enter();
        let limit = self.timeouts.authority;
        let slots = join_all(
            self.authorities
                .iter()
                .map(|source| query_bounded(source.as_ref(), ingredients, limit)),
        )
        .await;

        let selection = Selection::from_authorities(slots);
        debug!(found = selection.len(), queried = self.authorities.len(), "authorities answered");
        selection
    }

    async fn query_fallback(&self, ingredients: &[Ingredient]) -> Option<SourceResult> {
        let fallback = self.fallback.as_ref()?;
        ResolutionStage::QueryingAiFallback.enter();
        query_bounded(fallback.as_ref(), ingredients, self.timeouts.fallback)
            .await
            .filter(|result| result.found)
    }

    async fn verify(&self, verifier: &AiVerifier, ingredients: &[Ingredient], candidate: &str) -> AiVerification {
        let limit = self.timeouts.verification;
        match timeout(limit, verifier.verify(ingredients, candidate)).await {
            Ok(verification) => verification,
            Err(_) => {
                warn!(timeout_ms = limit.as_millis() as u64, "verification timed out");
                AiVerification::failed()
            }
        }
    }
}

/// Query one source, treating a timeout as "not available".
async fn query_bounded(source: &dyn DosageSource, ingredients: &[Ingredient], limit: Duration) -> Option<SourceResult> {
    match timeout(limit, source.query(ingredients)).await {
        Ok(result) => result,
        Err(_) => settle(source.name(), Err(SourceError::Timeout(limit))),
    }
}

/// Builder for [`DosageResolver`].
#[derive(Default)]
pub struct DosageResolverBuilder {
    parser: Option<NameParser>,
    authorities: Vec<Arc<dyn DosageSource>>,
    fallback: Option<Arc<dyn DosageSource>>,
    verifier: Option<AiVerifier>,
    cache: Option<ResponseCache>,
    timeouts: StageTimeouts,
}

impl DosageResolverBuilder {
    pub fn parser(mut self, parser: NameParser) -> Self {
        self.parser = Some(parser);
        self
    }

    /// Append an authority. Call order is priority order.
    pub fn authority(mut self, source: Arc<dyn DosageSource>) -> Self {
        self.authorities.push(source);
        self
    }

    pub fn fallback(mut self, source: Arc<dyn DosageSource>) -> Self {
        self.fallback = Some(source);
        self
    }

    pub fn verifier(mut self, verifier: AiVerifier) -> Self {
        self.verifier = Some(verifier);
        self
    }

    pub fn cache(mut self, cache: ResponseCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn timeouts(mut self, timeouts: StageTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn build(self) -> DosageResolver {
        DosageResolver {
            parser: self.parser.unwrap_or_default(),
            authorities: self.authorities,
            fallback: self.fallback,
            verifier: self.verifier,
            cache: self.cache,
            timeouts: self.timeouts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{DAILYMED_SOURCE, OPENFDA_SOURCE, RXNORM_SOURCE};

    #[test]
    fn test_from_config_without_key() {
        let config = DosageConfig {
            cache_enabled: false,
            ..DosageConfig::default()
        };
        let resolver = DosageResolver::from_config(&config).unwrap();

        assert_eq!(resolver.authority_names(), vec![OPENFDA_SOURCE, RXNORM_SOURCE, DAILYMED_SOURCE]);
        assert!(!resolver.has_fallback());
        assert!(!resolver.has_verifier());
        assert!(resolver.cache().is_none());
        assert_eq!(resolver.timeouts(), StageTimeouts::default());
    }

    #[test]
    fn test_from_config_with_key_and_sqlite_cache() {
        let dir = tempfile::tempdir().unwrap();
        let config = DosageConfig {
            llm_api_key: Some("test-key".into()),
            cache_path: Some(dir.path().join("cache.db")),
            ..DosageConfig::default()
        };
        let resolver = DosageResolver::from_config(&config).unwrap();

        assert!(resolver.has_fallback());
        assert!(resolver.has_verifier());
        assert_eq!(resolver.cache().unwrap().backend().name(), "sqlite");
    }

    #[test]
    fn test_from_config_rejects_zero_timeout() {
        let config = DosageConfig {
            authority_timeout_secs: 0,
            ..DosageConfig::default()
        };
        assert!(matches!(
            DosageResolver::from_config(&config),
            Err(ResolverError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_blank_input_is_unparsed() {
        let resolver = DosageResolver::builder().build();
        let result = resolver.resolve_dosage("   ", true).await;

        assert!(!result.found);
        assert!(result.ingredients.is_empty());
        assert_eq!(result.message.as_deref(), Some(UNPARSED_MESSAGE));
    }

    #[tokio::test]
    async fn test_no_sources_is_unresolved() {
        let resolver = DosageResolver::builder().build();
        let result = resolver.resolve_dosage("Paracetamol 500mg", true).await;

        assert!(!result.found);
        assert_eq!(result.ingredients.len(), 1);
        assert_eq!(result.message.as_deref(), Some(NOT_FOUND_MESSAGE));
        assert!(result.confidence_tier.is_none());
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(ResolutionStage::QueryingAiFallback.as_str(), "querying_ai_fallback");
        assert_eq!(ResolutionStage::Unresolved.enter(), ResolutionStage::Unresolved);
    }
}
