//! Resolver configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sources::{DAILYMED_BASE_URL, GEMINI_ENDPOINT, GEMINI_MODEL, OPENFDA_BASE_URL, RXNORM_BASE_URL};

/// Configuration errors.
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{var} must be a whole number of seconds, got {value:?}")]
    InvalidNumber { var: String, value: String },

    #[error("invalid configuration for {field}: {reason}")]
    Invalid { field: String, reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Largest TTL chrono can represent, in seconds.
const MAX_TTL_SECS: u64 = (i64::MAX / 1000) as u64;

/// Everything needed to wire a [`DosageResolver`](crate::DosageResolver) with
/// the default HTTP adapters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DosageConfig {
    pub openfda_base_url: String,
    pub rxnorm_base_url: String,
    pub dailymed_base_url: String,
    pub llm_endpoint: String,
    pub llm_model: String,
    /// Without a key there is no AI fallback and no verification.
    pub llm_api_key: Option<String>,
    pub authority_timeout_secs: u64,
    pub fallback_timeout_secs: u64,
    pub verification_timeout_secs: u64,
    pub cache_enabled: bool,
    pub cache_ttl_secs: u64,
    /// SQLite file for the response cache; in-memory when unset.
    pub cache_path: Option<PathBuf>,
}

impl Default for DosageConfig {
    fn default() -> Self {
        Self {
            openfda_base_url: OPENFDA_BASE_URL.to_string(),
            rxnorm_base_url: RXNORM_BASE_URL.to_string(),
            dailymed_base_url: DAILYMED_BASE_URL.to_string(),
            llm_endpoint: GEMINI_ENDPOINT.to_string(),
            llm_model: GEMINI_MODEL.to_string(),
            llm_api_key: None,
            authority_timeout_secs: 10,
            fallback_timeout_secs: 15,
            verification_timeout_secs: 15,
            cache_enabled: true,
            cache_ttl_secs: 24 * 60 * 60,
            cache_path: None,
        }
    }
}

impl DosageConfig {
    /// Defaults overlaid with `DOSEWISE_*` environment variables.
    ///
    /// The model key is read from `DOSEWISE_LLM_API_KEY`, then `EMERGENT_LLM_KEY`.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Like [`from_env`](Self::from_env) with an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let text = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let seconds = |var: &str| -> ConfigResult<Option<u64>> {
            text(var)
                .map(|value| {
                    value.parse::<u64>().map_err(|_| ConfigError::InvalidNumber {
                        var: var.to_string(),
                        value,
                    })
                })
                .transpose()
        };

        if let Some(val) = text("DOSEWISE_OPENFDA_URL") {
            config.openfda_base_url = val;
        }
        if let Some(val) = text("DOSEWISE_RXNORM_URL") {
            config.rxnorm_base_url = val;
        }
        if let Some(val) = text("DOSEWISE_DAILYMED_URL") {
            config.dailymed_base_url = val;
        }
        if let Some(val) = text("DOSEWISE_LLM_ENDPOINT") {
            config.llm_endpoint = val;
        }
        if let Some(val) = text("DOSEWISE_LLM_MODEL") {
            config.llm_model = val;
        }
        config.llm_api_key = text("DOSEWISE_LLM_API_KEY").or_else(|| text("EMERGENT_LLM_KEY"));

        if let Some(secs) = seconds("DOSEWISE_AUTHORITY_TIMEOUT_SECS")? {
            config.authority_timeout_secs = secs;
        }
        if let Some(secs) = seconds("DOSEWISE_FALLBACK_TIMEOUT_SECS")? {
            config.fallback_timeout_secs = secs;
        }
        if let Some(secs) = seconds("DOSEWISE_VERIFICATION_TIMEOUT_SECS")? {
            config.verification_timeout_secs = secs;
        }
        if let Some(secs) = seconds("DOSEWISE_CACHE_TTL_SECS")? {
            config.cache_ttl_secs = secs;
        }
        if let Some(val) = text("DOSEWISE_CACHE_ENABLED") {
            config.cache_enabled = matches!(val.to_lowercase().as_str(), "true" | "1" | "yes" | "on");
        }
        if let Some(val) = text("DOSEWISE_CACHE_PATH") {
            config.cache_path = Some(PathBuf::from(val));
        }

        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make every call time out immediately.
    pub fn validate(&self) -> ConfigResult<()> {
        let timeouts = [
            ("authority_timeout_secs", self.authority_timeout_secs),
            ("fallback_timeout_secs", self.fallback_timeout_secs),
            ("verification_timeout_secs", self.verification_timeout_secs),
        ];
        for (field, secs) in timeouts {
            if secs == 0 {
                return Err(ConfigError::Invalid {
                    field: field.into(),
                    reason: "must be greater than 0".into(),
                });
            }
        }
        Ok(())
    }

    /// The configured model key, if non-blank.
    pub fn api_key(&self) -> Option<&str> {
        self.llm_api_key.as_deref().filter(|key| !key.trim().is_empty())
    }

    pub fn authority_timeout(&self) -> Duration {
        Duration::from_secs(self.authority_timeout_secs)
    }

    pub fn fallback_timeout(&self) -> Duration {
        Duration::from_secs(self.fallback_timeout_secs)
    }

    pub fn verification_timeout(&self) -> Duration {
        Duration::from_secs(self.verification_timeout_secs)
    }

    pub fn cache_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.cache_ttl_secs.min(MAX_TTL_SECS) as i64)
    }
}
