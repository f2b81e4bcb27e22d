//! Dosewise Core Library
//!
//! Multi-source dosage resolution for free-text drug names in English or Arabic.
//!
//! # Architecture
//!
//! ```text
//! "Paracetamol 500mg + Caffeine 65mg" / "باراسيتامول 500 مجم"
//!                         │
//!                    NameParser ─────────────► [ResponseCache] ── hit ──► result
//!                         │ miss
//!         ┌───────────────┼───────────────┐
//!         ▼               ▼               ▼
//!      OpenFDA         RxNorm         DailyMed        (concurrent, each time-bounded)
//!         └───────────────┼───────────────┘
//!                         │ none found
//!                         ▼
//!                   AI fallback                      (sequential, low confidence)
//!                         │
//!                 priority pick + tier
//!                         │
//!                   AI verification                  (advisory, authority answers only)
//!                         │
//!                  ResolutionResult ──► cache
//! ```
//!
//! # Core Principle
//!
//! **Nothing fails outward.** A dead source loses its slot, an unreadable AI
//! answer degrades to raw text, and a drug nobody knows is `found = false`.
//!
//! # Modules
//!
//! - [`models`]: Domain types (Ingredient, SourceResult, ResolutionResult)
//! - [`resolver`]: Name parser, selection rules and the resolution pipeline
//! - [`sources`]: Authority HTTP adapters, AI fallback and verifier
//! - [`cache`]: TTL response cache with memory and SQLite backends
//! - [`interactions`]: Drug-interaction check over a medication list
//! - [`config`]: Environment-driven configuration

pub mod cache;
pub mod config;
pub mod interactions;
pub mod models;
pub mod resolver;
pub mod sources;

// Re-export commonly used types
pub use cache::{CacheBackend, MemoryCache, ResponseCache, SqliteCache};
pub use config::{ConfigError, DosageConfig};
pub use dosewise_llm::Language;
pub use interactions::{InteractionCheck, InteractionChecker, MedicationRef};
pub use models::{AiVerification, Confidence, Ingredient, ResolutionResult, SourceResult};
pub use resolver::{DosageResolver, DosageResolverBuilder, NameParser, StageTimeouts};
pub use sources::{AiFallbackSource, AiVerifier, DosageSource, GeminiClient, LanguageModel};
