#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_docs_in_private_items)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::redundant_closure_for_method_calls)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::float_cmp)]

//! # Mur Core
//!
//! Core of the mur learning layer: a content-addressed pattern store, a
//! hybrid keyword + vector retrieval engine, an in-process memory cache,
//! and a multi-target synchronizer that projects patterns into the on-disk
//! formats of integrated AI assistants.
//!
//! ## Core Concepts
//!
//! - **Patterns**: named, content-addressed records of reusable knowledge
//!   with tags, application conditions, and trust metadata
//! - **Embeddings**: per-pattern vectors keyed by content hash, so edits
//!   invalidate stale vectors by construction
//! - **Retrieval**: classifier and vector paths fused by reciprocal rank,
//!   returning scored matches that explain themselves
//! - **Sync**: idempotent fan-out of the active set onto per-tool targets
//! - **Audit**: append-only record of injections, keyed by prompt hash
//!
//! ## Module Organization
//!
//! ### Primary APIs
//! - [`store`]: authoritative YAML persistence of patterns
//! - [`cache`]: in-process snapshot cache with an inverted tag index
//! - [`retrieval`]: query classification, scoring, and rank fusion
//! - [`sync`]: target adapters and the parallel synchronizer
//!
//! ### Support Modules
//! - [`pattern`]: the pattern data model and its integrity rules
//! - [`embeddings`]: provider trait, index text, vector cache, indexer
//! - [`security`]: prompt-injection scanning at write time
//! - [`audit`] / [`analytics`]: observability
//! - [`community`]: TTL and size-capped cache of fetched patterns
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use mur_core::cache::{CacheOptions, MemoryCache};
//! use mur_core::config::CoreConfig;
//! use mur_core::retrieval::{ProjectContext, RetrievalEngine};
//!
//! #[tokio::main]
//! async fn main() -> mur_core::Result<()> {
//!     let config = CoreConfig::default();
//!
//!     let cache = Arc::new(
//!         MemoryCache::load(CacheOptions {
//!             dirs: config.pattern_dirs.clone(),
//!             embeddings_path: config.embeddings.cache_path.clone(),
//!             dimension: 0,
//!             lazy: true,
//!             disabled: false,
//!         })
//!         .await?,
//!     );
//!
//!     let engine = RetrievalEngine::new(Arc::clone(&cache), config.retrieval.clone());
//!     let context = ProjectContext::detect(std::path::Path::new("."));
//!     let matches = engine
//!         .retrieve("how do I handle errors in a go service?", &context)
//!         .await?;
//!
//!     for m in &matches {
//!         println!("{} {:.2} {:?}", m.pattern.name, m.score, m.reasons);
//!     }
//!     Ok(())
//! }
//! ```

pub mod analytics;
pub mod audit;
pub mod cache;
pub mod cancel;
pub mod community;
pub mod config;
pub mod constants;
pub mod embeddings;
pub mod error;
pub mod pattern;
pub mod progress;
pub mod retrieval;
pub mod security;
pub mod store;
pub mod sync;

// Re-export commonly used types
pub use analytics::{AnalyticsStore, PatternSummary, Rating, UsageEvent};
pub use audit::{AuditAction, AuditEntry, AuditLogger, hash_prompt};
pub use cache::{CacheOptions, CacheStats, MemoryCache};
pub use cancel::CancellationToken;
pub use community::CommunityCache;
pub use config::{AuditConfig, CoreConfig, EmbeddingConfig, RetrievalConfig};
pub use embeddings::{
    EmbeddingCache, EmbeddingIndexer, EmbeddingProvider, EmbeddingRecord, HashEmbedder,
    IndexReport, ProviderRegistry, QueryExpander,
};
pub use error::{Error, Result};
pub use pattern::{
    Applies, DuplicateFlag, InferredTag, Learning, Lifecycle, LintIssue, Pattern, PatternStatus,
    RiskLevel, Security, Tags, TrustLevel, flag_duplicates,
};
pub use progress::{NoopProgress, ProgressSink, TracingProgress};
pub use retrieval::{DomainSignal, ProjectContext, RetrievalEngine, RetrievalMatch};
pub use security::{DenyAction, DenyRule, PromptScanner, ScanOutcome};
pub use store::{InvalidationQueue, PatternStore};
pub use sync::{
    CanonicalEvent, PerPatternTarget, SettingsTarget, SingleFileTarget, SyncOutcome, SyncReport,
    SyncTarget, Synchronizer, TargetCapabilities,
};
