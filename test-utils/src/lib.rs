//! # Test Utilities
//!
//! Shared test utilities for the mur core.
//!
//! Provides:
//! - Pattern builders
//! - A temp-home fixture wiring store, cache, and indexer together
//! - Provider doubles for failure-path tests
//! - Tracing setup so test runs surface the core's structured logs

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use mur_core::cache::{CacheOptions, MemoryCache};
use mur_core::cancel::CancellationToken;
use mur_core::config::EmbeddingConfig;
use mur_core::embeddings::{EmbeddingIndexer, EmbeddingProvider, HashEmbedder, IndexReport};
use mur_core::pattern::{InferredTag, Pattern};
use mur_core::progress::NoopProgress;
use mur_core::store::PatternStore;

/// Install a fmt subscriber routed to the test writer.
///
/// Honors `RUST_LOG`, defaulting to `debug` for the core so the
/// retrieval, indexing, and sync traces show up in captured test output.
/// Safe to call from every test; only the first call installs.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("mur_core=debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Create a minimal test pattern.
pub fn create_test_pattern(name: &str, content: &str) -> Pattern {
    Pattern::new(name, content)
}

/// Create a test pattern with confirmed tags.
pub fn create_tagged_pattern(name: &str, content: &str, tags: &[&str]) -> Pattern {
    let mut pattern = Pattern::new(name, content);
    for tag in tags {
        pattern.tags.confirmed.insert((*tag).to_string());
    }
    pattern
}

/// Create a test pattern with one inferred tag.
pub fn create_inferred_pattern(name: &str, content: &str, tag: &str, confidence: f64) -> Pattern {
    let mut pattern = Pattern::new(name, content);
    pattern.tags.inferred.push(InferredTag {
        tag: tag.to_string(),
        confidence,
    });
    pattern
}

/// Temporary `~/.mur`-shaped home wiring the core subsystems together.
pub struct TestHome {
    dir: TempDir,
}

impl TestHome {
    /// Create an empty home.
    ///
    /// # Panics
    ///
    /// Panics when the temp directory cannot be created; tests only.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp home"),
        }
    }

    /// Root of the home directory.
    #[must_use]
    pub fn root(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Primary patterns directory.
    #[must_use]
    pub fn patterns_dir(&self) -> PathBuf {
        self.dir.path().join("patterns")
    }

    /// A store over the primary patterns directory.
    #[must_use]
    pub fn store(&self) -> PatternStore {
        PatternStore::new(vec![self.patterns_dir()])
    }

    /// Embedding configuration pointing into this home.
    #[must_use]
    pub fn embedding_config(&self) -> EmbeddingConfig {
        let dir = self.dir.path().join("embeddings");
        EmbeddingConfig {
            provider: Some("hash".to_string()),
            cache_path: dir.join("embeddings.json"),
            expansion_path: dir.join("expanded_queries.json"),
            expand_queries: false,
            workers: 2,
        }
    }

    /// Cache options pointing into this home.
    #[must_use]
    pub fn cache_options(&self, lazy: bool) -> CacheOptions {
        CacheOptions {
            dirs: vec![self.patterns_dir()],
            embeddings_path: self.dir.path().join("embeddings").join("embeddings.json"),
            dimension: 0,
            lazy,
            disabled: false,
        }
    }

    /// Load a cache over this home.
    ///
    /// # Errors
    ///
    /// Propagates cache load failures.
    pub async fn cache(&self, lazy: bool) -> mur_core::Result<Arc<MemoryCache>> {
        Ok(Arc::new(MemoryCache::load(self.cache_options(lazy)).await?))
    }

    /// Index every stored pattern with the deterministic hash embedder.
    ///
    /// # Errors
    ///
    /// Propagates store and indexer failures.
    pub async fn index_all(&self) -> mur_core::Result<IndexReport> {
        let patterns = self.store().list().await?;
        let indexer =
            EmbeddingIndexer::new(Arc::new(HashEmbedder::default()), self.embedding_config());
        indexer
            .index_all(&patterns, &CancellationToken::new(), &NoopProgress)
            .await
    }
}

impl Default for TestHome {
    fn default() -> Self {
        Self::new()
    }
}

/// Embedding provider that always fails; exercises degradation paths.
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingProvider for FailingEmbedder {
    async fn embed_text(&self, _text: &str) -> mur_core::Result<Vec<f32>> {
        Err(mur_core::Error::Provider(
            "embedder deliberately unavailable".to_string(),
        ))
    }

    fn dimension(&self) -> usize {
        8
    }

    fn model_name(&self) -> &str {
        "failing-embedder"
    }
}
