//! Embedding provider trait and the closed provider registry

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::{Error, Result};

use super::similarity::normalize_vector;

/// Trait for embedding providers that convert text to vectors.
///
/// Concrete variants (cloud API, local inference daemon, hosted batch
/// endpoint) live outside the core and are selected by the registry key
/// carried in the resolved configuration.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts in batch.
    ///
    /// Default implementation calls `embed_text` per text; providers with
    /// a batch endpoint override this.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed_text(text).await?);
        }
        Ok(embeddings)
    }

    /// The fixed dimensionality of this provider's vectors.
    fn dimension(&self) -> usize;

    /// The model name or identifier.
    fn model_name(&self) -> &str;

    /// Prefix prepended to query embeddings only, never to index embeddings.
    ///
    /// Some instruction-tuned models need queries marked as such.
    fn query_prefix(&self) -> Option<&str> {
        None
    }

    /// Check if the provider is reachable and configured.
    async fn is_available(&self) -> bool {
        self.embed_text("probe").await.is_ok()
    }
}

/// Validate that an embedding has the expected dimensionality.
///
/// # Errors
///
/// Returns [`Error::Provider`] on mismatch.
pub fn validate_dimension(embedding: &[f32], expected: usize) -> Result<()> {
    if embedding.len() == expected {
        Ok(())
    } else {
        Err(Error::Provider(format!(
            "embedding dimension mismatch: got {}, expected {expected}",
            embedding.len()
        )))
    }
}

/// Deterministic token-bucket embedder used for tests and offline fallback.
///
/// Each whitespace token is hashed into a bucket; texts sharing tokens get
/// genuinely similar vectors, which keeps ranking behavior observable
/// without a network provider.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    /// Create an embedder with the given dimensionality.
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn bucket(&self, token: &str) -> usize {
        let digest = Sha256::digest(token.as_bytes());
        let mut raw = [0_u8; 8];
        raw.copy_from_slice(&digest[..8]);
        (u64::from_le_bytes(raw) % self.dimension as u64) as usize
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(64)
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let mut vector = vec![0.0_f32; self.dimension];
        for token in text.to_lowercase().split_whitespace() {
            let token = token.trim_matches(|c: char| !c.is_alphanumeric());
            if token.len() < 2 {
                continue;
            }
            vector[self.bucket(token)] += 1.0;
        }
        Ok(normalize_vector(vector))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "hash-embedder"
    }
}

/// Factory producing a configured provider instance.
pub type ProviderFactory = Arc<dyn Fn() -> Result<Arc<dyn EmbeddingProvider>> + Send + Sync>;

/// Closed, string-keyed registry of embedding providers.
///
/// The core does not enumerate provider names beyond this registry; the
/// configuration owner registers concrete variants at startup and the
/// configured key selects one.
#[derive(Default)]
pub struct ProviderRegistry {
    factories: HashMap<String, ProviderFactory>,
}

impl ProviderRegistry {
    /// Empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry pre-seeded with the built-in `hash` provider.
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("hash", || Ok(Arc::new(HashEmbedder::default()) as _));
        registry
    }

    /// Register a provider factory under `key`, replacing any previous one.
    pub fn register<F>(&mut self, key: &str, factory: F)
    where
        F: Fn() -> Result<Arc<dyn EmbeddingProvider>> + Send + Sync + 'static,
    {
        self.factories.insert(key.to_string(), Arc::new(factory));
    }

    /// Instantiate the provider registered under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Provider`] for an unknown key or a failed factory.
    pub fn create(&self, key: &str) -> Result<Arc<dyn EmbeddingProvider>> {
        match self.factories.get(key) {
            Some(factory) => factory(),
            None => Err(Error::Provider(format!(
                "no embedding provider registered under {key:?}"
            ))),
        }
    }

    /// Registered provider keys, sorted.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.factories.keys().cloned().collect();
        keys.sort();
        keys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hash_embedder_is_deterministic_and_normalized() {
        let embedder = HashEmbedder::default();
        let a = embedder.embed_text("handle errors in go").await.unwrap();
        let b = embedder.embed_text("handle errors in go").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);

        let magnitude = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((magnitude - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_shared_tokens_score_higher() {
        use super::super::similarity::cosine_similarity;

        let embedder = HashEmbedder::default();
        let query = embedder.embed_text("wrap errors with context").await.unwrap();
        let close = embedder
            .embed_text("always wrap errors with extra context")
            .await
            .unwrap();
        let far = embedder.embed_text("render html templates").await.unwrap();

        assert!(cosine_similarity(&query, &close) > cosine_similarity(&query, &far));
    }

    #[tokio::test]
    async fn test_registry_creates_registered_provider() {
        let mut registry = ProviderRegistry::new();
        registry.register("hash", || Ok(Arc::new(HashEmbedder::default()) as _));

        let provider = registry.create("hash").unwrap();
        assert_eq!(provider.model_name(), "hash-embedder");
        assert!(provider.is_available().await);

        assert!(matches!(
            registry.create("missing"),
            Err(Error::Provider(_))
        ));
    }
}
