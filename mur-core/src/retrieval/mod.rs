//! Hybrid retrieval engine
//!
//! Given a user query and optional project context, returns the top-K
//! patterns with scores and per-match reasons. The classifier path scores
//! every cached pattern against the query's classified domains; when an
//! embedder is configured the vector path runs in parallel and the two
//! candidate lists merge by reciprocal rank fusion. An embedder failure
//! degrades to keyword-only ranking with a warning, never an error.
//!
//! The engine is stateless per call; it holds references to the cache
//! only and never mutates shared state.

use std::collections::BTreeSet;
use std::collections::HashMap;
use std::sync::Arc;

use tokio::time::timeout;
use tracing::{debug, warn};

use crate::Result;
use crate::cache::MemoryCache;
use crate::config::RetrievalConfig;
use crate::constants::EMBED_TIMEOUT;
use crate::embeddings::{EmbeddingProvider, apply_query_prefix, build_query_text};
use crate::pattern::Pattern;

pub mod aliases;
pub mod classify;
pub mod context;
pub mod fusion;
pub mod scoring;

pub use classify::{DomainSignal, classify as classify_query};
pub use context::ProjectContext;
pub use scoring::{PatternScore, score_pattern};

/// One retrieval result.
#[derive(Debug, Clone)]
pub struct RetrievalMatch {
    /// The matched pattern, a value copy
    pub pattern: Pattern,
    /// Final score in [0, 1]
    pub score: f64,
    /// Contributing signals, e.g. `domain:debugging`, `semantic:0.72`
    pub reasons: Vec<String>,
    /// Tags that matched a classified domain
    pub matched_domains: BTreeSet<String>,
}

/// Stateless retrieval engine over the memory cache.
pub struct RetrievalEngine {
    cache: Arc<MemoryCache>,
    embedder: Option<Arc<dyn EmbeddingProvider>>,
    config: RetrievalConfig,
}

impl RetrievalEngine {
    /// Create an engine without a semantic path.
    #[must_use]
    pub fn new(cache: Arc<MemoryCache>, config: RetrievalConfig) -> Self {
        Self {
            cache,
            embedder: None,
            config,
        }
    }

    /// Attach an embedding provider for the semantic path.
    #[must_use]
    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Retrieve the top-K matches for a query in its project context.
    ///
    /// # Errors
    ///
    /// Propagates cache errors only; classifier and embedder failures
    /// degrade and log instead.
    pub async fn retrieve(
        &self,
        query: &str,
        context: &ProjectContext,
    ) -> Result<Vec<RetrievalMatch>> {
        let domains = classify::classify(query, context);
        debug!(
            query,
            domains = domains.len(),
            "retrieval starting"
        );

        let eligible: Vec<Pattern> = self
            .cache
            .all()
            .into_iter()
            .filter(|p| p.is_active() || self.config.include_inactive)
            .collect();

        // The classifier path is pure computation; the vector path embeds
        // the query over the network. Run them concurrently and join.
        let (keyword_list, vector_list) = tokio::join!(
            async {
                let mut scored: Vec<(String, PatternScore)> = eligible
                    .iter()
                    .map(|p| (p.id.clone(), score_pattern(p, query, context, &domains)))
                    .filter(|(_, s)| s.score >= self.config.min_score)
                    .collect();
                scored.sort_by(|a, b| {
                    // Raw sums order candidates whose clamped scores tie.
                    b.1.raw
                        .partial_cmp(&a.1.raw)
                        .unwrap_or(std::cmp::Ordering::Equal)
                        .then_with(|| a.0.cmp(&b.0))
                });
                scored
            },
            self.semantic_candidates(query, &eligible)
        );

        let mut matches = self.fuse(&eligible, keyword_list, vector_list);
        matches.truncate(self.config.limit);
        Ok(matches)
    }

    /// Vector-path candidates, or `None` when the path is unavailable.
    ///
    /// Every failure mode degrades to keyword-only ranking.
    async fn semantic_candidates(
        &self,
        query: &str,
        eligible: &[Pattern],
    ) -> Option<Vec<(String, f32)>> {
        let embedder = self.embedder.as_ref()?;
        let text = apply_query_prefix(embedder.query_prefix(), &build_query_text(query));

        let vector = match timeout(EMBED_TIMEOUT, embedder.embed_text(&text)).await {
            Ok(Ok(vector)) => vector,
            Ok(Err(e)) => {
                warn!(error = %e, "query embedding failed, keyword-only ranking");
                return None;
            }
            Err(_) => {
                warn!("query embedding timed out, keyword-only ranking");
                return None;
            }
        };

        let fetch = self.config.limit.max(1) * 4;
        match self.cache.search(&vector, fetch).await {
            Ok(hits) => Some(
                hits.into_iter()
                    .filter(|(p, score)| {
                        *score >= self.config.min_vector_score
                            && eligible.iter().any(|e| e.id == p.id)
                    })
                    .map(|(p, score)| (p.id, score))
                    .collect(),
            ),
            Err(e) => {
                warn!(error = %e, "vector search failed, keyword-only ranking");
                None
            }
        }
    }

    /// Merge the candidate lists into final matches.
    ///
    /// Without vector candidates the keyword order stands. With both
    /// lists, reciprocal rank fusion decides the order; the reported score
    /// is the best individual signal, so thresholds keep their meaning.
    fn fuse(
        &self,
        eligible: &[Pattern],
        keyword_list: Vec<(String, PatternScore)>,
        vector_list: Option<Vec<(String, f32)>>,
    ) -> Vec<RetrievalMatch> {
        let by_id: HashMap<&str, &Pattern> =
            eligible.iter().map(|p| (p.id.as_str(), p)).collect();
        let mut keyword: HashMap<String, PatternScore> = keyword_list.iter().cloned().collect();

        let Some(vector_list) = vector_list.filter(|v| !v.is_empty()) else {
            return keyword_list
                .into_iter()
                .filter_map(|(id, score)| {
                    Some(RetrievalMatch {
                        pattern: (*by_id.get(id.as_str())?).clone(),
                        score: score.score,
                        reasons: score.reasons,
                        matched_domains: score.matched_domains,
                    })
                })
                .collect();
        };

        let vector_scores: HashMap<String, f32> = vector_list.iter().cloned().collect();
        let ranked_keyword: Vec<(String, f64)> = keyword_list
            .iter()
            .map(|(id, s)| (id.clone(), s.raw))
            .collect();
        let ranked_vector: Vec<(String, f64)> = vector_list
            .iter()
            .map(|(id, s)| (id.clone(), f64::from(*s)))
            .collect();

        fusion::reciprocal_rank_fusion(&[ranked_keyword, ranked_vector])
            .into_iter()
            .filter_map(|candidate| {
                let pattern = (*by_id.get(candidate.id.as_str())?).clone();
                let mut score = 0.0_f64;
                let mut reasons = Vec::new();
                let mut matched_domains = BTreeSet::new();

                if let Some(ks) = keyword.remove(&candidate.id) {
                    score = ks.score;
                    reasons = ks.reasons;
                    matched_domains = ks.matched_domains;
                }
                if let Some(sim) = vector_scores.get(&candidate.id) {
                    score = score.max(f64::from(*sim));
                    reasons.push(format!("semantic:{sim:.2}"));
                }

                if score < self.config.min_score {
                    return None;
                }
                Some(RetrievalMatch {
                    pattern,
                    score: score.clamp(0.0, 1.0),
                    reasons,
                    matched_domains,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheOptions;
    use crate::embeddings::{EmbeddingIndexer, HashEmbedder};
    use crate::pattern::PatternStatus;
    use crate::progress::NoopProgress;
    use crate::store::PatternStore;
    use async_trait::async_trait;

    async fn seeded_cache(index: bool) -> (tempfile::TempDir, Arc<MemoryCache>) {
        let home = tempfile::tempdir().unwrap();
        let patterns_dir = home.path().join("patterns");
        let store = PatternStore::new(vec![patterns_dir.clone()]);

        let mut a = Pattern::new(
            "go-errors",
            "Handle errors in Go by wrapping with context.",
        );
        a.tags.confirmed.insert("go".to_string());
        a.tags.confirmed.insert("error-handling".to_string());
        store.create(a).await.unwrap();

        let mut b = Pattern::new("python-retry", "Retry with exponential backoff.");
        b.tags.confirmed.insert("python".to_string());
        b.tags.confirmed.insert("retry".to_string());
        store.create(b).await.unwrap();

        let mut c = Pattern::new("generic-logging", "Log with structured fields.");
        c.tags.confirmed.insert("logging".to_string());
        store.create(c).await.unwrap();

        let embeddings_path = home.path().join("embeddings").join("embeddings.json");
        if index {
            let patterns = store.list().await.unwrap();
            let config = crate::config::EmbeddingConfig {
                provider: Some("hash".to_string()),
                cache_path: embeddings_path.clone(),
                expansion_path: home.path().join("embeddings").join("expanded_queries.json"),
                expand_queries: false,
                workers: 2,
            };
            EmbeddingIndexer::new(Arc::new(HashEmbedder::default()), config)
                .index_all(
                    &patterns,
                    &crate::cancel::CancellationToken::new(),
                    &NoopProgress,
                )
                .await
                .unwrap();
        }

        let cache = MemoryCache::load(CacheOptions {
            dirs: vec![patterns_dir],
            embeddings_path,
            dimension: 0,
            lazy: true,
            disabled: false,
        })
        .await
        .unwrap();
        (home, Arc::new(cache))
    }

    fn go_context() -> ProjectContext {
        ProjectContext {
            languages: vec!["go".to_string()],
            project_type: Some("go".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_hybrid_ranking_top_result() {
        let (_home, cache) = seeded_cache(true).await;
        let engine = RetrievalEngine::new(cache, RetrievalConfig::default())
            .with_embedder(Arc::new(HashEmbedder::default()));

        let matches = engine
            .retrieve("how do I handle errors in a go service?", &go_context())
            .await
            .unwrap();

        assert!(!matches.is_empty());
        assert_eq!(matches[0].pattern.name, "go-errors");
        assert!(matches[0].score >= 0.6);
        assert!(matches[0].reasons.contains(&"confirmed-tag:go".to_string()));
        assert!(
            matches[0]
                .reasons
                .contains(&"confirmed-tag:error-handling".to_string())
        );
        assert!(!matches.iter().any(|m| m.pattern.name == "python-retry"));
    }

    #[tokio::test]
    async fn test_keyword_only_without_embedder() {
        let (_home, cache) = seeded_cache(false).await;
        let engine = RetrievalEngine::new(cache, RetrievalConfig::default());

        let matches = engine
            .retrieve("handle errors in a go service", &go_context())
            .await
            .unwrap();
        assert_eq!(matches[0].pattern.name, "go-errors");
        assert!(matches.iter().all(|m| {
            m.reasons.iter().all(|r| !r.starts_with("semantic:"))
        }));
    }

    struct BrokenEmbedder;

    #[async_trait]
    impl EmbeddingProvider for BrokenEmbedder {
        async fn embed_text(&self, _text: &str) -> Result<Vec<f32>> {
            Err(crate::Error::Provider("misconfigured".to_string()))
        }

        fn dimension(&self) -> usize {
            8
        }

        fn model_name(&self) -> &str {
            "broken"
        }
    }

    #[tokio::test]
    async fn test_provider_failure_degrades_to_keyword_only() {
        let (_home, cache) = seeded_cache(true).await;
        let engine = RetrievalEngine::new(cache, RetrievalConfig::default())
            .with_embedder(Arc::new(BrokenEmbedder));

        let matches = engine
            .retrieve("handle errors in a go service", &go_context())
            .await
            .unwrap();

        assert!(!matches.is_empty(), "keyword path still answers");
        assert_eq!(matches[0].pattern.name, "go-errors");
        for m in &matches {
            assert!(m.reasons.iter().all(|r| !r.starts_with("semantic:")));
        }
    }

    #[tokio::test]
    async fn test_semantic_reason_present_when_fused() {
        let (_home, cache) = seeded_cache(true).await;
        let engine = RetrievalEngine::new(cache, RetrievalConfig::default())
            .with_embedder(Arc::new(HashEmbedder::default()));

        let matches = engine
            .retrieve("handle errors in a go service", &go_context())
            .await
            .unwrap();
        assert!(
            matches[0].reasons.iter().any(|r| r.starts_with("semantic:")),
            "top match should carry a semantic signal, got {:?}",
            matches[0].reasons
        );
    }

    #[tokio::test]
    async fn test_inactive_patterns_excluded() {
        let (home, _) = seeded_cache(false).await;
        let patterns_dir = home.path().join("patterns");
        let store = PatternStore::new(vec![patterns_dir.clone()]);
        store.deprecate("go-errors", "retired").await.unwrap();

        let cache = MemoryCache::load(CacheOptions {
            dirs: vec![patterns_dir],
            embeddings_path: home.path().join("embeddings").join("embeddings.json"),
            dimension: 0,
            lazy: true,
            disabled: false,
        })
        .await
        .unwrap();
        let engine = RetrievalEngine::new(Arc::new(cache), RetrievalConfig::default());

        let matches = engine
            .retrieve("handle errors in a go service", &go_context())
            .await
            .unwrap();
        assert!(!matches.iter().any(|m| m.pattern.name == "go-errors"));
        assert!(
            matches
                .iter()
                .all(|m| m.pattern.lifecycle.status == PatternStatus::Active)
        );
    }

    #[tokio::test]
    async fn test_monotonicity_better_pattern_wins() {
        let (home, _) = seeded_cache(false).await;
        let patterns_dir = home.path().join("patterns");
        let store = PatternStore::new(vec![patterns_dir.clone()]);

        // A new pattern matching the query strictly better than go-errors.
        let mut better = Pattern::new(
            "go-service-errors",
            "Handle errors in a go service by wrapping with context.",
        );
        better.tags.confirmed.insert("go".to_string());
        better.tags.confirmed.insert("error-handling".to_string());
        better.applies.keywords.push("service".to_string());
        better.applies.languages.push("go".to_string());
        store.create(better).await.unwrap();

        let cache = MemoryCache::load(CacheOptions {
            dirs: vec![patterns_dir],
            embeddings_path: home.path().join("embeddings").join("embeddings.json"),
            dimension: 0,
            lazy: true,
            disabled: false,
        })
        .await
        .unwrap();
        let engine = RetrievalEngine::new(Arc::new(cache), RetrievalConfig::default());

        let matches = engine
            .retrieve("how do I handle errors in a go service?", &go_context())
            .await
            .unwrap();
        assert_eq!(matches[0].pattern.name, "go-service-errors");
    }
}
