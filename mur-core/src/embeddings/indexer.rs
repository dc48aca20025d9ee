//! Two-phase embedding indexer
//!
//! Phase one (optional) asks a text generator for likely search queries
//! per pattern. Phase two builds index text and embeds it through the
//! configured provider with a fixed-size worker pool. The provider is
//! probed once up front so an unreachable endpoint fails before any work;
//! after that, one pattern's failure never aborts the run.

use std::sync::Arc;

use chrono::Utc;
use futures::StreamExt;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::cancel::CancellationToken;
use crate::config::EmbeddingConfig;
use crate::constants::{EMBED_TIMEOUT, EXPANSION_TIMEOUT, PROBE_TIMEOUT};
use crate::pattern::Pattern;
use crate::progress::ProgressSink;
use crate::store::InvalidationQueue;
use crate::{Error, Result};

use super::cache::{EmbeddingCache, EmbeddingRecord};
use super::expansion::{ExpansionStore, QueryExpander};
use super::provider::{EmbeddingProvider, validate_dimension};
use super::text::build_index_text;

/// Outcome of one `index_all` run.
#[derive(Debug, Default)]
pub struct IndexReport {
    /// Vectors generated this run
    pub indexed: usize,
    /// Patterns whose vectors were already current
    pub skipped: usize,
    /// Query expansions generated this run
    pub expanded: usize,
    /// Stale vectors dropped before indexing
    pub invalidated: usize,
    /// Per-pattern failures, `(name, error)`
    pub failures: Vec<(String, String)>,
}

/// Drives the two indexing phases against one provider.
pub struct EmbeddingIndexer {
    provider: Arc<dyn EmbeddingProvider>,
    expander: Option<Arc<dyn QueryExpander>>,
    config: EmbeddingConfig,
    invalidations: InvalidationQueue,
}

impl EmbeddingIndexer {
    /// Create an indexer without query expansion.
    #[must_use]
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: EmbeddingConfig) -> Self {
        Self {
            provider,
            expander: None,
            config,
            invalidations: InvalidationQueue::new(),
        }
    }

    /// Attach a query expander for the first phase.
    #[must_use]
    pub fn with_expander(mut self, expander: Arc<dyn QueryExpander>) -> Self {
        self.expander = Some(expander);
        self
    }

    /// Share the store's stale-vector queue so deletes and edits drop
    /// their old vectors on the next run.
    #[must_use]
    pub fn with_invalidations(mut self, queue: InvalidationQueue) -> Self {
        self.invalidations = queue;
        self
    }

    /// Index every pattern that lacks a current vector.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Provider`] when the provider is unreachable before
    /// any work, [`Error::Cancelled`] when the token fires, and I/O errors
    /// from the cache files. Per-pattern provider failures are collected
    /// into the report instead.
    pub async fn index_all(
        &self,
        patterns: &[Pattern],
        cancel: &CancellationToken,
        progress: &dyn ProgressSink,
    ) -> Result<IndexReport> {
        let correlation_id = Uuid::new_v4();
        cancel.check()?;

        match timeout(PROBE_TIMEOUT, self.provider.is_available()).await {
            Ok(true) => {}
            Ok(false) | Err(_) => {
                return Err(Error::Provider(format!(
                    "embedding provider {} is unreachable",
                    self.provider.model_name()
                )));
            }
        }

        let mut report = IndexReport::default();
        let mut cache = EmbeddingCache::load(&self.config.cache_path).await?;
        let mut expansions = ExpansionStore::load(&self.config.expansion_path).await?;

        // Drop vectors queued stale by the store, plus anything whose
        // pattern no longer exists or was re-hashed.
        let stale = self.invalidations.drain();
        report.invalidated += cache.remove_keys(&stale);
        let live: std::collections::HashSet<String> =
            patterns.iter().map(Pattern::vector_key).collect();
        report.invalidated += cache.retain_keys(|key| live.contains(key));
        expansions.retain_names(|name| patterns.iter().any(|p| p.name == name));

        if self.config.expand_queries && self.expander.is_some() {
            report.expanded = self
                .expand_phase(patterns, &mut expansions, cancel, progress)
                .await?;
            expansions.save().await?;
        }

        let pending: Vec<&Pattern> = patterns
            .iter()
            .filter(|p| !cache.contains(&p.vector_key()))
            .collect();
        report.skipped = patterns.len() - pending.len();

        info!(
            correlation_id = %correlation_id,
            pending = pending.len(),
            skipped = report.skipped,
            "embedding phase starting"
        );
        progress.phase_started("embed", pending.len());

        let jobs: Vec<(String, String, String)> = pending
            .iter()
            .map(|p| {
                (
                    p.name.clone(),
                    p.vector_key(),
                    build_index_text(p, expansions.get(&p.name)),
                )
            })
            .collect();

        let provider = Arc::clone(&self.provider);
        let expected_dim = provider.dimension();
        let mut results = futures::stream::iter(jobs)
            .map(|(name, key, text)| {
                let provider = Arc::clone(&provider);
                let cancel = cancel.clone();
                async move {
                    cancel.check()?;
                    let vector = match timeout(EMBED_TIMEOUT, provider.embed_text(&text)).await {
                        Ok(Ok(vector)) => vector,
                        Ok(Err(e)) => return Ok::<_, Error>((name, key, Err(e))),
                        Err(_) => {
                            return Ok((
                                name.clone(),
                                key,
                                Err(Error::Timeout(format!(
                                    "embedding {name} after {EMBED_TIMEOUT:?}"
                                ))),
                            ));
                        }
                    };
                    if let Err(e) = validate_dimension(&vector, expected_dim) {
                        return Ok((name, key, Err(e)));
                    }
                    Ok((name, key, Ok(vector)))
                }
            })
            .buffer_unordered(self.config.workers.max(1));

        let mut generated = Vec::new();
        while let Some(result) = results.next().await {
            let (name, key, outcome) = result?;
            match outcome {
                Ok(vector) => {
                    progress.item_finished("embed", &name, true);
                    generated.push((key, vector));
                }
                Err(e) => {
                    warn!(correlation_id = %correlation_id, name = %name, error = %e, "pattern indexing failed");
                    progress.item_finished("embed", &name, false);
                    report.failures.push((name, e.to_string()));
                }
            }
        }
        drop(results);

        generated.sort_by(|a, b| a.0.cmp(&b.0));
        for (key, vector) in generated {
            cache.upsert(EmbeddingRecord {
                id: key,
                vector,
                model_name: self.provider.model_name().to_string(),
                updated_at: Utc::now(),
            })?;
            report.indexed += 1;
        }

        cancel.check()?;
        cache.save().await?;
        progress.phase_finished("embed");

        info!(
            correlation_id = %correlation_id,
            indexed = report.indexed,
            failures = report.failures.len(),
            "indexing complete"
        );
        Ok(report)
    }

    /// Phase one: propose search queries for patterns missing them.
    async fn expand_phase(
        &self,
        patterns: &[Pattern],
        expansions: &mut ExpansionStore,
        cancel: &CancellationToken,
        progress: &dyn ProgressSink,
    ) -> Result<usize> {
        let Some(expander) = self.expander.as_ref() else {
            return Ok(0);
        };

        let pending: Vec<&Pattern> = patterns
            .iter()
            .filter(|p| expansions.get(&p.name).is_none())
            .collect();
        progress.phase_started("expand", pending.len());

        let mut expanded = 0;
        for pattern in pending {
            cancel.check()?;
            match timeout(EXPANSION_TIMEOUT, expander.expand(pattern)).await {
                Ok(Ok(queries)) => {
                    expansions.set(&pattern.name, queries);
                    expanded += 1;
                    progress.item_finished("expand", &pattern.name, true);
                }
                Ok(Err(e)) => {
                    // Expansion is best-effort; the pattern still embeds.
                    debug!(name = %pattern.name, error = %e, "query expansion skipped");
                    progress.item_finished("expand", &pattern.name, false);
                }
                Err(_) => {
                    warn!(name = %pattern.name, "query expansion timed out");
                    progress.item_finished("expand", &pattern.name, false);
                }
            }
        }
        progress.phase_finished("expand");
        Ok(expanded)
    }
}
