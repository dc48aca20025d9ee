//! Embedding layer: providers, index text, vector cache, and indexing
//!
//! Turns pattern text into fixed-dimensional vectors through a pluggable
//! provider and persists them keyed by content hash, so edits invalidate
//! stale vectors by construction.

mod cache;
mod expansion;
mod indexer;
mod provider;
pub mod similarity;
mod text;

pub use cache::{EmbeddingCache, EmbeddingRecord};
pub use expansion::{ExpansionStore, QueryExpander};
pub use indexer::{EmbeddingIndexer, IndexReport};
pub use provider::{EmbeddingProvider, HashEmbedder, ProviderRegistry, validate_dimension};
pub use text::{apply_query_prefix, build_index_text, build_query_text};
