//! Universal properties the subsystems must hold together

use std::sync::Arc;

use mur_core::cancel::CancellationToken;
use mur_core::config::RetrievalConfig;
use mur_core::pattern::{TrustLevel, content_hash, flag_duplicates};
use mur_core::retrieval::{ProjectContext, RetrievalEngine};
use mur_core::store::yaml;
use test_utils::{TestHome, create_tagged_pattern, create_test_pattern, init_tracing};

/// Hash fidelity: every verified load either matches the content hash or
/// carries a downgrade plus warning; there is no third outcome.
#[tokio::test]
async fn hash_fidelity() {
    init_tracing();
    let home = TestHome::new();
    let store = home.store();
    store
        .create(create_test_pattern("clean", "Intact content."))
        .await
        .unwrap();
    let tampered = store
        .create(create_test_pattern("dirty", "Original content."))
        .await
        .unwrap();

    let mut edited = tampered.clone();
    edited.content = "Edited out of band.".to_string();
    yaml::write_pattern_file(&home.patterns_dir().join("dirty.yaml"), &edited)
        .await
        .unwrap();

    for name in ["clean", "dirty"] {
        let pattern = store.load_verified(name).await.unwrap();
        let matches_hash = pattern.security.hash == content_hash(&pattern.content);
        let downgraded = pattern.security.trust_level == TrustLevel::Untrusted
            && pattern
                .security
                .warnings
                .iter()
                .any(|w| w.contains("hash mismatch"));
        assert!(
            matches_hash || downgraded,
            "{name}: no third outcome allowed"
        );
        assert_ne!(matches_hash, downgraded, "{name}: exactly one outcome");
    }
}

/// Cache coherence: after a load, the cache and the store agree on content.
#[tokio::test]
async fn cache_coherence() {
    init_tracing();
    let home = TestHome::new();
    let store = home.store();
    for (name, content) in [
        ("p1", "First body."),
        ("p2", "Second body."),
        ("p3", "Third body."),
    ] {
        store
            .create(create_test_pattern(name, content))
            .await
            .unwrap();
    }

    let cache = home.cache(true).await.unwrap();
    for name in ["p1", "p2", "p3"] {
        let from_cache = cache.get_by_name(name).unwrap();
        let from_store = store.get(name).await.unwrap();
        assert_eq!(from_cache.content, from_store.content);
        assert_eq!(from_cache.security.hash, from_store.security.hash);
    }
}

/// Normalization invariant holds for every matrix row: any similarity a
/// unit query produces stays within the cosine bound.
#[tokio::test]
async fn normalized_rows_bound_similarity() {
    init_tracing();
    let home = TestHome::new();
    let store = home.store();
    for i in 0..5 {
        store
            .create(create_test_pattern(
                &format!("p{i}"),
                &format!("Pattern body number {i} with distinct words."),
            ))
            .await
            .unwrap();
    }
    home.index_all().await.unwrap();

    let cache = home.cache(true).await.unwrap();
    cache.ensure_embeddings().await.unwrap();
    let dim = cache.stats().dimension;

    let mut unit = vec![0.0_f32; dim];
    unit[0] = 1.0;
    for (_, score) in cache.search(&unit, 10).await.unwrap() {
        let score = f64::from(score);
        assert!((-1.0 - 1e-5..=1.0 + 1e-5).contains(&score));
    }
}

/// Retrieval monotonicity: a strictly better-matching new pattern takes
/// the top slot.
#[tokio::test]
async fn retrieval_monotonicity() {
    init_tracing();
    let home = TestHome::new();
    let store = home.store();
    store
        .create(create_tagged_pattern(
            "go-errors",
            "Handle errors in Go.",
            &["go"],
        ))
        .await
        .unwrap();

    let context = ProjectContext {
        languages: vec!["go".to_string()],
        project_type: Some("go".to_string()),
        ..Default::default()
    };
    let query = "how do I handle errors in a go service?";

    let engine = RetrievalEngine::new(
        home.cache(true).await.unwrap(),
        RetrievalConfig::default(),
    );
    let baseline = engine.retrieve(query, &context).await.unwrap();
    assert_eq!(baseline[0].pattern.name, "go-errors");

    let mut better = create_tagged_pattern(
        "go-service-errors",
        "Handle errors in a go service by wrapping with context.",
        &["go", "error-handling"],
    );
    better.applies.keywords.push("service".to_string());
    better.applies.languages.push("go".to_string());
    store.create(better).await.unwrap();

    let engine = RetrievalEngine::new(
        home.cache(true).await.unwrap(),
        RetrievalConfig::default(),
    );
    let matches = engine.retrieve(query, &context).await.unwrap();
    assert_eq!(matches[0].pattern.name, "go-service-errors");
}

/// Duplicate detection flags near-identical patterns without merging.
#[tokio::test]
async fn duplicates_flagged_never_merged() {
    init_tracing();
    let home = TestHome::new();
    let store = home.store();
    let shared_content = "Always wrap errors with context before returning them \
                          to callers so that failures stay traceable end to end.";
    store
        .create(create_test_pattern("wrap-errors", shared_content))
        .await
        .unwrap();
    store
        .create(create_test_pattern("wrap-errors-2", shared_content))
        .await
        .unwrap();
    store
        .create(create_test_pattern(
            "unrelated",
            "Render HTML templates on the server.",
        ))
        .await
        .unwrap();
    home.index_all().await.unwrap();

    let cache = home.cache(true).await.unwrap();
    let flags = flag_duplicates(&cache, 0.9).await.unwrap();

    assert_eq!(flags.len(), 1);
    let flag = &flags[0];
    let mut pair = [flag.a.as_str(), flag.b.as_str()];
    pair.sort_unstable();
    assert_eq!(pair, ["wrap-errors", "wrap-errors-2"]);
    assert!(flag.similarity >= 0.9);

    // Flag-only: the store still holds all three patterns.
    assert_eq!(store.list().await.unwrap().len(), 3);
}

/// Cancellation propagates out of indexing unchanged.
#[tokio::test]
async fn cancellation_propagates() {
    init_tracing();
    let home = TestHome::new();
    home.store()
        .create(create_test_pattern("p1", "body"))
        .await
        .unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();

    let patterns = home.store().list().await.unwrap();
    let indexer = mur_core::embeddings::EmbeddingIndexer::new(
        Arc::new(mur_core::embeddings::HashEmbedder::default()),
        home.embedding_config(),
    );
    let err = indexer
        .index_all(&patterns, &cancel, &mur_core::progress::NoopProgress)
        .await
        .unwrap_err();
    assert!(matches!(err, mur_core::Error::Cancelled));
}
