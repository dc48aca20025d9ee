//! End-to-end scenarios across the core subsystems

use std::sync::Arc;

use mur_core::audit::{AuditAction, AuditEntry, AuditLogger};
use mur_core::cancel::CancellationToken;
use mur_core::config::{AuditConfig, RetrievalConfig};
use mur_core::embeddings::HashEmbedder;
use mur_core::pattern::{TrustLevel, content_hash};
use mur_core::retrieval::{ProjectContext, RetrievalEngine};
use mur_core::store::yaml;
use mur_core::sync::{PerPatternTarget, Synchronizer, events::CLAUDE_EVENTS};
use test_utils::{
    FailingEmbedder, TestHome, create_tagged_pattern, create_test_pattern, init_tracing,
};

fn go_context() -> ProjectContext {
    ProjectContext {
        languages: vec!["go".to_string()],
        project_type: Some("go".to_string()),
        ..Default::default()
    }
}

/// S1: create, get, verify.
#[tokio::test]
async fn create_get_verify() -> anyhow::Result<()> {
    init_tracing();
    let home = TestHome::new();
    let store = home.store();

    let created = store
        .create(create_test_pattern("go-errors", "Wrap errors with context."))
        .await?;

    assert!(home.patterns_dir().join("go-errors.yaml").exists());
    assert_eq!(
        created.security.hash,
        content_hash("Wrap errors with context.")
    );

    let fetched = store.get("go-errors").await?;
    assert_eq!(fetched, created);
    Ok(())
}

/// S2: hybrid ranking puts the on-topic pattern first with its reasons.
#[tokio::test]
async fn hybrid_ranking() -> anyhow::Result<()> {
    init_tracing();
    let home = TestHome::new();
    let store = home.store();
    store
        .create(create_tagged_pattern(
            "go-errors",
            "Handle errors in Go by wrapping with context.",
            &["go", "error-handling"],
        ))
        .await?;
    store
        .create(create_tagged_pattern(
            "python-retry",
            "Retry with exponential backoff.",
            &["python", "retry"],
        ))
        .await?;
    store
        .create(create_tagged_pattern(
            "generic-logging",
            "Log with structured fields.",
            &["logging"],
        ))
        .await?;
    home.index_all().await?;

    let cache = home.cache(true).await?;
    let engine = RetrievalEngine::new(cache, RetrievalConfig::default())
        .with_embedder(Arc::new(HashEmbedder::default()));

    let matches = engine
        .retrieve("how do I handle errors in a go service?", &go_context())
        .await?;

    assert_eq!(matches[0].pattern.name, "go-errors");
    assert!(matches[0].score >= 0.6);
    assert!(matches[0].reasons.contains(&"confirmed-tag:go".to_string()));
    assert!(
        matches[0]
            .reasons
            .contains(&"confirmed-tag:error-handling".to_string())
    );

    // python-retry must not outrank generic-logging in the top 3.
    let top3: Vec<&str> = matches
        .iter()
        .take(3)
        .map(|m| m.pattern.name.as_str())
        .collect();
    if let Some(py) = top3.iter().position(|n| *n == "python-retry") {
        let logging = top3.iter().position(|n| *n == "generic-logging");
        assert!(logging.is_some_and(|l| l < py));
    }
    Ok(())
}

/// S3: lazy cache loads embeddings once on demand.
#[tokio::test]
async fn cache_lazy_load() -> anyhow::Result<()> {
    init_tracing();
    let home = TestHome::new();
    let store = home.store();
    store
        .create(create_test_pattern("p1", "First body."))
        .await?;
    store
        .create(create_test_pattern("p2", "Second body."))
        .await?;
    home.index_all().await?;

    let cache = home.cache(true).await?;
    assert_eq!(cache.len(), 2);
    assert!(!cache.embeddings_loaded());

    cache.ensure_embeddings().await?;
    assert!(cache.embeddings_loaded());
    let stats = cache.stats();
    assert_eq!(stats.vectors, 2);

    // A second call performs no further load.
    cache.ensure_embeddings().await?;
    assert_eq!(cache.stats(), stats);

    let query = vec![0.5_f32; stats.dimension];
    assert!(!cache.search(&query, 2).await?.is_empty());
    Ok(())
}

/// S4: sync is idempotent and cleans up deleted patterns.
#[tokio::test]
async fn sync_idempotence_and_cleanup() -> anyhow::Result<()> {
    init_tracing();
    let home = TestHome::new();
    let store = home.store();
    store
        .create(create_test_pattern("p1", "First body."))
        .await?;
    store
        .create(create_test_pattern("p2", "Second body."))
        .await?;

    let target_dir = home.root().join("targets").join("claude");
    let sync = Synchronizer::new(vec![Arc::new(PerPatternTarget::new(
        "claude",
        target_dir.clone(),
        CLAUDE_EVENTS,
    ))]);
    let cancel = CancellationToken::new();

    let report = sync.sync_all(&store.list().await?, &cancel).await;
    assert!(report.all_succeeded());
    assert!(target_dir.join("learned-p1.md").exists());
    assert!(target_dir.join("learned-p2.md").exists());

    let before = std::fs::read(target_dir.join("learned-p1.md"))?;

    store.delete("p2").await?;
    let report = sync.sync_all(&store.list().await?, &cancel).await;
    assert!(report.all_succeeded());
    assert!(target_dir.join("learned-p1.md").exists());
    assert!(!target_dir.join("learned-p2.md").exists());

    let after = std::fs::read(target_dir.join("learned-p1.md"))?;
    assert_eq!(before, after, "unchanged file must be byte-identical");
    Ok(())
}

/// S5: a misconfigured embedder degrades to keyword-only retrieval.
#[tokio::test]
async fn provider_failure_fallback() -> anyhow::Result<()> {
    init_tracing();
    let home = TestHome::new();
    home.store()
        .create(create_tagged_pattern(
            "go-errors",
            "Handle errors in Go by wrapping with context.",
            &["go", "error-handling"],
        ))
        .await?;

    let cache = home.cache(true).await?;
    let engine = RetrievalEngine::new(cache, RetrievalConfig::default())
        .with_embedder(Arc::new(FailingEmbedder));

    let matches = engine
        .retrieve("handle errors in a go service", &go_context())
        .await?;

    assert!(!matches.is_empty(), "keyword path still answers");
    for m in &matches {
        assert!(
            m.reasons.iter().all(|r| !r.starts_with("semantic:")),
            "no semantic signals without a working embedder: {:?}",
            m.reasons
        );
    }
    Ok(())
}

/// S6: tampering with content on disk downgrades trust on verified load.
#[tokio::test]
async fn hash_tamper_detection() -> anyhow::Result<()> {
    init_tracing();
    let home = TestHome::new();
    let store = home.store();
    let created = store
        .create(create_test_pattern("go-errors", "Wrap errors with context."))
        .await?;

    // Edit content on disk, leaving security.hash untouched.
    let path = home.patterns_dir().join("go-errors.yaml");
    let mut tampered = created.clone();
    tampered.content = "Something else entirely.".to_string();
    yaml::write_pattern_file(&path, &tampered).await?;

    let verified = store.load_verified("go-errors").await?;
    assert_eq!(verified.security.trust_level, TrustLevel::Untrusted);
    assert!(
        verified
            .security
            .warnings
            .iter()
            .any(|w| w.contains("hash mismatch"))
    );
    Ok(())
}

/// Untrusted records never reach a sync target; the report names them.
#[tokio::test]
async fn tampered_pattern_excluded_from_sync() -> anyhow::Result<()> {
    init_tracing();
    let home = TestHome::new();
    let store = home.store();
    store
        .create(create_test_pattern("good", "Fine content."))
        .await?;
    let created = store
        .create(create_test_pattern("tampered", "Original content."))
        .await?;

    let path = home.patterns_dir().join("tampered.yaml");
    let mut edited = created.clone();
    edited.content = "Changed behind the store's back.".to_string();
    yaml::write_pattern_file(&path, &edited).await?;

    // Load through the verifying path, as sync callers do.
    let mut verified = Vec::new();
    for pattern in store.list().await? {
        verified.push(store.load_verified(&pattern.name).await?);
    }

    let target_dir = home.root().join("targets").join("claude");
    let sync = Synchronizer::new(vec![Arc::new(PerPatternTarget::new(
        "claude",
        target_dir.clone(),
        CLAUDE_EVENTS,
    ))]);

    let report = sync.sync_all(&verified, &CancellationToken::new()).await;
    assert!(report.all_succeeded());
    assert_eq!(report.skipped_untrusted, vec!["tampered"]);
    assert!(target_dir.join("learned-good.md").exists());
    assert!(!target_dir.join("learned-tampered.md").exists());
    Ok(())
}

/// Injection events land in the audit log hashed, never in plaintext.
#[tokio::test]
async fn retrieval_to_audit_flow() -> anyhow::Result<()> {
    init_tracing();
    let home = TestHome::new();
    home.store()
        .create(create_tagged_pattern(
            "go-errors",
            "Handle errors in Go.",
            &["go"],
        ))
        .await?;

    let cache = home.cache(true).await?;
    let engine = RetrievalEngine::new(cache, RetrievalConfig::default());
    let prompt = "how should my go service handle errors?";
    let matches = engine.retrieve(prompt, &go_context()).await?;
    assert!(!matches.is_empty());

    let logger = AuditLogger::new(&AuditConfig {
        path: home.root().join("audit").join("audit.jsonl"),
        rotate_bytes: u64::MAX,
    });
    for m in &matches {
        logger.append(
            &AuditEntry::new(
                AuditAction::Inject,
                m.pattern.id.clone(),
                m.pattern.name.clone(),
                "retrieval",
            )
            .with_tool("claude")
            .with_prompt(prompt),
        )?;
    }

    let text = std::fs::read_to_string(logger.path())?;
    assert_eq!(text.lines().count(), matches.len());
    assert!(!text.contains(prompt));
    assert!(text.contains("go-errors"));
    Ok(())
}
