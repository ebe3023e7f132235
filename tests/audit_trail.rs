//! Audit records flowing from evaluation through the emitter into sinks.

use chatwarden::audit::{EmitterOptions, MemorySink, SqliteSink};
use chatwarden::config::{ConfigManager, ConfigSnapshot, EngineConfig};
use chatwarden::{
    Action, ActivityEvent, AuditEmitter, AuditFilter, AuditKind, AuditSink, Engine, Severity,
};
use chrono::TimeDelta;
use std::sync::Arc;

mod common;
use common::{Harness, at, count};

#[tokio::test]
async fn test_sqlite_sink_end_to_end() {
    let sink = Arc::new(SqliteSink::open(":memory:").await.unwrap());
    let (audit, worker) = AuditEmitter::spawn(sink.clone(), EmitterOptions::default());
    let config = Arc::new(ConfigManager::new(ConfigSnapshot::default(), audit.clone()));
    let engine = Engine::new(config, audit);

    for i in 0..5 {
        engine.evaluate(&ActivityEvent::message("spammer", "g1", "same again", at(i)));
    }
    for i in 0..11 {
        let occurred = at(100 + i);
        engine.evaluate(&ActivityEvent::join(
            format!("joiner{i}"),
            "g1",
            occurred,
            Some(occurred - TimeDelta::days(1)),
        ));
    }

    drop(engine);
    worker.await.unwrap();

    let spam = sink
        .query(AuditFilter::default().subject("spammer"))
        .await
        .unwrap();
    // Three detections: spam_detected x3, spam_warning x1, spam_timeout x1.
    assert_eq!(spam.len(), 5);
    assert!(spam.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));

    let high = sink
        .query(AuditFilter::default().severity(Severity::High))
        .await
        .unwrap();
    let kinds: Vec<_> = high.iter().map(|r| r.kind).collect();
    assert_eq!(count(&high, AuditKind::SpamTimeout), 1);
    assert_eq!(count(&high, AuditKind::PotentialRaid), 1);
    assert_eq!(count(&high, AuditKind::RaidKick), 1);
    assert_eq!(kinds.len(), 3);

    let joins = sink
        .query(
            AuditFilter::default()
                .kind(AuditKind::MemberJoin)
                .since(at(105))
                .limit(3),
        )
        .await
        .unwrap();
    assert_eq!(joins.len(), 3);
    assert_eq!(joins[0].subject_id, "joiner10");
    assert!(joins.iter().all(|r| r.community_id.as_deref() == Some("g1")));
}

#[tokio::test]
async fn test_default_query_limit() {
    let harness = Harness::new(EngineConfig::default());
    for i in 0..150 {
        harness
            .engine
            .evaluate(&ActivityEvent::leave(format!("u{i}"), "g1", at(i)));
    }
    let sink = Arc::clone(&harness.sink);
    let stored = harness.finish().await;
    assert_eq!(stored.len(), 150);

    let page = sink.query(AuditFilter::default()).await.unwrap();
    assert_eq!(page.len(), 100);
    assert_eq!(page[0].subject_id, "u149");
}

#[tokio::test]
async fn test_unavailable_sink_does_not_affect_decisions() {
    let sink = Arc::new(MemorySink::default());
    sink.set_available(false);
    let (audit, worker) = AuditEmitter::spawn(sink.clone(), EmitterOptions::default());
    let config = Arc::new(ConfigManager::new(ConfigSnapshot::default(), audit.clone()));
    let engine = Engine::new(config, audit);

    let mut last = None;
    for i in 0..3 {
        last = Some(engine.evaluate(&ActivityEvent::message("u1", "g1", "dup", at(i))));
    }
    let decision = last.unwrap();
    assert_eq!(decision.action(), Action::DeleteMessage);
    assert_eq!(decision.audit_records.len(), 1);

    drop(engine);
    worker.await.unwrap();
    assert!(sink.is_empty());
}

#[tokio::test]
async fn test_full_queue_drops_instead_of_blocking() {
    let sink = Arc::new(MemorySink::default());
    let options = EmitterOptions {
        capacity: 4,
        ..EmitterOptions::default()
    };
    let (audit, worker) = AuditEmitter::spawn(sink.clone(), options);
    let config = Arc::new(ConfigManager::new(ConfigSnapshot::default(), audit.clone()));
    let engine = Engine::new(config, audit);

    // The worker cannot run until this task yields, so most of these overflow.
    for i in 0..50 {
        engine.evaluate(&ActivityEvent::leave(format!("u{i}"), "g1", at(i)));
    }
    drop(engine);
    worker.await.unwrap();

    let stored = sink.len();
    assert!(stored >= 4 && stored < 50, "stored {stored}");
}
