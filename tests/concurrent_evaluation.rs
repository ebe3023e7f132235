//! Many tasks evaluating at once on a multi-threaded runtime.

use chatwarden::config::EngineConfig;
use chatwarden::{ActivityEvent, AuditKind, EscalationTier};
use std::sync::Arc;

mod common;
use common::{Harness, at, count};

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_subject_updates_are_not_lost() {
    let harness = Harness::new(EngineConfig::default());

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let engine = Arc::clone(&harness.engine);
        tasks.push(tokio::spawn(async move {
            for _ in 0..10 {
                engine.evaluate(&ActivityEvent::message("hot", "g1", "flood", at(0)));
                tokio::task::yield_now().await;
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    // Only the first two messages can't complete a repeat run; every later
    // one is a detection regardless of interleaving.
    let state = harness.engine.subject_state("hot", at(0)).unwrap();
    assert_eq!(state.warning_count, 158);
    assert_eq!(state.tier, EscalationTier::Enforced);

    let records = harness.finish().await;
    assert_eq!(count(&records, AuditKind::SpamDetected), 158);
    assert_eq!(count(&records, AuditKind::SpamWarning), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_distinct_subjects_proceed_independently() {
    let harness = Harness::new(EngineConfig::default());

    let mut tasks = Vec::new();
    for s in 0..64 {
        let engine = Arc::clone(&harness.engine);
        tasks.push(tokio::spawn(async move {
            let subject = format!("user{s}");
            for i in 0..3 {
                engine.evaluate(&ActivityEvent::message(subject.as_str(), "g1", "repeat me", at(i)));
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    for s in 0..64 {
        let state = harness.engine.subject_state(&format!("user{s}"), at(2)).unwrap();
        assert_eq!(state.warning_count, 1);
        assert_eq!(state.tier, EscalationTier::WarnedOnce);
    }
    assert_eq!(harness.engine.stats().tracked_subjects, 64);

    let records = harness.finish().await;
    assert_eq!(count(&records, AuditKind::SpamDetected), 64);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_sweeps_run_alongside_evaluation() {
    let harness = Harness::new(EngineConfig::default());
    let engine = Arc::clone(&harness.engine);

    let writer = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            for i in 0..500 {
                engine.evaluate(&ActivityEvent::message(format!("u{}", i % 50), "g1", "x", at(i)));
                if i % 25 == 0 {
                    tokio::task::yield_now().await;
                }
            }
        })
    };
    let sweeper = {
        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            for _ in 0..20 {
                engine.reset_stale_warnings_yielding(at(0)).await;
                engine.evict_idle_yielding(at(0)).await;
            }
        })
    };
    writer.await.unwrap();
    sweeper.await.unwrap();

    // Nothing was idle relative to t=0, so every subject survived.
    assert_eq!(engine.stats().tracked_subjects, 50);
    drop(engine);
    harness.finish().await;
}
