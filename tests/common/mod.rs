//! Integration test common infrastructure.
//!
//! Provides a fixed clock, engine builders, and a harness that runs the real
//! audit worker against a [`MemorySink`] so tests can assert on what reached
//! storage.

#![allow(dead_code)]

use chatwarden::audit::{EmitterOptions, MemorySink};
use chatwarden::config::{ConfigManager, ConfigSnapshot, EngineConfig};
use chatwarden::{AuditEmitter, AuditKind, AuditRecord, Engine};
use chrono::{DateTime, TimeZone, Utc};
use std::sync::Arc;
use tokio::sync::mpsc::Receiver;
use tokio::task::JoinHandle;

/// Fixed epoch plus `secs`.
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

pub fn snapshot(config: EngineConfig) -> ConfigSnapshot {
    ConfigSnapshot::compile(config).expect("test config must be valid")
}

/// Engine whose audit records land in a channel the test drains itself.
pub fn channel_engine(config: EngineConfig) -> (Engine, Receiver<AuditRecord>) {
    let (audit, receiver) = AuditEmitter::channel(4096);
    let manager = Arc::new(ConfigManager::new(snapshot(config), audit.clone()));
    (Engine::new(manager, audit), receiver)
}

/// Everything queued so far, in emission order.
pub fn drain(receiver: &mut Receiver<AuditRecord>) -> Vec<AuditRecord> {
    let mut out = Vec::new();
    while let Ok(record) = receiver.try_recv() {
        out.push(record);
    }
    out
}

pub fn count(records: &[AuditRecord], kind: AuditKind) -> usize {
    records.iter().filter(|r| r.kind == kind).count()
}

/// Engine wired to a real audit worker and an in-memory sink.
pub struct Harness {
    pub engine: Arc<Engine>,
    pub sink: Arc<MemorySink>,
    worker: JoinHandle<()>,
}

impl Harness {
    /// Must be called inside a Tokio runtime.
    pub fn new(config: EngineConfig) -> Self {
        let sink = Arc::new(MemorySink::default());
        let (audit, worker) = AuditEmitter::spawn(sink.clone(), EmitterOptions::default());
        let manager = Arc::new(ConfigManager::new(snapshot(config), audit.clone()));
        Self {
            engine: Arc::new(Engine::new(manager, audit)),
            sink,
            worker,
        }
    }

    /// Drop the engine, wait for the worker to drain, and return what the
    /// sink stored. Every clone of `engine` must be gone first.
    pub async fn finish(self) -> Vec<AuditRecord> {
        let Self {
            engine,
            sink,
            worker,
        } = self;
        drop(engine);
        worker.await.expect("audit worker panicked");
        sink.snapshot()
    }
}
