//! Fire-and-forget record emission.
//!
//! `emit()` never waits: it pushes into a bounded channel and returns. A
//! single worker task drains the channel into the sink with a per-call
//! timeout and no retries. Sink failures are logged and counted, never
//! surfaced to the caller.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, Receiver, Sender, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{AuditRecord, AuditSink};
use crate::error::AuditError;
use crate::metrics;

/// Tuning for the emitter's queue and sink calls.
#[derive(Debug, Clone, Copy)]
pub struct EmitterOptions {
    /// Records buffered before new ones are dropped.
    pub capacity: usize,
    /// Upper bound on a single sink call.
    pub call_timeout: Duration,
}

impl Default for EmitterOptions {
    fn default() -> Self {
        Self {
            capacity: 1024,
            call_timeout: Duration::from_secs(2),
        }
    }
}

/// Cloneable handle used by the engine and the config manager.
#[derive(Clone, Debug)]
pub struct AuditEmitter {
    sender: Sender<AuditRecord>,
}

impl AuditEmitter {
    /// Create an emitter and the receiving end, without a worker.
    ///
    /// Useful when the caller wants to drain records itself.
    pub fn channel(capacity: usize) -> (Self, Receiver<AuditRecord>) {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        (Self { sender }, receiver)
    }

    /// Create an emitter whose records go nowhere.
    pub fn disconnected() -> Self {
        let (emitter, _receiver) = Self::channel(1);
        emitter
    }

    /// Create an emitter backed by a worker task writing into `sink`.
    ///
    /// Must be called inside a Tokio runtime. The worker exits after every
    /// clone of the emitter is dropped and the queue is drained, so awaiting
    /// the handle flushes pending records.
    pub fn spawn(sink: Arc<dyn AuditSink>, options: EmitterOptions) -> (Self, JoinHandle<()>) {
        let (emitter, receiver) = Self::channel(options.capacity);
        let handle = tokio::spawn(run_worker(sink, receiver, options.call_timeout));
        (emitter, handle)
    }

    /// Queue a record without waiting. Drops it if the queue is full.
    pub fn emit(&self, record: AuditRecord) {
        match self.sender.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(record)) => {
                metrics::record_audit_dropped();
                warn!(kind = %record.kind, subject = %record.subject_id, "Audit queue full, dropping record");
            }
            Err(TrySendError::Closed(record)) => {
                debug!(kind = %record.kind, "Audit worker gone, discarding record");
            }
        }
    }
}

async fn run_worker(sink: Arc<dyn AuditSink>, mut receiver: Receiver<AuditRecord>, call_timeout: Duration) {
    while let Some(record) = receiver.recv().await {
        let kind = record.kind;
        match tokio::time::timeout(call_timeout, sink.record(record)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                metrics::record_audit_failure(e.error_code());
                warn!(kind = %kind, error = %e, "Audit sink write failed");
            }
            Err(_) => {
                let e = AuditError::Timeout;
                metrics::record_audit_failure(e.error_code());
                warn!(kind = %kind, error = %e, timeout_ms = call_timeout.as_millis() as u64, "Audit sink write dropped");
            }
        }
    }
    debug!("Audit worker stopped");
}
