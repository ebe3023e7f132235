//! Bounded in-memory audit sink.
//!
//! Keeps the most recent records in a ring. Used by the daemon when no
//! database is configured, and by tests. The sink can be switched into an
//! unavailable state to exercise the emitter's failure path.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use super::{AuditFilter, AuditRecord, AuditSink};
use crate::error::AuditError;

pub struct MemorySink {
    ring: Mutex<Ring>,
    capacity: usize,
    available: AtomicBool,
}

/// Records tagged with their insertion sequence, oldest first.
#[derive(Default)]
struct Ring {
    entries: VecDeque<(u64, AuditRecord)>,
    next_seq: u64,
}

impl MemorySink {
    pub const DEFAULT_CAPACITY: usize = 10_000;

    pub fn new(capacity: usize) -> Self {
        Self {
            ring: Mutex::new(Ring::default()),
            capacity: capacity.max(1),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the backing store going away (or coming back).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.ring.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.lock().entries.is_empty()
    }

    /// All stored records, oldest first.
    pub fn snapshot(&self) -> Vec<AuditRecord> {
        self.ring
            .lock()
            .entries
            .iter()
            .map(|(_, record)| record.clone())
            .collect()
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[async_trait]
impl AuditSink for MemorySink {
    async fn record(&self, record: AuditRecord) -> Result<(), AuditError> {
        if !self.available.load(Ordering::Relaxed) {
            return Err(AuditError::Unavailable("memory sink disabled".into()));
        }
        let mut ring = self.ring.lock();
        if ring.entries.len() >= self.capacity {
            ring.entries.pop_front();
        }
        let seq = ring.next_seq;
        ring.next_seq += 1;
        ring.entries.push_back((seq, record));
        Ok(())
    }

    async fn query(&self, filter: AuditFilter) -> Result<Vec<AuditRecord>, AuditError> {
        if !self.available.load(Ordering::Relaxed) {
            return Err(AuditError::Unavailable("memory sink disabled".into()));
        }
        let ring = self.ring.lock();
        let mut matched: Vec<&(u64, AuditRecord)> = ring
            .entries
            .iter()
            .filter(|(_, r)| filter.matches(r))
            .collect();
        // Newest first; later inserts win ties on timestamp.
        matched.sort_by(|(seq_a, a), (seq_b, b)| (b.timestamp, seq_b).cmp(&(a.timestamp, seq_a)));
        Ok(matched
            .into_iter()
            .take(filter.limit)
            .map(|(_, record)| record.clone())
            .collect())
    }
}
