//! Audit sink abstraction.
//!
//! The engine never talks to storage directly. It hands records to an
//! [`AuditEmitter`], which forwards them to an [`AuditSink`] on a background
//! task so a slow or unavailable sink never stalls evaluation.

use async_trait::async_trait;

pub mod emitter;
pub mod memory;
pub mod noop;
pub mod sqlite;
pub mod types;

pub use emitter::{AuditEmitter, EmitterOptions};
pub use memory::MemorySink;
pub use noop::NoOpSink;
pub use sqlite::SqliteSink;
pub use types::{AuditFilter, AuditKind, AuditRecord, SYSTEM_SUBJECT};

use crate::error::AuditError;

#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Append one record.
    async fn record(&self, record: AuditRecord) -> Result<(), AuditError>;

    /// Fetch records matching `filter`, newest first.
    async fn query(&self, filter: AuditFilter) -> Result<Vec<AuditRecord>, AuditError>;
}
