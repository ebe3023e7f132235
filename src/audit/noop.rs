//! No-op audit sink that discards all records.
//!
//! Used when auditing is disabled. All operations succeed but store nothing.

use super::{AuditFilter, AuditRecord, AuditSink};
use crate::error::AuditError;
use async_trait::async_trait;

pub struct NoOpSink;

#[async_trait]
impl AuditSink for NoOpSink {
    async fn record(&self, _record: AuditRecord) -> Result<(), AuditError> {
        Ok(())
    }

    async fn query(&self, _filter: AuditFilter) -> Result<Vec<AuditRecord>, AuditError> {
        Ok(vec![])
    }
}
