//! SQLite-backed audit sink.
//!
//! Stores records in the `security_events` table. Timestamps are kept as
//! unix milliseconds so range filters and ordering stay in SQL.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use super::{AuditFilter, AuditKind, AuditRecord, AuditSink};
use crate::error::AuditError;
use crate::types::Severity;

static MEMDB_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Row tuple: (id, event_type, user_id, community_id, details, timestamp, severity).
type EventRow = (String, String, String, Option<String>, String, i64, String);

#[derive(Clone)]
pub struct SqliteSink {
    pool: SqlitePool,
}

impl SqliteSink {
    /// Connection acquire timeout - an unavailable database fails fast.
    const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

    /// Maximum time a connection can remain idle before being closed.
    const IDLE_TIMEOUT: Duration = Duration::from_secs(60);

    /// Open (or create) the database at `path` and apply migrations.
    ///
    /// `":memory:"` gives a private in-memory database.
    pub async fn open(path: &str) -> Result<Self, AuditError> {
        let pool = if path == ":memory:" {
            // Each call gets its own shared-cache database so parallel tests don't collide.
            let id = MEMDB_COUNTER.fetch_add(1, Ordering::Relaxed);
            let memdb_uri = format!(
                "file:chatwarden-memdb-{}-{}?mode=memory&cache=shared",
                std::process::id(),
                id
            );

            let options = SqliteConnectOptions::new()
                .filename(&memdb_uri)
                .shared_cache(true)
                .create_if_missing(true);

            SqlitePoolOptions::new()
                .max_connections(1)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .idle_timeout(Some(Self::IDLE_TIMEOUT))
                .connect_with(options)
                .await?
        } else {
            if let Some(parent) = Path::new(path).parent()
                && !parent.as_os_str().is_empty()
                && let Err(e) = std::fs::create_dir_all(parent)
            {
                warn!(path = %parent.display(), error = %e, "Failed to create audit database directory");
            }

            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true);

            SqlitePoolOptions::new()
                .max_connections(5)
                .acquire_timeout(Self::ACQUIRE_TIMEOUT)
                .idle_timeout(Some(Self::IDLE_TIMEOUT))
                .connect_with(options)
                .await?
        };

        info!(path = %path, "Audit database connected");

        sqlx::migrate!("./migrations").run(&pool).await?;

        // WAL lets the admin tooling read while the daemon appends.
        sqlx::query("PRAGMA journal_mode=WAL").execute(&pool).await?;
        sqlx::query("PRAGMA synchronous=NORMAL").execute(&pool).await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl AuditSink for SqliteSink {
    async fn record(&self, record: AuditRecord) -> Result<(), AuditError> {
        sqlx::query(
            r#"
            INSERT INTO security_events (id, event_type, user_id, community_id, details, timestamp, severity)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id.to_string())
        .bind(record.kind.as_str())
        .bind(&record.subject_id)
        .bind(&record.community_id)
        .bind(&record.detail)
        .bind(record.timestamp.timestamp_millis())
        .bind(record.severity.as_str())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn query(&self, filter: AuditFilter) -> Result<Vec<AuditRecord>, AuditError> {
        let mut sql = String::from(
            "SELECT id, event_type, user_id, community_id, details, timestamp, severity \
             FROM security_events WHERE 1=1",
        );
        if filter.subject_id.is_some() {
            sql.push_str(" AND user_id = ?");
        }
        if filter.community_id.is_some() {
            sql.push_str(" AND community_id = ?");
        }
        if filter.severity.is_some() {
            sql.push_str(" AND severity = ?");
        }
        if !filter.kinds.is_empty() {
            let placeholders = vec!["?"; filter.kinds.len()].join(", ");
            sql.push_str(&format!(" AND event_type IN ({placeholders})"));
        }
        if filter.since.is_some() {
            sql.push_str(" AND timestamp >= ?");
        }
        sql.push_str(" ORDER BY timestamp DESC, rowid DESC LIMIT ?");

        let mut query = sqlx::query_as::<_, EventRow>(&sql);
        if let Some(subject) = &filter.subject_id {
            query = query.bind(subject);
        }
        if let Some(community) = &filter.community_id {
            query = query.bind(community);
        }
        if let Some(severity) = filter.severity {
            query = query.bind(severity.as_str());
        }
        for kind in &filter.kinds {
            query = query.bind(kind.as_str());
        }
        if let Some(since) = filter.since {
            query = query.bind(since.timestamp_millis());
        }
        let limit = i64::try_from(filter.limit).unwrap_or(i64::MAX);
        query = query.bind(limit);

        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.into_iter().filter_map(row_to_record).collect())
    }
}

fn row_to_record(row: EventRow) -> Option<AuditRecord> {
    let (id, event_type, user_id, community_id, details, timestamp, severity) = row;

    let Ok(id) = Uuid::parse_str(&id) else {
        warn!(id = %id, "Skipping audit row with malformed id");
        return None;
    };
    let Some(kind) = AuditKind::parse(&event_type) else {
        warn!(event_type = %event_type, "Skipping audit row with unknown event type");
        return None;
    };
    let severity = Severity::parse(&severity).unwrap_or(Severity::Medium);
    let timestamp = Utc.timestamp_millis_opt(timestamp).single()?;

    Some(AuditRecord {
        id,
        kind,
        subject_id: user_id,
        community_id,
        detail: details,
        severity,
        timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(kind: AuditKind, subject: &str, secs: i64, severity: Severity) -> AuditRecord {
        AuditRecord::new(
            kind,
            subject,
            format!("{kind} for {subject}"),
            severity,
            Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
        )
    }

    #[tokio::test]
    async fn test_record_and_query_roundtrip() {
        let sink = SqliteSink::open(":memory:").await.unwrap();
        let original = record(AuditKind::SpamDetected, "u1", 0, Severity::Medium).in_community("g1");
        sink.record(original.clone()).await.unwrap();

        let out = sink.query(AuditFilter::default()).await.unwrap();
        assert_eq!(out, vec![original]);
    }

    #[tokio::test]
    async fn test_query_filters_and_order() {
        let sink = SqliteSink::open(":memory:").await.unwrap();
        sink.record(record(AuditKind::SpamDetected, "u1", 0, Severity::Medium)).await.unwrap();
        sink.record(record(AuditKind::SpamTimeout, "u1", 5, Severity::High)).await.unwrap();
        sink.record(record(AuditKind::PotentialRaid, "u2", 10, Severity::High)).await.unwrap();
        sink.record(record(AuditKind::MemberJoin, "u3", 15, Severity::Low)).await.unwrap();

        let high = sink
            .query(AuditFilter::default().severity(Severity::High))
            .await
            .unwrap();
        assert_eq!(high.len(), 2);
        assert_eq!(high[0].kind, AuditKind::PotentialRaid);
        assert_eq!(high[1].kind, AuditKind::SpamTimeout);

        let u1 = sink
            .query(
                AuditFilter::default()
                    .subject("u1")
                    .kind(AuditKind::SpamDetected)
                    .kind(AuditKind::SpamTimeout),
            )
            .await
            .unwrap();
        assert_eq!(u1.len(), 2);

        let recent = sink
            .query(AuditFilter::default().since(Utc.timestamp_opt(1_700_000_010, 0).unwrap()))
            .await
            .unwrap();
        assert_eq!(recent.len(), 2);

        let limited = sink.query(AuditFilter::default().limit(1)).await.unwrap();
        assert_eq!(limited.len(), 1);
        assert_eq!(limited[0].kind, AuditKind::MemberJoin);
    }

    #[tokio::test]
    async fn test_equal_timestamps_latest_insert_first() {
        let sink = SqliteSink::open(":memory:").await.unwrap();
        for subject in ["first", "second", "third"] {
            sink.record(record(AuditKind::MemberJoin, subject, 0, Severity::Low)).await.unwrap();
        }
        let subjects: Vec<_> = sink
            .query(AuditFilter::default())
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.subject_id)
            .collect();
        assert_eq!(subjects, vec!["third", "second", "first"]);
    }
}
