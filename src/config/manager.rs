//! Live configuration with atomic snapshot swaps.
//!
//! Readers call [`ConfigManager::current`] once per evaluation and keep the
//! returned `Arc` for the rest of it, so a concurrent reload never changes
//! thresholds half-way through an event. A reload either publishes a fully
//! validated snapshot or leaves the previous one in place.

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;
use tracing::{debug, info, warn};

use super::snapshot::ConfigSnapshot;
use super::types::{ConfigFormat, EngineConfig};
use crate::audit::{AuditEmitter, AuditKind, AuditRecord};
use crate::error::ConfigError;
use crate::metrics;
use crate::types::Severity;

/// Result of a reload attempt. Errors stop here; they never reach callers
/// of [`ConfigManager::current`].
#[derive(Debug)]
pub enum ReloadOutcome {
    /// Source has not changed since the last attempt.
    Unchanged,
    /// A new snapshot was published.
    Reloaded,
    /// The source was unreadable or invalid; the previous snapshot stays.
    Rejected(ConfigError),
}

impl ReloadOutcome {
    pub fn is_reloaded(&self) -> bool {
        matches!(self, Self::Reloaded)
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Unchanged => "unchanged",
            Self::Reloaded => "reloaded",
            Self::Rejected(_) => "rejected",
        }
    }
}

pub struct ConfigManager {
    current: RwLock<Arc<ConfigSnapshot>>,
    source: Option<PathBuf>,
    /// Modification time of the last source version we attempted.
    last_seen: Mutex<Option<SystemTime>>,
    generation: AtomicU64,
    audit: AuditEmitter,
}

impl ConfigManager {
    /// Manager with a fixed initial snapshot and no backing file.
    pub fn new(initial: ConfigSnapshot, audit: AuditEmitter) -> Self {
        Self {
            current: RwLock::new(Arc::new(initial)),
            source: None,
            last_seen: Mutex::new(None),
            generation: AtomicU64::new(0),
            audit,
        }
    }

    /// Manager that starts from `initial` and watches `path` for changes.
    ///
    /// The file does not have to exist yet; the first [`poll`](Self::poll)
    /// after it appears loads it.
    pub fn watching(initial: ConfigSnapshot, path: impl Into<PathBuf>, audit: AuditEmitter) -> Self {
        Self {
            source: Some(path.into()),
            ..Self::new(initial, audit)
        }
    }

    /// Load `path` now and keep watching it.
    pub fn from_file(path: impl Into<PathBuf>, audit: AuditEmitter) -> Result<Self, ConfigError> {
        let path = path.into();
        let modified = modified_at(&path)?;
        let snapshot = load_snapshot(&path)?;
        info!(path = %path.display(), "Configuration loaded");
        let manager = Self::watching(snapshot, path, audit);
        *manager.last_seen.lock() = Some(modified);
        Ok(manager)
    }

    /// The snapshot in effect right now.
    #[inline]
    pub fn current(&self) -> Arc<ConfigSnapshot> {
        Arc::clone(&self.current.read())
    }

    /// Number of snapshots published since construction.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Replace the snapshot unconditionally.
    pub fn publish(&self, snapshot: ConfigSnapshot) {
        *self.current.write() = Arc::new(snapshot);
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Parse, validate and publish `content`.
    pub fn reload_from_str(&self, content: &str, format: ConfigFormat) -> ReloadOutcome {
        let result = EngineConfig::parse(content, format).and_then(ConfigSnapshot::compile);
        self.apply(result, "inline")
    }

    /// Re-read the watched file regardless of its modification time.
    pub fn reload_from_file(&self) -> ReloadOutcome {
        let Some(path) = self.source.as_deref() else {
            return ReloadOutcome::Unchanged;
        };
        if let Ok(modified) = modified_at(path) {
            *self.last_seen.lock() = Some(modified);
        }
        self.apply(load_snapshot(path), &path.display().to_string())
    }

    /// Reload if the watched file's modification time moved.
    ///
    /// The new time is remembered even when the reload is rejected, so one
    /// bad edit produces one error record rather than one per poll.
    pub fn poll(&self) -> ReloadOutcome {
        let Some(path) = self.source.as_deref() else {
            return ReloadOutcome::Unchanged;
        };

        let modified = match modified_at(path) {
            Ok(modified) => modified,
            Err(e) => {
                // Report a vanished file once, then wait for it to come back.
                let mut last_seen = self.last_seen.lock();
                if last_seen.take().is_none() {
                    debug!(path = %path.display(), "Config file still missing");
                    return ReloadOutcome::Unchanged;
                }
                drop(last_seen);
                return self.reject(e, &path.display().to_string());
            }
        };

        {
            let mut last_seen = self.last_seen.lock();
            if *last_seen == Some(modified) {
                return ReloadOutcome::Unchanged;
            }
            *last_seen = Some(modified);
        }

        debug!(path = %path.display(), "Config file changed, reloading");
        self.apply(load_snapshot(path), &path.display().to_string())
    }

    fn apply(&self, result: Result<ConfigSnapshot, ConfigError>, origin: &str) -> ReloadOutcome {
        let outcome = match result {
            Ok(snapshot) => {
                self.publish(snapshot);
                info!(origin = %origin, generation = self.generation(), "Configuration reloaded");
                self.audit.emit(AuditRecord::system(
                    AuditKind::ConfigReloaded,
                    format!("configuration reloaded from {origin}"),
                    Severity::Low,
                    Utc::now(),
                ));
                ReloadOutcome::Reloaded
            }
            Err(e) => return self.reject(e, origin),
        };
        metrics::record_config_reload(outcome.label());
        outcome
    }

    fn reject(&self, error: ConfigError, origin: &str) -> ReloadOutcome {
        warn!(origin = %origin, error = %error, code = error.error_code(), "Configuration rejected, keeping previous");
        self.audit.emit(AuditRecord::system(
            AuditKind::ConfigParseError,
            format!("{origin}: {error}"),
            Severity::Medium,
            Utc::now(),
        ));
        let outcome = ReloadOutcome::Rejected(error);
        metrics::record_config_reload(outcome.label());
        outcome
    }
}

fn load_snapshot(path: &Path) -> Result<ConfigSnapshot, ConfigError> {
    EngineConfig::load(path).and_then(ConfigSnapshot::compile)
}

fn modified_at(path: &Path) -> Result<SystemTime, ConfigError> {
    Ok(std::fs::metadata(path)?.modified()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> (ConfigManager, tokio::sync::mpsc::Receiver<AuditRecord>) {
        let (audit, receiver) = AuditEmitter::channel(16);
        (ConfigManager::new(ConfigSnapshot::default(), audit), receiver)
    }

    fn drain(receiver: &mut tokio::sync::mpsc::Receiver<AuditRecord>) -> Vec<AuditRecord> {
        let mut out = Vec::new();
        while let Ok(record) = receiver.try_recv() {
            out.push(record);
        }
        out
    }

    #[test]
    fn test_reload_publishes_new_snapshot() {
        let (manager, mut receiver) = manager();
        let before = manager.current();

        let outcome = manager.reload_from_str("spam_message_threshold = 4\n", ConfigFormat::Toml);
        assert!(outcome.is_reloaded());
        assert_eq!(manager.current().spam_message_threshold, 4);
        assert_eq!(manager.generation(), 1);
        // Old readers keep their snapshot.
        assert_eq!(before.spam_message_threshold, 8);

        let records = drain(&mut receiver);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, AuditKind::ConfigReloaded);
    }

    #[test]
    fn test_malformed_reload_keeps_previous() {
        let (manager, mut receiver) = manager();
        manager.reload_from_str("spam_message_threshold = 4\n", ConfigFormat::Toml);
        drain(&mut receiver);

        let outcome = manager.reload_from_str("spam_message_threshold = [", ConfigFormat::Toml);
        assert!(matches!(outcome, ReloadOutcome::Rejected(ConfigError::Toml(_))));
        assert_eq!(manager.current().spam_message_threshold, 4);
        assert_eq!(manager.generation(), 1);

        let records = drain(&mut receiver);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, AuditKind::ConfigParseError);
        assert_eq!(records[0].subject_id, crate::audit::SYSTEM_SUBJECT);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let (manager, _receiver) = manager();
        let outcome = manager.reload_from_str(r#"{"raid_window_seconds": 0}"#, ConfigFormat::Json);
        assert!(matches!(outcome, ReloadOutcome::Rejected(ConfigError::Invalid(_))));
        assert_eq!(manager.current().raid_window_seconds, 300);
    }

    #[test]
    fn test_poll_without_source_is_unchanged() {
        let (manager, _receiver) = manager();
        assert!(matches!(manager.poll(), ReloadOutcome::Unchanged));
    }
}
