//! chatwarden - real-time abuse detection and escalation for multi-tenant chat.
//!
//! The transport normalizes each platform event into an [`ActivityEvent`] and
//! hands it to [`Engine::evaluate`], which returns an [`EnforcementDecision`]
//! naming the action to apply. Side effects (deleting, warning, timing out,
//! kicking) stay with the transport; the engine only decides and records.
//!
//! ```no_run
//! use std::sync::Arc;
//! use chatwarden::{ActivityEvent, AuditEmitter, ConfigManager, ConfigSnapshot, Engine};
//!
//! let audit = AuditEmitter::disconnected();
//! let config = Arc::new(ConfigManager::new(ConfigSnapshot::default(), audit.clone()));
//! let engine = Engine::new(config, audit);
//!
//! let decision = engine.evaluate(&ActivityEvent::message("u1", "g1", "hello", chrono::Utc::now()));
//! assert!(!decision.verdict.detected);
//! ```

pub mod audit;
pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod maintenance;
pub mod metrics;
pub mod security;
pub mod telemetry;
pub mod types;

pub use audit::{AuditEmitter, AuditFilter, AuditKind, AuditRecord, AuditSink};
pub use config::{ConfigManager, ConfigSnapshot, EngineConfig, ReloadOutcome};
pub use engine::{Engine, EngineStats, SubjectState};
pub use error::{AuditError, ConfigError};
pub use security::EscalationTier;
pub use types::{
    Action, ActivityEvent, EnforcementDecision, EventKind, ReasonCode, Severity, Verdict,
};
