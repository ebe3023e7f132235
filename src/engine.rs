//! Per-event evaluation pipeline.
//!
//! ```text
//! ActivityEvent ──> Engine::evaluate
//!                      │
//!      message ────────┼──> SubjectWindow (lock) ─> heuristics ─> escalation
//!      join ───────────┼──> CommunityJoinWindow (lock) ─> raid
//!      leave ──────────┘
//!                      │
//!                      └──> EnforcementDecision + AuditEmitter (fire-and-forget)
//! ```
//!
//! One config snapshot is read at the start of each evaluation and used for
//! all of it. For messages the subject's mutex is held across
//! record → evaluate → escalate, so concurrent events from one subject
//! serialize while different subjects proceed in parallel.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::audit::{AuditEmitter, AuditKind, AuditRecord};
use crate::config::{ConfigManager, ConfigSnapshot, Module};
use crate::metrics;
use crate::security::escalation::{self, EscalationTier};
use crate::security::{CommunityJoinWindow, SubjectWindow, WindowStore, heuristics, raid};
use crate::telemetry::{EvalTimer, spans};
use crate::types::{
    Action, ActivityEvent, EnforcementDecision, EventKind, ReasonCode, Severity, Verdict,
};

/// Sweeps yield to the runtime after this many keys.
const SWEEP_BATCH: usize = 64;

/// Point-in-time view of one subject, for operators and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectState {
    pub warning_count: u32,
    pub tier: EscalationTier,
    pub last_warning_at: Option<DateTime<Utc>>,
    pub window_len: usize,
}

/// Counts for status output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EngineStats {
    pub tracked_subjects: usize,
    pub tracked_communities: usize,
}

/// The abuse-detection engine. Share it behind an `Arc`.
pub struct Engine {
    config: Arc<ConfigManager>,
    subjects: WindowStore<SubjectWindow>,
    communities: WindowStore<CommunityJoinWindow>,
    audit: AuditEmitter,
}

impl Engine {
    pub fn new(config: Arc<ConfigManager>, audit: AuditEmitter) -> Self {
        Self {
            config,
            subjects: WindowStore::new(),
            communities: WindowStore::new(),
            audit,
        }
    }

    pub fn config(&self) -> &Arc<ConfigManager> {
        &self.config
    }

    /// Evaluate one event. Never fails and never waits on the audit sink.
    pub fn evaluate(&self, event: &ActivityEvent) -> EnforcementDecision {
        let _timer = EvalTimer::new();
        let _span = spans::evaluate(event.kind.as_str(), &event.subject_id, &event.community_id).entered();
        let config = self.config.current();

        metrics::record_event(event.kind.as_str());

        let decision = match event.kind {
            EventKind::Message => self.evaluate_message(event, &config),
            EventKind::Join => self.evaluate_join(event, &config),
            EventKind::Leave => self.evaluate_leave(event),
        };

        if let Some(reason) = decision.verdict.reason_code {
            metrics::record_detection(reason.as_str());
        }
        metrics::record_action(decision.action().as_str());

        for record in &decision.audit_records {
            self.audit.emit(record.clone());
        }

        decision
    }

    fn evaluate_message(&self, event: &ActivityEvent, config: &ConfigSnapshot) -> EnforcementDecision {
        let slot = self.subjects.slot(&event.subject_id);
        let mut window = slot.lock();

        let max_entries = (config.spam_message_threshold as usize)
            .max(config.repeat_window as usize)
            .saturating_add(1);
        let view = window.record(event.text(), event.occurred_at, config.spam_window(), max_entries);
        let mut verdict = heuristics::evaluate(&view, event, config);

        let Some(reason) = verdict.reason_code.filter(|_| verdict.detected) else {
            return EnforcementDecision {
                verdict,
                escalation_tier: escalation::current_tier(&window),
                timeout: None,
                audit_records: Vec::new(),
            };
        };

        if reason == ReasonCode::BlockedTerm {
            // Blocked terms are handled on their own and do not count as warnings.
            let term = verdict.detail.clone().unwrap_or_default();
            info!(subject = %event.subject_id, community = %event.community_id, term = %term, "Blocked term detected");
            let record = subject_record(event, AuditKind::BlockedTerm, format!("blocked term: {term}"), Severity::Medium);
            return EnforcementDecision {
                verdict,
                escalation_tier: escalation::current_tier(&window),
                timeout: None,
                audit_records: vec![record],
            };
        }

        let step = escalation::escalate(&mut window, event.occurred_at, config);
        drop(window);

        verdict.recommended_action = step.action;
        let detail = verdict.detail.as_deref().unwrap_or(reason.describe());

        let mut records = vec![subject_record(
            event,
            AuditKind::SpamDetected,
            format!("{reason}: {detail}"),
            Severity::Medium,
        )];
        match step.tier {
            EscalationTier::WarnedTwice => {
                records.push(subject_record(
                    event,
                    AuditKind::SpamWarning,
                    format!("warning {} issued", step.warning_count),
                    Severity::Medium,
                ));
            }
            EscalationTier::Enforced => {
                let secs = step.timeout.map(|t| t.as_secs()).unwrap_or_default();
                records.push(subject_record(
                    event,
                    AuditKind::SpamTimeout,
                    format!("timed out for {secs}s after {} warnings", step.warning_count),
                    Severity::High,
                ));
            }
            EscalationTier::Clean | EscalationTier::WarnedOnce => {}
        }

        info!(
            subject = %event.subject_id,
            community = %event.community_id,
            reason = %reason,
            tier = %step.tier,
            warnings = step.warning_count,
            action = step.action.as_str(),
            "Spam detected"
        );

        EnforcementDecision {
            verdict,
            escalation_tier: step.tier,
            timeout: step.timeout,
            audit_records: records,
        }
    }

    fn evaluate_join(&self, event: &ActivityEvent, config: &ConfigSnapshot) -> EnforcementDecision {
        let verdict = if config.is_enabled(Module::ChannelGuard) {
            let slot = self.communities.slot(&event.community_id);
            let mut window = slot.lock();
            raid::assess_join(&mut window, event, config)
        } else {
            Verdict::clean()
        };

        let mut records = Vec::new();
        if verdict.detected {
            let detail = verdict.detail.clone().unwrap_or_default();
            warn!(community = %event.community_id, subject = %event.subject_id, detail = %detail, "Potential raid");
            records.push(subject_record(event, AuditKind::PotentialRaid, detail.clone(), Severity::High));
            if verdict.recommended_action == Action::Kick {
                records.push(subject_record(
                    event,
                    AuditKind::RaidKick,
                    format!("new account kicked during raid ({detail})"),
                    Severity::High,
                ));
            }
        }
        records.push(subject_record(event, AuditKind::MemberJoin, "member joined", Severity::Low));

        EnforcementDecision {
            verdict,
            escalation_tier: self.tier_of(&event.subject_id),
            timeout: None,
            audit_records: records,
        }
    }

    fn evaluate_leave(&self, event: &ActivityEvent) -> EnforcementDecision {
        EnforcementDecision {
            verdict: Verdict::clean(),
            escalation_tier: self.tier_of(&event.subject_id),
            timeout: None,
            audit_records: vec![subject_record(event, AuditKind::MemberLeave, "member left", Severity::Low)],
        }
    }

    /// Tier without creating a window for an unknown subject.
    fn tier_of(&self, subject_id: &str) -> EscalationTier {
        self.subjects
            .get(subject_id)
            .map(|slot| escalation::current_tier(&slot.lock()))
            .unwrap_or_default()
    }

    /// Subject state as of `now`. Entries outside the spam window are evicted
    /// before `window_len` is counted.
    pub fn subject_state(&self, subject_id: &str, now: DateTime<Utc>) -> Option<SubjectState> {
        let spam_window = self.config.current().spam_window();
        let slot = self.subjects.get(subject_id)?;
        let mut window = slot.lock();
        window.evict(now, spam_window);
        Some(SubjectState {
            warning_count: window.warning_count(),
            tier: escalation::current_tier(&window),
            last_warning_at: window.last_warning_at(),
            window_len: window.view().len(),
        })
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            tracked_subjects: self.subjects.len(),
            tracked_communities: self.communities.len(),
        }
    }

    // ========================================================================
    // Maintenance
    // ========================================================================

    /// Reset one subject whose last warning is older than the reset interval.
    fn reset_subject(&self, subject_id: &str, now: DateTime<Utc>, config: &ConfigSnapshot) -> bool {
        self.subjects
            .get(subject_id)
            .is_some_and(|slot| slot.lock().reset_warnings_if_stale(now, config.warning_reset_after()))
    }

    /// Zero every stale warning count. Returns the number of subjects reset.
    pub fn reset_stale_warnings(&self, now: DateTime<Utc>) -> usize {
        let config = self.config.current();
        let reset = self
            .subjects
            .keys()
            .iter()
            .filter(|id| self.reset_subject(id, now, &config))
            .count();
        if reset > 0 {
            info!(reset, "Stale warnings reset");
        }
        reset
    }

    /// Same as [`reset_stale_warnings`](Self::reset_stale_warnings), yielding
    /// between batches so a large sweep doesn't hog a runtime worker.
    pub async fn reset_stale_warnings_yielding(&self, now: DateTime<Utc>) -> usize {
        let config = self.config.current();
        let mut reset = 0;
        for (i, id) in self.subjects.keys().iter().enumerate() {
            if i > 0 && i % SWEEP_BATCH == 0 {
                tokio::task::yield_now().await;
            }
            if self.reset_subject(id, now, &config) {
                reset += 1;
            }
        }
        if reset > 0 {
            info!(reset, "Stale warnings reset");
        }
        reset
    }

    /// Drop idle subject and community windows. Returns the stats afterwards.
    pub fn evict_idle(&self, now: DateTime<Utc>) -> EngineStats {
        let idle_after = self.config.current().idle_eviction_after();
        let subjects = self
            .subjects
            .keys()
            .iter()
            .filter(|id| self.subjects.remove_if_idle(id, now, idle_after))
            .count();
        let communities = self
            .communities
            .keys()
            .iter()
            .filter(|id| self.communities.remove_if_idle(id, now, idle_after))
            .count();
        self.after_eviction(subjects, communities)
    }

    /// Yielding variant of [`evict_idle`](Self::evict_idle).
    pub async fn evict_idle_yielding(&self, now: DateTime<Utc>) -> EngineStats {
        let idle_after = self.config.current().idle_eviction_after();
        let mut subjects = 0;
        for (i, id) in self.subjects.keys().iter().enumerate() {
            if i > 0 && i % SWEEP_BATCH == 0 {
                tokio::task::yield_now().await;
            }
            if self.subjects.remove_if_idle(id, now, idle_after) {
                subjects += 1;
            }
        }
        let mut communities = 0;
        for (i, id) in self.communities.keys().iter().enumerate() {
            if i > 0 && i % SWEEP_BATCH == 0 {
                tokio::task::yield_now().await;
            }
            if self.communities.remove_if_idle(id, now, idle_after) {
                communities += 1;
            }
        }
        self.after_eviction(subjects, communities)
    }

    fn after_eviction(&self, subjects: usize, communities: usize) -> EngineStats {
        let stats = self.stats();
        metrics::set_tracked(stats.tracked_subjects, stats.tracked_communities);
        if subjects + communities > 0 {
            info!(subjects, communities, remaining = stats.tracked_subjects, "Idle windows evicted");
        } else {
            debug!(remaining = stats.tracked_subjects, "No idle windows");
        }
        stats
    }
}

fn subject_record(
    event: &ActivityEvent,
    kind: AuditKind,
    detail: impl Into<String>,
    severity: Severity,
) -> AuditRecord {
    AuditRecord::new(kind, event.subject_id.as_str(), detail, severity, event.occurred_at)
        .in_community(event.community_id.as_str())
}
