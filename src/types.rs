//! Event, verdict, and decision types shared by the engine and its callers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

use crate::audit::AuditRecord;
use crate::security::EscalationTier;

/// Kind of inbound activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Message,
    Join,
    Leave,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Join => "join",
            Self::Leave => "leave",
        }
    }
}

/// Normalized inbound event.
///
/// Built once per platform event by the transport's normalizer and handed to
/// [`Engine::evaluate`](crate::Engine::evaluate). The engine never stores it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEvent {
    pub subject_id: String,
    pub community_id: String,
    pub kind: EventKind,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub mention_count: Option<u32>,
    pub occurred_at: DateTime<Utc>,
    /// Only meaningful for joins.
    #[serde(default)]
    pub account_created_at: Option<DateTime<Utc>>,
}

impl ActivityEvent {
    /// A message event with no mentions.
    pub fn message(
        subject_id: impl Into<String>,
        community_id: impl Into<String>,
        content: impl Into<String>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            community_id: community_id.into(),
            kind: EventKind::Message,
            content: Some(content.into()),
            mention_count: None,
            occurred_at,
            account_created_at: None,
        }
    }

    /// A member join event.
    pub fn join(
        subject_id: impl Into<String>,
        community_id: impl Into<String>,
        occurred_at: DateTime<Utc>,
        account_created_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            community_id: community_id.into(),
            kind: EventKind::Join,
            content: None,
            mention_count: None,
            occurred_at,
            account_created_at,
        }
    }

    /// A member leave event.
    pub fn leave(
        subject_id: impl Into<String>,
        community_id: impl Into<String>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            subject_id: subject_id.into(),
            community_id: community_id.into(),
            kind: EventKind::Leave,
            content: None,
            mention_count: None,
            occurred_at,
            account_created_at: None,
        }
    }

    pub fn with_mentions(mut self, count: u32) -> Self {
        self.mention_count = Some(count);
        self
    }

    /// Message text, or the empty string for non-message events.
    #[inline]
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

/// Severity attached to verdicts and audit records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    /// Parse the stored form. Unknown values map to `None`.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a verdict fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    BlockedTerm,
    Burst,
    Repeat,
    Oversize,
    Mentions,
    PotentialRaid,
    RaidNewAccount,
}

impl ReasonCode {
    /// Stable label used in audit records and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BlockedTerm => "blocked_term",
            Self::Burst => "burst",
            Self::Repeat => "repeat",
            Self::Oversize => "oversize",
            Self::Mentions => "mentions",
            Self::PotentialRaid => "potential_raid",
            Self::RaidNewAccount => "raid_new_account",
        }
    }

    /// Human-readable explanation, suitable for a direct notice.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::BlockedTerm => "message contained a blocked term",
            Self::Burst => "too many messages in a short time",
            Self::Repeat => "repeated message content",
            Self::Oversize => "message too long",
            Self::Mentions => "too many user mentions",
            Self::PotentialRaid => "potential raid",
            Self::RaidNewAccount => "new account during raid window",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Enforcement the transport should apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    #[default]
    None,
    DeleteMessage,
    DeleteAndWarn,
    DeleteAndTimeout,
    Kick,
    NoneLogOnly,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::DeleteMessage => "delete_message",
            Self::DeleteAndWarn => "delete_and_warn",
            Self::DeleteAndTimeout => "delete_and_timeout",
            Self::Kick => "kick",
            Self::NoneLogOnly => "none_log_only",
        }
    }
}

/// Per-event abuse determination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Verdict {
    pub detected: bool,
    pub reason_code: Option<ReasonCode>,
    pub severity: Severity,
    pub recommended_action: Action,
    /// Extra context, e.g. the blocked term that matched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Verdict {
    /// The zero-detection result.
    pub fn clean() -> Self {
        Self {
            detected: false,
            reason_code: None,
            severity: Severity::Low,
            recommended_action: Action::None,
            detail: None,
        }
    }

    pub fn detected(reason: ReasonCode, severity: Severity, action: Action) -> Self {
        Self {
            detected: true,
            reason_code: Some(reason),
            severity,
            recommended_action: action,
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Result of [`Engine::evaluate`](crate::Engine::evaluate).
#[derive(Debug, Clone, Serialize)]
pub struct EnforcementDecision {
    pub verdict: Verdict,
    pub escalation_tier: EscalationTier,
    /// Set only for `DeleteAndTimeout`.
    #[serde(with = "opt_secs", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
    /// Records emitted for this event, primary first.
    pub audit_records: Vec<AuditRecord>,
}

impl EnforcementDecision {
    #[inline]
    pub fn action(&self) -> Action {
        self.verdict.recommended_action
    }
}

mod opt_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&d.as_secs()),
            None => s.serialize_none(),
        }
    }
}
