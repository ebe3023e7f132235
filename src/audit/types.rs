//! Type definitions for audit records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::types::Severity;

/// Subject id used for records that are not about a member.
pub const SYSTEM_SUBJECT: &str = "system";

/// What an audit record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    BlockedTerm,
    SpamDetected,
    SpamWarning,
    SpamTimeout,
    PotentialRaid,
    RaidKick,
    MemberJoin,
    MemberLeave,
    ConfigParseError,
    ConfigReloaded,
}

impl AuditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BlockedTerm => "blocked_term",
            Self::SpamDetected => "spam_detected",
            Self::SpamWarning => "spam_warning",
            Self::SpamTimeout => "spam_timeout",
            Self::PotentialRaid => "potential_raid",
            Self::RaidKick => "raid_kick",
            Self::MemberJoin => "member_join",
            Self::MemberLeave => "member_leave",
            Self::ConfigParseError => "config_parse_error",
            Self::ConfigReloaded => "config_reloaded",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let kind = match s {
            "blocked_term" => Self::BlockedTerm,
            "spam_detected" => Self::SpamDetected,
            "spam_warning" => Self::SpamWarning,
            "spam_timeout" => Self::SpamTimeout,
            "potential_raid" => Self::PotentialRaid,
            "raid_kick" => Self::RaidKick,
            "member_join" => Self::MemberJoin,
            "member_leave" => Self::MemberLeave,
            "config_parse_error" => Self::ConfigParseError,
            "config_reloaded" => Self::ConfigReloaded,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for AuditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One append-only security event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub kind: AuditKind,
    /// Member the record is about, or [`SYSTEM_SUBJECT`].
    pub subject_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub community_id: Option<String>,
    pub detail: String,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(
        kind: AuditKind,
        subject_id: impl Into<String>,
        detail: impl Into<String>,
        severity: Severity,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
            subject_id: subject_id.into(),
            community_id: None,
            detail: detail.into(),
            severity,
            timestamp,
        }
    }

    /// A record not tied to any member.
    pub fn system(
        kind: AuditKind,
        detail: impl Into<String>,
        severity: Severity,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self::new(kind, SYSTEM_SUBJECT, detail, severity, timestamp)
    }

    pub fn in_community(mut self, community_id: impl Into<String>) -> Self {
        self.community_id = Some(community_id.into());
        self
    }
}

/// Query-by-filter over stored records. Results are newest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditFilter {
    pub subject_id: Option<String>,
    pub community_id: Option<String>,
    pub severity: Option<Severity>,
    /// Empty means any kind.
    pub kinds: Vec<AuditKind>,
    pub since: Option<DateTime<Utc>>,
    pub limit: usize,
}

impl Default for AuditFilter {
    fn default() -> Self {
        Self {
            subject_id: None,
            community_id: None,
            severity: None,
            kinds: Vec::new(),
            since: None,
            limit: Self::DEFAULT_LIMIT,
        }
    }
}

impl AuditFilter {
    pub const DEFAULT_LIMIT: usize = 100;

    pub fn subject(mut self, subject_id: impl Into<String>) -> Self {
        self.subject_id = Some(subject_id.into());
        self
    }

    pub fn community(mut self, community_id: impl Into<String>) -> Self {
        self.community_id = Some(community_id.into());
        self
    }

    pub fn severity(mut self, severity: Severity) -> Self {
        self.severity = Some(severity);
        self
    }

    pub fn kind(mut self, kind: AuditKind) -> Self {
        self.kinds.push(kind);
        self
    }

    pub fn since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// In-memory predicate, matching what the SQL backends do.
    pub fn matches(&self, record: &AuditRecord) -> bool {
        if let Some(subject) = &self.subject_id
            && record.subject_id != *subject
        {
            return false;
        }
        if let Some(community) = &self.community_id
            && record.community_id.as_deref() != Some(community.as_str())
        {
            return false;
        }
        if let Some(severity) = self.severity
            && record.severity != severity
        {
            return false;
        }
        if !self.kinds.is_empty() && !self.kinds.contains(&record.kind) {
            return false;
        }
        if let Some(since) = self.since
            && record.timestamp < since
        {
            return false;
        }
        true
    }
}
