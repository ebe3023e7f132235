//! Per-subject escalation ladder.
//!
//! ```text
//! Clean --detect--> WarnedOnce --detect--> WarnedTwice --detect--> Enforced
//!   ^                                                                 |
//!   +------------------- stale-warning sweep -------------------------+
//! ```
//!
//! The tier is always derived from the subject's warning count, so the
//! count and the tier cannot disagree. Enforced is absorbing: further
//! detections keep counting but stay Enforced until the sweep resets them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::config::ConfigSnapshot;
use crate::types::Action;

use super::window::SubjectWindow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EscalationTier {
    #[default]
    Clean,
    WarnedOnce,
    WarnedTwice,
    Enforced,
}

impl EscalationTier {
    /// Warnings needed to reach `Enforced`.
    pub const ENFORCE_AT: u32 = 3;

    pub fn from_warnings(count: u32) -> Self {
        match count {
            0 => Self::Clean,
            1 => Self::WarnedOnce,
            2 => Self::WarnedTwice,
            _ => Self::Enforced,
        }
    }

    /// Tier after one more detection.
    pub fn next(self) -> Self {
        match self {
            Self::Clean => Self::WarnedOnce,
            Self::WarnedOnce => Self::WarnedTwice,
            Self::WarnedTwice | Self::Enforced => Self::Enforced,
        }
    }

    /// Action recommended on entering (or staying in) this tier.
    pub fn action(self) -> Action {
        match self {
            Self::Clean => Action::None,
            Self::WarnedOnce => Action::DeleteMessage,
            Self::WarnedTwice => Action::DeleteAndWarn,
            Self::Enforced => Action::DeleteAndTimeout,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clean => "clean",
            Self::WarnedOnce => "warned_once",
            Self::WarnedTwice => "warned_twice",
            Self::Enforced => "enforced",
        }
    }
}

impl fmt::Display for EscalationTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one escalation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub tier: EscalationTier,
    pub action: Action,
    pub warning_count: u32,
    /// Present only when the step enforces.
    pub timeout: Option<Duration>,
}

/// Advance `window` by one detection at `at`.
///
/// Caller must hold the subject's lock for the whole record/evaluate/escalate
/// sequence.
pub fn escalate(window: &mut SubjectWindow, at: DateTime<Utc>, config: &ConfigSnapshot) -> Step {
    let expected = EscalationTier::from_warnings(window.warning_count()).next();
    let warning_count = window.register_warning(at);
    let tier = EscalationTier::from_warnings(warning_count);
    debug_assert_eq!(tier, expected);

    let action = tier.action();
    let timeout = (tier == EscalationTier::Enforced).then(|| config.timeout_duration());

    Step {
        tier,
        action,
        warning_count,
        timeout,
    }
}

/// Current tier without advancing.
#[inline]
pub fn current_tier(window: &SubjectWindow) -> EscalationTier {
    EscalationTier::from_warnings(window.warning_count())
}
