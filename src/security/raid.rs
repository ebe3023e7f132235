//! Join-rate raid heuristic.
//!
//! Each community keeps the timestamps of recent joins. When the count inside
//! `raid_window_seconds` exceeds `raid_join_threshold`, the join is flagged as
//! a potential raid; if the joining account is also younger than
//! `min_account_age_days`, the recommended action is a kick.

use chrono::{DateTime, TimeDelta, Utc};
use std::collections::VecDeque;

use crate::config::{ConfigSnapshot, Module};
use crate::types::{Action, ActivityEvent, EventKind, ReasonCode, Severity, Verdict};

use super::window::IdleState;

/// Per-community join timestamps.
#[derive(Debug, Default)]
pub struct CommunityJoinWindow {
    joins: VecDeque<DateTime<Utc>>,
    last_join: Option<DateTime<Utc>>,
}

impl CommunityJoinWindow {
    /// Record a join and return how many joins fall inside `window`.
    pub fn record_join(&mut self, at: DateTime<Utc>, window: TimeDelta) -> usize {
        self.joins.push_back(at);
        self.joins.retain(|joined| at - *joined < window);
        if self.last_join.is_none_or(|last| at > last) {
            self.last_join = Some(at);
        }
        self.joins.len()
    }

    pub fn len(&self) -> usize {
        self.joins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joins.is_empty()
    }
}

impl IdleState for CommunityJoinWindow {
    fn last_activity(&self) -> Option<DateTime<Utc>> {
        self.last_join
    }
}

/// Record `event` into `window` and judge it.
///
/// Only join events are considered; everything else is clean. The caller
/// holds the community's lock.
pub fn assess_join(
    window: &mut CommunityJoinWindow,
    event: &ActivityEvent,
    config: &ConfigSnapshot,
) -> Verdict {
    if event.kind != EventKind::Join || !config.is_enabled(Module::ChannelGuard) {
        return Verdict::clean();
    }

    let recent = window.record_join(event.occurred_at, config.raid_window());
    if recent <= config.raid_join_threshold as usize {
        return Verdict::clean();
    }

    let detail = format!("{recent} joins in {}s", config.raid_window_seconds);

    if is_young_account(event, config) {
        Verdict::detected(ReasonCode::RaidNewAccount, Severity::High, Action::Kick).with_detail(detail)
    } else {
        Verdict::detected(ReasonCode::PotentialRaid, Severity::High, Action::NoneLogOnly)
            .with_detail(detail)
    }
}

/// Unknown account age never counts as young.
fn is_young_account(event: &ActivityEvent, config: &ConfigSnapshot) -> bool {
    event
        .account_created_at
        .is_some_and(|created| event.occurred_at - created < config.min_account_age())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn join(i: i64, age_days: Option<i64>) -> ActivityEvent {
        let occurred = at(i);
        ActivityEvent::join(
            format!("u{i}"),
            "g1",
            occurred,
            age_days.map(|d| occurred - TimeDelta::days(d)),
        )
    }

    #[test]
    fn test_below_threshold_clean() {
        let config = ConfigSnapshot::default();
        let mut window = CommunityJoinWindow::default();
        for i in 0..10 {
            assert!(!assess_join(&mut window, &join(i, Some(1)), &config).detected);
        }
    }

    #[test]
    fn test_eleventh_young_join_kicked() {
        let config = ConfigSnapshot::default();
        let mut window = CommunityJoinWindow::default();
        for i in 0..10 {
            assess_join(&mut window, &join(i, Some(30)), &config);
        }
        let v = assess_join(&mut window, &join(10, Some(2)), &config);
        assert_eq!(v.reason_code, Some(ReasonCode::RaidNewAccount));
        assert_eq!(v.recommended_action, Action::Kick);
        assert_eq!(v.severity, Severity::High);
    }

    #[test]
    fn test_eleventh_old_join_logged_only() {
        let config = ConfigSnapshot::default();
        let mut window = CommunityJoinWindow::default();
        for i in 0..10 {
            assess_join(&mut window, &join(i, Some(30)), &config);
        }
        let v = assess_join(&mut window, &join(10, Some(30)), &config);
        assert_eq!(v.reason_code, Some(ReasonCode::PotentialRaid));
        assert_eq!(v.recommended_action, Action::NoneLogOnly);
    }

    #[test]
    fn test_unknown_age_not_kicked() {
        let config = ConfigSnapshot::default();
        let mut window = CommunityJoinWindow::default();
        for i in 0..10 {
            assess_join(&mut window, &join(i, None), &config);
        }
        let v = assess_join(&mut window, &join(10, None), &config);
        assert_eq!(v.recommended_action, Action::NoneLogOnly);
    }

    #[test]
    fn test_joins_outside_window_expire() {
        let config = ConfigSnapshot::default();
        let mut window = CommunityJoinWindow::default();
        for i in 0..10 {
            assess_join(&mut window, &join(i, Some(1)), &config);
        }
        // Five minutes later the earlier burst no longer counts.
        let v = assess_join(&mut window, &join(400, Some(1)), &config);
        assert!(!v.detected);
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn test_channel_guard_disabled() {
        let mut config = EngineConfig::default();
        config.module_flags.insert("channel_guard".into(), false);
        let config = ConfigSnapshot::compile(config).unwrap();
        let mut window = CommunityJoinWindow::default();
        for i in 0..20 {
            assert!(!assess_join(&mut window, &join(i, Some(0)), &config).detected);
        }
        assert!(window.is_empty());
    }
}
