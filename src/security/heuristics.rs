//! Message heuristics.
//!
//! Pure functions over a subject's window and the active snapshot. Checks run
//! in priority order and the first hit wins:
//!
//! 1. blocked term (`auto_mod`)
//! 2. burst: more than `spam_message_threshold` messages in the window
//! 3. repeat: the last `repeat_window` messages are identical
//! 4. oversize: more than `max_content_length` characters
//! 5. mentions: more than `max_mentions` mentions
//!
//! Checks 2-5 belong to `anti_spam`.

use crate::config::{ConfigSnapshot, Module};
use crate::types::{Action, ActivityEvent, EventKind, ReasonCode, Severity, Verdict};

use super::window::WindowView;

/// Evaluate a message event against the window it was just recorded into.
///
/// Non-message events are always clean here; joins go through the raid
/// heuristic instead.
pub fn evaluate(view: &WindowView<'_>, event: &ActivityEvent, config: &ConfigSnapshot) -> Verdict {
    if event.kind != EventKind::Message {
        return Verdict::clean();
    }

    let content = event.text();

    if config.is_enabled(Module::AutoMod)
        && let Some(term) = config.find_blocked_term(content)
    {
        return Verdict::detected(ReasonCode::BlockedTerm, Severity::Medium, Action::DeleteAndWarn)
            .with_detail(term);
    }

    if !config.is_enabled(Module::AntiSpam) {
        return Verdict::clean();
    }

    if let Some(verdict) = check_burst(view, config)
        .or_else(|| check_repeat(view, config))
        .or_else(|| check_oversize(content, config))
        .or_else(|| check_mentions(event, config))
    {
        return verdict;
    }

    Verdict::clean()
}

fn spam(reason: ReasonCode) -> Verdict {
    // Escalation replaces the action with the tier's action.
    Verdict::detected(reason, Severity::Medium, Action::DeleteMessage)
}

fn check_burst(view: &WindowView<'_>, config: &ConfigSnapshot) -> Option<Verdict> {
    let threshold = config.spam_message_threshold as usize;
    (view.len() > threshold).then(|| {
        spam(ReasonCode::Burst).with_detail(format!(
            "{} messages in {}s",
            view.len(),
            config.spam_window_seconds
        ))
    })
}

fn check_repeat(view: &WindowView<'_>, config: &ConfigSnapshot) -> Option<Verdict> {
    let n = config.repeat_window as usize;
    if view.len() < n {
        return None;
    }
    let mut latest = view.latest(n);
    let first = latest.next()?;
    latest
        .all(|entry| entry.content == first.content)
        .then(|| spam(ReasonCode::Repeat).with_detail(format!("same message {n} times")))
}

fn check_oversize(content: &str, config: &ConfigSnapshot) -> Option<Verdict> {
    let length = content.chars().count();
    (length > config.max_content_length)
        .then(|| spam(ReasonCode::Oversize).with_detail(format!("{length} characters")))
}

fn check_mentions(event: &ActivityEvent, config: &ConfigSnapshot) -> Option<Verdict> {
    let mentions = event.mention_count.unwrap_or(0);
    (mentions > config.max_mentions)
        .then(|| spam(ReasonCode::Mentions).with_detail(format!("{mentions} mentions")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::security::window::SubjectWindow;
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn snapshot(terms: &[&str]) -> ConfigSnapshot {
        ConfigSnapshot::compile(EngineConfig {
            blocked_terms: terms.iter().map(|t| t.to_string()).collect(),
            ..EngineConfig::default()
        })
        .unwrap()
    }

    /// Record every message into a fresh window and evaluate the last one.
    fn run(messages: &[&str], config: &ConfigSnapshot) -> Verdict {
        let mut window = SubjectWindow::default();
        let mut verdict = Verdict::clean();
        for (i, text) in messages.iter().enumerate() {
            let event = ActivityEvent::message("u1", "g1", *text, at(i as i64));
            let view = window.record(text, event.occurred_at, TimeDelta::seconds(60), 64);
            verdict = evaluate(&view, &event, config);
        }
        verdict
    }

    #[test]
    fn test_clean_message() {
        let v = run(&["hello there"], &snapshot(&[]));
        assert!(!v.detected);
    }

    #[test]
    fn test_burst_on_ninth_message() {
        let config = snapshot(&[]);
        let msgs: Vec<String> = (0..9).map(|i| format!("msg {i}")).collect();
        let refs: Vec<&str> = msgs.iter().map(String::as_str).collect();

        assert!(!run(&refs[..8], &config).detected);
        let v = run(&refs, &config);
        assert_eq!(v.reason_code, Some(ReasonCode::Burst));
        assert_eq!(v.severity, Severity::Medium);
    }

    #[test]
    fn test_repeat_detected() {
        let v = run(&["buy now", "buy now", "buy now"], &snapshot(&[]));
        assert_eq!(v.reason_code, Some(ReasonCode::Repeat));
    }

    #[test]
    fn test_interleaved_repeat_not_detected() {
        let v = run(&["buy now", "buy now", "hello", "buy now"], &snapshot(&[]));
        assert!(!v.detected);
    }

    #[test]
    fn test_oversize_counts_characters() {
        let config = snapshot(&[]);
        let exactly = "é".repeat(1000);
        assert!(!run(&[exactly.as_str()], &config).detected);
        let over = "é".repeat(1001);
        assert_eq!(run(&[over.as_str()], &config).reason_code, Some(ReasonCode::Oversize));
    }

    #[test]
    fn test_mentions_over_limit() {
        let config = snapshot(&[]);
        let mut window = SubjectWindow::default();
        let event = ActivityEvent::message("u1", "g1", "hey all", at(0)).with_mentions(6);
        let view = window.record(event.text(), event.occurred_at, TimeDelta::seconds(60), 64);
        assert_eq!(evaluate(&view, &event, &config).reason_code, Some(ReasonCode::Mentions));

        let mut window = SubjectWindow::default();
        let event = ActivityEvent::message("u1", "g1", "hey all", at(0)).with_mentions(5);
        let view = window.record(event.text(), event.occurred_at, TimeDelta::seconds(60), 64);
        assert!(!evaluate(&view, &event, &config).detected);
    }

    #[test]
    fn test_blocked_term_wins_over_oversize() {
        let config = snapshot(&["forbidden"]);
        let text = format!("{} FORBIDDEN", "x".repeat(2000));
        let v = run(&[text.as_str()], &config);
        assert_eq!(v.reason_code, Some(ReasonCode::BlockedTerm));
        assert_eq!(v.recommended_action, Action::DeleteAndWarn);
        assert_eq!(v.detail.as_deref(), Some("forbidden"));
    }

    #[test]
    fn test_disabled_anti_spam_skips_spam_checks() {
        let mut config = EngineConfig {
            blocked_terms: vec!["forbidden".into()],
            ..EngineConfig::default()
        };
        config.module_flags.insert("anti_spam".into(), false);
        let config = ConfigSnapshot::compile(config).unwrap();

        assert!(!run(&["same", "same", "same"], &config).detected);
        assert_eq!(
            run(&["forbidden"], &config).reason_code,
            Some(ReasonCode::BlockedTerm)
        );
    }

    #[test]
    fn test_disabled_auto_mod_skips_blocked_terms() {
        let mut config = EngineConfig {
            blocked_terms: vec!["forbidden".into()],
            ..EngineConfig::default()
        };
        config.module_flags.insert("auto_mod".into(), false);
        let config = ConfigSnapshot::compile(config).unwrap();
        assert!(!run(&["forbidden"], &config).detected);
    }

    #[test]
    fn test_join_is_clean_here() {
        let config = snapshot(&[]);
        let window = SubjectWindow::default();
        let event = ActivityEvent::join("u1", "g1", at(0), None);
        assert!(!evaluate(&window.view(), &event, &config).detected);
    }
}
