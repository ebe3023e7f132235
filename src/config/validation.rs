//! Configuration validation.
//!
//! A document that parses can still carry values that would make the engine
//! flag every event or none. Those are rejected here, all at once.

use super::EngineConfig;
use thiserror::Error;

/// Validation errors for configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{0} must be greater than zero")]
    ZeroWindow(&'static str),
    #[error("{0} must be greater than zero")]
    ZeroThreshold(&'static str),
    #[error("repeat_window must be at least 2, got {0}")]
    RepeatWindowTooSmall(u32),
    #[error("blocked_terms entry {0} is empty")]
    EmptyBlockedTerm(usize),
}

/// Validate a configuration, returning all errors found.
pub fn validate(config: &EngineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let windows = [
        ("spam_window_seconds", config.spam_window_seconds),
        ("raid_window_seconds", config.raid_window_seconds),
        ("warning_reset_seconds", config.warning_reset_seconds),
        ("idle_eviction_seconds", config.idle_eviction_seconds),
    ];
    for (name, value) in windows {
        if value == 0 {
            errors.push(ValidationError::ZeroWindow(name));
        }
    }

    // A zero threshold would flag every single event.
    if config.spam_message_threshold == 0 {
        errors.push(ValidationError::ZeroThreshold("spam_message_threshold"));
    }
    if config.max_content_length == 0 {
        errors.push(ValidationError::ZeroThreshold("max_content_length"));
    }
    if config.raid_join_threshold == 0 {
        errors.push(ValidationError::ZeroThreshold("raid_join_threshold"));
    }

    if config.repeat_window < 2 {
        errors.push(ValidationError::RepeatWindowTooSmall(config.repeat_window));
    }

    for (idx, term) in config.blocked_terms.iter().enumerate() {
        if term.trim().is_empty() {
            errors.push(ValidationError::EmptyBlockedTerm(idx));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
