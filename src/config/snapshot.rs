//! Immutable runtime configuration.

use aho_corasick::AhoCorasick;
use chrono::TimeDelta;
use std::collections::HashMap;
use std::time::Duration;

use super::types::{EngineConfig, Module};
use super::validation::validate;
use crate::error::ConfigError;

/// The effective tunables, shared read-only by every evaluation.
///
/// Built with [`ConfigSnapshot::compile`] and never mutated afterwards; a
/// reload publishes a whole new snapshot instead.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    /// Lower-cased, de-duplicated, in file order.
    pub blocked_terms: Vec<String>,
    pub spam_message_threshold: u32,
    pub spam_window_seconds: u64,
    pub repeat_window: u32,
    pub max_mentions: u32,
    pub max_content_length: usize,
    pub raid_join_threshold: u32,
    pub raid_window_seconds: u64,
    pub min_account_age_days: u32,
    pub timeout_seconds: u64,
    pub warning_reset_seconds: u64,
    pub idle_eviction_seconds: u64,
    pub module_flags: HashMap<String, bool>,
    /// Matches `blocked_terms` against lower-cased content. `None` when empty.
    matcher: Option<AhoCorasick>,
}

impl ConfigSnapshot {
    /// Validate and compile a parsed document.
    pub fn compile(config: EngineConfig) -> Result<Self, ConfigError> {
        validate(&config).map_err(ConfigError::Invalid)?;

        let mut blocked_terms: Vec<String> = Vec::with_capacity(config.blocked_terms.len());
        for term in &config.blocked_terms {
            let lowered = term.trim().to_lowercase();
            if !blocked_terms.contains(&lowered) {
                blocked_terms.push(lowered);
            }
        }

        let matcher = if blocked_terms.is_empty() {
            None
        } else {
            Some(AhoCorasick::new(&blocked_terms).map_err(|e| ConfigError::Matcher(e.to_string()))?)
        };

        Ok(Self {
            blocked_terms,
            spam_message_threshold: config.spam_message_threshold,
            spam_window_seconds: config.spam_window_seconds,
            repeat_window: config.repeat_window,
            max_mentions: config.max_mentions,
            max_content_length: config.max_content_length,
            raid_join_threshold: config.raid_join_threshold,
            raid_window_seconds: config.raid_window_seconds,
            min_account_age_days: config.min_account_age_days,
            timeout_seconds: config.timeout_seconds,
            warning_reset_seconds: config.warning_reset_seconds,
            idle_eviction_seconds: config.idle_eviction_seconds,
            module_flags: config.module_flags,
            matcher,
        })
    }

    /// Whether a module is switched on. Absent flags count as enabled.
    pub fn is_enabled(&self, module: Module) -> bool {
        self.module_flags.get(module.name()).copied().unwrap_or(true)
    }

    /// First blocked term found in `content`, compared case-insensitively.
    pub fn find_blocked_term(&self, content: &str) -> Option<&str> {
        let matcher = self.matcher.as_ref()?;
        let lowered = content.to_lowercase();
        matcher
            .find(&lowered)
            .map(|m| self.blocked_terms[m.pattern().as_usize()].as_str())
    }

    pub fn spam_window(&self) -> TimeDelta {
        secs(self.spam_window_seconds)
    }

    pub fn raid_window(&self) -> TimeDelta {
        secs(self.raid_window_seconds)
    }

    pub fn min_account_age(&self) -> TimeDelta {
        TimeDelta::try_days(i64::from(self.min_account_age_days)).unwrap_or(TimeDelta::MAX)
    }

    pub fn warning_reset_after(&self) -> TimeDelta {
        secs(self.warning_reset_seconds)
    }

    pub fn idle_eviction_after(&self) -> TimeDelta {
        secs(self.idle_eviction_seconds)
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for ConfigSnapshot {
    fn default() -> Self {
        // Defaults always pass validation and carry no blocked terms.
        let config = EngineConfig::default();
        Self {
            blocked_terms: Vec::new(),
            spam_message_threshold: config.spam_message_threshold,
            spam_window_seconds: config.spam_window_seconds,
            repeat_window: config.repeat_window,
            max_mentions: config.max_mentions,
            max_content_length: config.max_content_length,
            raid_join_threshold: config.raid_join_threshold,
            raid_window_seconds: config.raid_window_seconds,
            min_account_age_days: config.min_account_age_days,
            timeout_seconds: config.timeout_seconds,
            warning_reset_seconds: config.warning_reset_seconds,
            idle_eviction_seconds: config.idle_eviction_seconds,
            module_flags: config.module_flags,
            matcher: None,
        }
    }
}

fn secs(value: u64) -> TimeDelta {
    i64::try_from(value)
        .ok()
        .and_then(TimeDelta::try_seconds)
        .unwrap_or(TimeDelta::MAX)
}
