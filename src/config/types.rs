//! Core configuration types and loading.

use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use super::defaults::*;
use crate::error::ConfigError;

/// On-disk document format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Json,
}

impl ConfigFormat {
    /// Pick the format from a file extension. Anything but `.json` is TOML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Toml,
        }
    }
}

/// Engine tunables as written in the configuration file.
///
/// Unknown fields are ignored and missing fields take their defaults, so a
/// minimal file only needs the values an operator wants to change. Use
/// [`ConfigSnapshot::compile`](super::ConfigSnapshot::compile) to turn this
/// into the runtime form.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EngineConfig {
    /// Terms matched case-insensitively as substrings of message content.
    #[serde(default, alias = "blocked_words")]
    pub blocked_terms: Vec<String>,
    /// Window size above which a subject is bursting.
    #[serde(default = "default_spam_message_threshold")]
    pub spam_message_threshold: u32,
    /// Per-subject message window (seconds).
    #[serde(default = "default_spam_window_seconds")]
    pub spam_window_seconds: u64,
    /// How many trailing identical messages count as repetition.
    #[serde(default = "default_repeat_window")]
    pub repeat_window: u32,
    /// Mentions allowed in a single message.
    #[serde(default = "default_max_mentions")]
    pub max_mentions: u32,
    /// Characters allowed in a single message.
    #[serde(default = "default_max_content_length")]
    pub max_content_length: usize,
    /// Joins within the raid window above which a raid is reported.
    #[serde(default = "default_raid_join_threshold")]
    pub raid_join_threshold: u32,
    /// Per-community join window (seconds).
    #[serde(default = "default_raid_window_seconds")]
    pub raid_window_seconds: u64,
    /// Accounts younger than this are kicked during a raid.
    #[serde(default = "default_min_account_age_days")]
    pub min_account_age_days: u32,
    /// Duration of the timeout applied at the enforced tier (seconds).
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Warnings older than this are cleared by the reset sweep (seconds).
    #[serde(default = "default_warning_reset_seconds")]
    pub warning_reset_seconds: u64,
    /// Windows idle for longer than this are dropped from memory (seconds).
    #[serde(default = "default_idle_eviction_seconds")]
    pub idle_eviction_seconds: u64,
    /// Module toggles. Absent modules are enabled.
    #[serde(default, alias = "modules")]
    pub module_flags: HashMap<String, bool>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            blocked_terms: Vec::new(),
            spam_message_threshold: default_spam_message_threshold(),
            spam_window_seconds: default_spam_window_seconds(),
            repeat_window: default_repeat_window(),
            max_mentions: default_max_mentions(),
            max_content_length: default_max_content_length(),
            raid_join_threshold: default_raid_join_threshold(),
            raid_window_seconds: default_raid_window_seconds(),
            min_account_age_days: default_min_account_age_days(),
            timeout_seconds: default_timeout_seconds(),
            warning_reset_seconds: default_warning_reset_seconds(),
            idle_eviction_seconds: default_idle_eviction_seconds(),
            module_flags: HashMap::new(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from a TOML or JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content, ConfigFormat::from_path(path))
    }

    /// Parse a document. Does not validate value ranges.
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        let config = match format {
            ConfigFormat::Toml => toml::from_str(content)?,
            ConfigFormat::Json => serde_json::from_str(content)?,
        };
        Ok(config)
    }
}

/// Named module toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Module {
    /// Blocked-term matching.
    AutoMod,
    /// Burst, repetition, oversize and mention heuristics.
    AntiSpam,
    /// Raid detection on joins.
    ChannelGuard,
}

impl Module {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AutoMod => "auto_mod",
            Self::AntiSpam => "anti_spam",
            Self::ChannelGuard => "channel_guard",
        }
    }
}
