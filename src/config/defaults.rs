//! Default value functions for configuration.
//!
//! Separated into its own module for clarity and reuse.

// =============================================================================
// Anti-spam Defaults
// =============================================================================

pub fn default_spam_message_threshold() -> u32 {
    8
}

pub fn default_spam_window_seconds() -> u64 {
    60
}

pub fn default_repeat_window() -> u32 {
    3
}

pub fn default_max_mentions() -> u32 {
    5
}

pub fn default_max_content_length() -> usize {
    1000
}

// =============================================================================
// Raid Defaults
// =============================================================================

pub fn default_raid_join_threshold() -> u32 {
    10
}

pub fn default_raid_window_seconds() -> u64 {
    300 // 5 minutes
}

pub fn default_min_account_age_days() -> u32 {
    7
}

// =============================================================================
// Escalation Defaults
// =============================================================================

pub fn default_timeout_seconds() -> u64 {
    600 // 10 minutes
}

pub fn default_warning_reset_seconds() -> u64 {
    3600
}

// =============================================================================
// Maintenance Defaults
// =============================================================================

pub fn default_idle_eviction_seconds() -> u64 {
    3600
}
