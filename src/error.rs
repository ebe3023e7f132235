//! Unified error handling for chatwarden.
//!
//! None of these errors is fatal to the process. Configuration errors abort a
//! reload and keep the previous snapshot; audit errors are logged and
//! swallowed by the emitter. Evaluation itself has no error path.

use thiserror::Error;

use crate::config::ValidationError;

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration source could not be turned into a snapshot.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid config: {}", join_errors(.0))]
    Invalid(Vec<ValidationError>),

    #[error("failed to build blocked-term matcher: {0}")]
    Matcher(String),
}

impl ConfigError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Toml(_) | Self::Json(_) => "parse",
            Self::Invalid(_) => "invalid",
            Self::Matcher(_) => "matcher",
        }
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

// ============================================================================
// Audit Errors
// ============================================================================

/// The audit sink could not accept or answer a request.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit sink unavailable: {0}")]
    Unavailable(String),

    #[error("audit sink call timed out")]
    Timeout,

    #[error("audit database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("audit migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

impl AuditError {
    /// Get a static error code string for metrics labeling.
    #[inline]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unavailable(_) => "unavailable",
            Self::Timeout => "timeout",
            Self::Database(_) => "database",
            Self::Migration(_) => "migration",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_codes() {
        let invalid = ConfigError::Invalid(vec![ValidationError::ZeroWindow("spam_window_seconds")]);
        assert_eq!(invalid.error_code(), "invalid");
        assert!(invalid.to_string().contains("spam_window_seconds"));

        let toml_err = toml::from_str::<toml::Value>("= broken").unwrap_err();
        assert_eq!(ConfigError::from(toml_err).error_code(), "parse");
    }

    #[test]
    fn test_invalid_lists_all_errors() {
        let err = ConfigError::Invalid(vec![
            ValidationError::ZeroWindow("raid_window_seconds"),
            ValidationError::RepeatWindowTooSmall(1),
        ]);
        let text = err.to_string();
        assert!(text.contains("raid_window_seconds"));
        assert!(text.contains("repeat_window"));
    }

    #[test]
    fn test_audit_error_codes() {
        assert_eq!(AuditError::Timeout.error_code(), "timeout");
        assert_eq!(AuditError::Unavailable("down".into()).error_code(), "unavailable");
    }
}
