//! Configuration loading and management.
//!
//! This module is split into logical submodules:
//! - [`types`]: The on-disk document (EngineConfig) and module toggles
//! - [`defaults`]: Serde default values
//! - [`validation`]: Range checks applied before a document goes live
//! - [`snapshot`]: Compiled, immutable runtime form (ConfigSnapshot)
//! - [`manager`]: Atomic snapshot swaps and file polling (ConfigManager)

mod defaults;
mod manager;
mod snapshot;
mod types;
mod validation;

pub use manager::{ConfigManager, ReloadOutcome};
pub use snapshot::ConfigSnapshot;
pub use types::{ConfigFormat, EngineConfig, Module};
pub use validation::{ValidationError, validate};
