//! Detection core.
//!
//! - **Windows**: per-subject message history and per-community join history
//! - **Heuristics**: blocked terms plus burst/repeat/oversize/mention checks
//! - **Escalation**: warning ladder from Clean to Enforced
//! - **Raid**: join-rate detection with an account-age gate
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                    Security Module                      │
//! ├──────────────┬──────────────┬─────────────┬─────────────┤
//! │   Windows    │  Heuristics  │ Escalation  │    Raid     │
//! │ DashMap+Mutex│ Aho-Corasick │ Tier ladder │ Join window │
//! │ per key      │ priority     │ per subject │ per guild   │
//! └──────────────┴──────────────┴─────────────┴─────────────┘
//! ```

pub mod escalation;
pub mod heuristics;
pub mod raid;
pub mod window;

pub use escalation::{EscalationTier, Step};
pub use raid::CommunityJoinWindow;
pub use window::{IdleState, SubjectWindow, WindowEntry, WindowStore, WindowView};
