//! Background maintenance tasks.
//!
//! - warning reset: hourly, zeroes warning counts older than the reset interval
//! - config poll: every minute, reloads the config file when it changes
//! - idle eviction: hourly, drops windows with no recent activity
//!
//! Every task uses wall-clock `Utc::now()`; the engine methods they call take
//! the time as a parameter so tests can drive them with a synthetic clock.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{Instrument, debug, info};

use crate::config::ReloadOutcome;
use crate::engine::Engine;
use crate::telemetry::spans;

/// Intervals for the periodic tasks.
#[derive(Debug, Clone, Copy)]
pub struct MaintenanceSchedule {
    pub warning_reset: Duration,
    pub config_poll: Duration,
    pub idle_eviction: Duration,
}

impl Default for MaintenanceSchedule {
    fn default() -> Self {
        Self {
            warning_reset: Duration::from_secs(3600),
            config_poll: Duration::from_secs(60),
            idle_eviction: Duration::from_secs(3600),
        }
    }
}

/// Handles for the spawned tasks. Dropping this does not stop them; call
/// [`abort_all`](Self::abort_all).
pub struct MaintenanceHandles {
    pub warning_reset: JoinHandle<()>,
    pub config_poll: JoinHandle<()>,
    pub idle_eviction: JoinHandle<()>,
}

impl MaintenanceHandles {
    pub fn abort_all(&self) {
        self.warning_reset.abort();
        self.config_poll.abort();
        self.idle_eviction.abort();
    }
}

/// Spawn all periodic tasks on the current runtime.
pub fn spawn_all(engine: Arc<Engine>, schedule: MaintenanceSchedule) -> MaintenanceHandles {
    let warning_reset = {
        let engine = Arc::clone(&engine);
        tokio::spawn(
            async move {
                let mut interval = tokio::time::interval(schedule.warning_reset);
                // The first tick completes immediately; skip it.
                interval.tick().await;
                loop {
                    interval.tick().await;
                    engine.reset_stale_warnings_yielding(Utc::now()).await;
                }
            }
            .instrument(spans::sweep("warning_reset")),
        )
    };
    info!(every_secs = schedule.warning_reset.as_secs(), "Warning reset task started");

    let config_poll = {
        let engine = Arc::clone(&engine);
        tokio::spawn(
            async move {
                let mut interval = tokio::time::interval(schedule.config_poll);
                interval.tick().await;
                loop {
                    interval.tick().await;
                    let manager = Arc::clone(engine.config());
                    // File IO off the runtime workers.
                    match tokio::task::spawn_blocking(move || manager.poll()).await {
                        Ok(ReloadOutcome::Unchanged) => debug!("Config unchanged"),
                        Ok(_) => {}
                        Err(e) => tracing::error!(error = %e, "Config poll task failed"),
                    }
                }
            }
            .instrument(spans::sweep("config_poll")),
        )
    };
    info!(every_secs = schedule.config_poll.as_secs(), "Config poll task started");

    let idle_eviction = tokio::spawn(
        async move {
            let mut interval = tokio::time::interval(schedule.idle_eviction);
            interval.tick().await;
            loop {
                interval.tick().await;
                engine.evict_idle_yielding(Utc::now()).await;
            }
        }
        .instrument(spans::sweep("idle_eviction")),
    );
    info!(every_secs = schedule.idle_eviction.as_secs(), "Idle eviction task started");

    MaintenanceHandles {
        warning_reset,
        config_poll,
        idle_eviction,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditEmitter;
    use crate::config::{ConfigManager, ConfigSnapshot};
    use crate::types::ActivityEvent;

    #[tokio::test(start_paused = true)]
    async fn test_tasks_run_and_abort() {
        let audit = AuditEmitter::disconnected();
        let config = Arc::new(ConfigManager::new(ConfigSnapshot::default(), audit.clone()));
        let engine = Arc::new(Engine::new(config, audit));

        // An event far in the past is idle by wall-clock time.
        let long_ago = Utc::now() - chrono::TimeDelta::days(2);
        engine.evaluate(&ActivityEvent::message("u1", "g1", "hi", long_ago));
        assert_eq!(engine.stats().tracked_subjects, 1);

        let schedule = MaintenanceSchedule {
            warning_reset: Duration::from_secs(10),
            config_poll: Duration::from_secs(10),
            idle_eviction: Duration::from_secs(10),
        };
        let handles = spawn_all(Arc::clone(&engine), schedule);

        tokio::time::sleep(Duration::from_secs(15)).await;
        assert_eq!(engine.stats().tracked_subjects, 0);

        handles.abort_all();
        assert!(handles.idle_eviction.await.unwrap_err().is_cancelled());
    }
}
