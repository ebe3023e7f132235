//! Telemetry utilities for evaluation timing and tracing spans.

use std::time::Instant;

/// Guard for timing one evaluation and recording metrics.
///
/// Records evaluation latency when dropped.
pub struct EvalTimer {
    start: Instant,
}

impl EvalTimer {
    /// Start timing an evaluation.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for EvalTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for EvalTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        crate::metrics::record_eval_latency(duration);
    }
}

/// Standardized span constructors.
pub mod spans {
    use tracing::{Span, debug_span, info_span};

    /// Span for evaluating one event.
    pub fn evaluate(kind: &str, subject: &str, community: &str) -> Span {
        debug_span!("evaluate", kind = %kind, subject = %subject, community = %community)
    }

    /// Span for a periodic maintenance task.
    pub fn sweep(task: &'static str) -> Span {
        info_span!("sweep", task = task)
    }
}
