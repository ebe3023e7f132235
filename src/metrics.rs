//! Prometheus metrics collection for chatwarden.
//!
//! Every recording helper is a no-op until [`init`] has run, so the engine
//! can be embedded without a metrics registry.
//!
//! - `warden_events_total{kind}` - Events evaluated by kind
//! - `warden_detections_total{reason}` - Verdicts by reason code
//! - `warden_actions_total{action}` - Recommended actions
//! - `warden_eval_duration_seconds` - Evaluation latency histogram
//! - `warden_config_reloads_total{result}` - Reload attempts by outcome

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::OnceLock;

/// Global Prometheus registry for all metrics.
pub static REGISTRY: OnceLock<Registry> = OnceLock::new();

pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(Registry::new)
}

// ========================================================================
// Counters (monotonic increasing)
// ========================================================================

/// Events evaluated, by kind.
pub static EVENTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Detections, by reason code.
pub static DETECTIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Recommended actions, by action.
pub static ACTIONS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Configuration reload attempts, by result.
pub static CONFIG_RELOADS: OnceLock<IntCounterVec> = OnceLock::new();

/// Audit records dropped because the queue was full.
pub static AUDIT_DROPPED: OnceLock<IntCounter> = OnceLock::new();

/// Audit sink failures, by error code.
pub static AUDIT_FAILURES: OnceLock<IntCounterVec> = OnceLock::new();

// ========================================================================
// Gauges (can increase/decrease)
// ========================================================================

/// Subjects currently holding a window.
pub static TRACKED_SUBJECTS: OnceLock<IntGauge> = OnceLock::new();

/// Communities currently holding a join window.
pub static TRACKED_COMMUNITIES: OnceLock<IntGauge> = OnceLock::new();

// ========================================================================
// Histograms
// ========================================================================

/// Evaluation latency.
pub static EVAL_LATENCY: OnceLock<Histogram> = OnceLock::new();

/// Initialize the Prometheus metrics registry.
///
/// Safe to call more than once; only the first call registers.
pub fn init() {
    let r = registry();

    macro_rules! register {
        ($metric:ident, $init:expr) => {
            if $metric.get().is_none() {
                match $init {
                    Ok(m) => {
                        if let Err(e) = r.register(Box::new(m.clone())) {
                            tracing::warn!(error = %e, concat!("Failed to register metric ", stringify!($metric)));
                        }
                        let _ = $metric.set(m);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, concat!("Failed to create metric ", stringify!($metric)));
                    }
                }
            }
        };
    }

    register!(EVENTS_TOTAL, IntCounterVec::new(Opts::new("warden_events_total", "Events evaluated by kind"), &["kind"]));
    register!(DETECTIONS_TOTAL, IntCounterVec::new(Opts::new("warden_detections_total", "Detections by reason"), &["reason"]));
    register!(ACTIONS_TOTAL, IntCounterVec::new(Opts::new("warden_actions_total", "Recommended actions"), &["action"]));
    register!(CONFIG_RELOADS, IntCounterVec::new(Opts::new("warden_config_reloads_total", "Configuration reload attempts"), &["result"]));
    register!(AUDIT_DROPPED, IntCounter::new("warden_audit_dropped_total", "Audit records dropped on a full queue"));
    register!(AUDIT_FAILURES, IntCounterVec::new(Opts::new("warden_audit_failures_total", "Audit sink failures"), &["error"]));
    register!(TRACKED_SUBJECTS, IntGauge::new("warden_tracked_subjects", "Subjects with a live window"));
    register!(TRACKED_COMMUNITIES, IntGauge::new("warden_tracked_communities", "Communities with a live join window"));
    register!(EVAL_LATENCY, Histogram::with_opts(
        HistogramOpts::new("warden_eval_duration_seconds", "Event evaluation latency")
            .buckets(vec![0.000001, 0.000005, 0.00001, 0.00005, 0.0001, 0.0005, 0.001, 0.005])));
}

/// Gather all metrics and encode them in Prometheus text format.
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = registry().gather();
    let mut buffer = vec![];
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode Prometheus metrics");
        return String::new();
    }
    match String::from_utf8(buffer) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!(error = %e, "Prometheus metrics were not valid UTF-8");
            String::new()
        }
    }
}

// ============================================================================
// Recording helpers
// ============================================================================

#[inline]
fn inc_vec(metric: &OnceLock<IntCounterVec>, label: &str) {
    if let Some(c) = metric.get() {
        c.with_label_values(&[label]).inc();
    }
}

#[inline]
pub fn record_event(kind: &str) {
    inc_vec(&EVENTS_TOTAL, kind);
}

#[inline]
pub fn record_detection(reason: &str) {
    inc_vec(&DETECTIONS_TOTAL, reason);
}

#[inline]
pub fn record_action(action: &str) {
    inc_vec(&ACTIONS_TOTAL, action);
}

#[inline]
pub fn record_config_reload(result: &str) {
    inc_vec(&CONFIG_RELOADS, result);
}

#[inline]
pub fn record_audit_dropped() {
    if let Some(c) = AUDIT_DROPPED.get() {
        c.inc();
    }
}

#[inline]
pub fn record_audit_failure(error: &str) {
    inc_vec(&AUDIT_FAILURES, error);
}

#[inline]
pub fn record_eval_latency(duration_secs: f64) {
    if let Some(h) = EVAL_LATENCY.get() {
        h.observe(duration_secs);
    }
}

/// Update the tracked subject/community gauges.
#[inline]
pub fn set_tracked(subjects: usize, communities: usize) {
    if let Some(g) = TRACKED_SUBJECTS.get() {
        g.set(subjects as i64);
    }
    if let Some(g) = TRACKED_COMMUNITIES.get() {
        g.set(communities as i64);
    }
}
