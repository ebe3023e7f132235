//! chatwarden daemon.
//!
//! Reads newline-delimited JSON activity events on stdin and writes one JSON
//! enforcement decision per line on stdout. The transport that applies the
//! decisions lives outside this process.
//!
//! Usage: `chatwarden [config-path] [audit-db-path]`

use chatwarden::audit::{AuditSink, EmitterOptions, MemorySink, SqliteSink};
use chatwarden::config::{ConfigManager, ConfigSnapshot};
use chatwarden::maintenance::{self, MaintenanceSchedule};
use chatwarden::{ActivityEvent, AuditEmitter, Engine, http, metrics};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// How long shutdown waits for queued audit records to reach the sink.
const AUDIT_FLUSH_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries decisions.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let config_path = args.next().unwrap_or_else(|| "warden.toml".to_string());
    let audit_db = args.next();

    // Audit sink
    let sink: Arc<dyn AuditSink> = match &audit_db {
        Some(path) => Arc::new(SqliteSink::open(path).await.map_err(|e| {
            error!(path = %path, error = %e, "Failed to open audit database");
            e
        })?),
        None => {
            info!("No audit database given. Using in-memory audit ring.");
            Arc::new(MemorySink::default())
        }
    };
    let (audit, audit_worker) = AuditEmitter::spawn(sink, EmitterOptions::default());

    // Configuration
    let config = if Path::new(&config_path).exists() {
        ConfigManager::from_file(&config_path, audit.clone()).map_err(|e| {
            error!(path = %config_path, error = %e, "Failed to load config");
            e
        })?
    } else {
        warn!(path = %config_path, "Config file not found, using defaults until it appears");
        ConfigManager::watching(ConfigSnapshot::default(), &config_path, audit.clone())
    };
    let config = Arc::new(config);

    // Prometheus metrics are optional.
    // Convention: unset or 0 disables the HTTP endpoint.
    let metrics_port = std::env::var("WARDEN_METRICS_PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(0);
    if metrics_port == 0 {
        info!("Metrics endpoint disabled");
    } else {
        metrics::init();
        info!("Metrics initialized");
        tokio::spawn(async move {
            http::run_http_server(metrics_port).await;
        });
        info!(port = metrics_port, "Prometheus HTTP server started");
    }

    let engine = Arc::new(Engine::new(Arc::clone(&config), audit));
    let tasks = maintenance::spawn_all(Arc::clone(&engine), MaintenanceSchedule::default());

    info!(config = %config_path, "chatwarden ready, reading events from stdin");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut evaluated: u64 = 0;

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, shutting down");
                break;
            }
        };
        let Some(line) = line else {
            debug!("stdin closed");
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let event: ActivityEvent = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Skipping malformed event");
                continue;
            }
        };

        let decision = engine.evaluate(&event);
        let mut out = serde_json::to_vec(&decision)?;
        out.push(b'\n');
        stdout.write_all(&out).await?;
        stdout.flush().await?;
        evaluated += 1;
    }

    // Every emitter clone must go before the audit worker can finish.
    tasks.abort_all();
    for handle in [tasks.warning_reset, tasks.config_poll, tasks.idle_eviction] {
        let _ = handle.await;
    }
    drop(engine);
    drop(config);

    match tokio::time::timeout(AUDIT_FLUSH_TIMEOUT, audit_worker).await {
        Ok(_) => debug!("Audit queue flushed"),
        Err(_) => warn!("Timed out flushing audit queue"),
    }

    info!(evaluated, "chatwarden stopped");
    Ok(())
}
