//! Entry point: loads `config.yaml`, wires the sinks and runs the scheduler until Ctrl-C.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;

use interval_monitor::config::{MonitorConfig, spawn_config_reloader};
use interval_monitor::notifier::AlertNotifier;
use interval_monitor::scheduler::{CycleScheduler, SchedulerTiming};
use interval_monitor::sink::LogRenderer;
use interval_monitor::source::BinanceSource;
use interval_monitor::telemetry::TelemetryServer;

/// How often the config file is checked for edits.
const CONFIG_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Formats log timestamps in the system's local timezone instead of UTC.
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = chrono::Local::now();
        write!(w, "{}", now.format("%Y-%m-%dT%H:%M:%S%.3f"))
    }
}

#[tokio::main]
async fn main() {
    // RUST_LOG controls the level, "info" when unset.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_timer(LocalTimer)
        .init();

    // Fail fast: nothing works without a valid config.
    let config_path = MonitorConfig::config_path();
    let cfg = match MonitorConfig::load_from(&config_path) {
        Ok(c) => c,
        Err(e) => {
            error!("❌ Critical Error: Failed to load configuration: {}", e);
            return;
        }
    };

    let timing = match SchedulerTiming::new(cfg.tick_period(), cfg.fetch_timeout()) {
        Ok(t) => t,
        Err(e) => {
            error!("❌ Critical Error: {}", e);
            return;
        }
    };

    let source = match BinanceSource::new(&cfg.source.base_url, cfg.request_timeout()) {
        Ok(s) => s,
        Err(e) => {
            error!("❌ Critical Error: Failed to build HTTP client: {}", e);
            return;
        }
    };

    let created = CycleScheduler::new(Arc::new(source), cfg.settings(), timing);
    let (mut scheduler, handle) = match created {
        Ok(pair) => pair,
        Err(e) => {
            error!("❌ Critical Error: {}", e);
            return;
        }
    };

    scheduler = scheduler.with_sink(Arc::new(LogRenderer));
    if cfg.alerts.enabled {
        scheduler = scheduler.with_sink(Arc::new(AlertNotifier::slack(
            cfg.alerts.slack_webhook_url.clone(),
            cfg.alert_cooldown(),
            cfg.alerts.notify_crossovers,
        )));
    }
    if cfg.telemetry.enabled {
        match TelemetryServer::bind(("127.0.0.1", cfg.telemetry.port)).await {
            Ok(server) => scheduler = scheduler.with_sink(Arc::new(server)),
            Err(e) => error!("❌ [Telemetry] Failed to bind port {}: {}", cfg.telemetry.port, e),
        }
    } else {
        info!("📡 [Telemetry] Disabled by config.");
    }

    info!(
        "🚀 Starting Multi-Interval Monitor for {} ({})",
        cfg.symbol,
        cfg.intervals.iter().map(|i| i.as_str()).collect::<Vec<_>>().join(", ")
    );

    spawn_config_reloader(config_path, cfg, handle.clone(), CONFIG_POLL_INTERVAL);

    let stopper = handle.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("🛑 Ctrl-C received, stopping after the current pass...");
            stopper.stop();
        }
    });

    scheduler.run().await;
}
