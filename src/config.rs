//! `config.yaml` loading, validation and hot reload.

use serde::Deserialize;
use std::fs;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::engine::AnalysisParams;
use crate::error::ConfigError;
use crate::models::Interval;
use crate::scheduler::SchedulerHandle;
use crate::source::binance::DEFAULT_BASE_URL;

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Environment variable overriding the config file location.
pub const CONFIG_PATH_ENV: &str = "MONITOR_CONFIG";

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Delay between the starts of two consecutive passes.
    pub tick_secs: u64,
    /// Upper bound for a single interval fetch.
    pub fetch_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { tick_secs: 60, fetch_timeout_secs: 20 }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct SourceConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct AlertConfig {
    pub enabled: bool,
    pub slack_webhook_url: String,
    pub cooldown_secs: u64,
    pub notify_crossovers: bool,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            slack_webhook_url: String::new(),
            cooldown_secs: 300,
            notify_crossovers: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct TelemetryConfig {
    pub enabled: bool,
    pub port: u16,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self { enabled: false, port: 9001 }
    }
}

/// What the scheduler evaluates each pass. Can be swapped at runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorSettings {
    pub symbol: String,
    pub intervals: Vec<Interval>,
    pub params: AnalysisParams,
}

impl MonitorSettings {
    /// Normalises the symbol and drops repeated intervals, keeping first-seen order.
    pub fn new(symbol: &str, intervals: &[Interval], params: AnalysisParams) -> Self {
        let mut unique = Vec::with_capacity(intervals.len());
        for interval in intervals {
            if !unique.contains(interval) {
                unique.push(*interval);
            }
        }
        Self {
            symbol: symbol.trim().to_uppercase(),
            intervals: unique,
            params,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbol.is_empty() {
            return Err(ConfigError::invalid("symbol is empty"));
        }
        if self.intervals.is_empty() {
            return Err(ConfigError::invalid("no intervals configured"));
        }
        self.params.validate().map_err(ConfigError::Invalid)?;
        if self.params.fast_period >= self.params.slow_period {
            warn!(
                "⚠️ fast EMA period ({}) is not below slow period ({}); crossovers may mislead",
                self.params.fast_period, self.params.slow_period
            );
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct MonitorConfig {
    pub symbol: String,
    pub intervals: Vec<Interval>,
    pub analysis: AnalysisParams,
    pub scheduler: SchedulerConfig,
    pub source: SourceConfig,
    pub alerts: AlertConfig,
    pub telemetry: TelemetryConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            intervals: vec![Interval::M1, Interval::M5, Interval::M15, Interval::M30],
            analysis: AnalysisParams::default(),
            scheduler: SchedulerConfig::default(),
            source: SourceConfig::default(),
            alerts: AlertConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// `config.yaml` in the working directory, or the file named by `MONITOR_CONFIG`.
    pub fn config_path() -> String {
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
    }

    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let yaml_content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_string(),
            source,
        })?;

        let config: MonitorConfig =
            serde_yaml::from_str(&yaml_content).map_err(|source| ConfigError::Parse {
                path: path.to_string(),
                source,
            })?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.settings().validate()?;

        if self.scheduler.tick_secs == 0 {
            return Err(ConfigError::invalid("scheduler.tick_secs must be positive"));
        }
        if self.scheduler.fetch_timeout_secs == 0 {
            return Err(ConfigError::invalid("scheduler.fetch_timeout_secs must be positive"));
        }
        if self.source.request_timeout_secs == 0 {
            return Err(ConfigError::invalid("source.request_timeout_secs must be positive"));
        }
        // Alerts need somewhere to go.
        if self.alerts.enabled && self.alerts.slack_webhook_url.trim().is_empty() {
            return Err(ConfigError::invalid("alerts are enabled but slack_webhook_url is empty"));
        }
        Ok(())
    }

    pub fn settings(&self) -> MonitorSettings {
        MonitorSettings::new(&self.symbol, &self.intervals, self.analysis)
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_secs(self.scheduler.tick_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.scheduler.fetch_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.source.request_timeout_secs)
    }

    pub fn alert_cooldown(&self) -> Duration {
        Duration::from_secs(self.alerts.cooldown_secs)
    }
}

/// Watches the config file and pushes edited monitor settings (symbol, intervals,
/// analysis parameters) into the running scheduler. Other sections need a restart.
pub fn spawn_config_reloader(
    path: String,
    initial: MonitorConfig,
    handle: SchedulerHandle,
    poll_every: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut current = initial;
        let mut last_modified = modified_time(&path);
        let mut ticker = tokio::time::interval(poll_every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let modified = modified_time(&path);
            if modified.is_none() || modified == last_modified {
                continue;
            }
            last_modified = modified;

            let reloaded = match MonitorConfig::load_from(&path) {
                Ok(cfg) => cfg,
                Err(e) => {
                    warn!("⚠️ Ignoring edited {}: {}", path, e);
                    continue;
                }
            };

            let settings = reloaded.settings();
            if settings != handle.settings() {
                if let Err(e) = handle.update_settings(settings) {
                    warn!("⚠️ Rejected new settings: {}", e);
                    continue;
                }
            }
            if reloaded.scheduler != current.scheduler
                || reloaded.source != current.source
                || reloaded.alerts != current.alerts
                || reloaded.telemetry != current.telemetry
            {
                warn!(
                    "⚠️ scheduler/source/alerts/telemetry changes in {} need a restart",
                    path
                );
            }
            info!("🔄 Reloaded {}", path);
            current = reloaded;
        }
    })
}

fn modified_time(path: &str) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}
