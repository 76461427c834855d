//! Cycle scheduler: one evaluation pass over every interval per tick.
//!
//! ```text
//!   Idle ──tick──▶ Evaluating ──snapshot published──▶ Idle
//! ```
//!
//! Ticks are spaced `tick_period` apart measured start-to-start. A pass that
//! overruns is followed immediately by the next one. Stop requests are honoured
//! only between passes, so a published snapshot is always complete.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until, timeout};
use tracing::{debug, error, info, warn};

use crate::config::MonitorSettings;
use crate::engine::{AnalysisParams, evaluate_series};
use crate::error::{ConfigError, EvaluationIssue, FetchError};
use crate::models::Interval;
use crate::sink::SnapshotSink;
use crate::snapshot::{EvaluationSnapshot, IntervalSnapshot};
use crate::source::MarketDataSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Evaluating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerTiming {
    pub tick_period: Duration,
    pub fetch_timeout: Duration,
}

impl SchedulerTiming {
    pub fn new(tick_period: Duration, fetch_timeout: Duration) -> Result<Self, ConfigError> {
        if tick_period.is_zero() {
            return Err(ConfigError::invalid("tick period must be positive"));
        }
        if fetch_timeout.is_zero() {
            return Err(ConfigError::invalid("fetch timeout must be positive"));
        }
        Ok(Self { tick_period, fetch_timeout })
    }
}

pub type SnapshotReceiver = watch::Receiver<Option<Arc<EvaluationSnapshot>>>;

/// Control surface of a running scheduler. Cheap to clone.
#[derive(Clone)]
pub struct SchedulerHandle {
    stop_tx: Arc<watch::Sender<bool>>,
    settings_tx: Arc<watch::Sender<MonitorSettings>>,
    snapshot_rx: SnapshotReceiver,
    state_rx: watch::Receiver<SchedulerState>,
}

impl SchedulerHandle {
    /// Asks the scheduler to stop at the next tick boundary.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Replaces symbol, intervals or parameters. Applied from the next pass on.
    pub fn update_settings(&self, settings: MonitorSettings) -> Result<(), ConfigError> {
        settings.validate()?;
        info!(
            "🔧 Settings updated: {} {:?} (fast={}, slow={}, window={}, x{})",
            settings.symbol,
            settings.intervals.iter().map(Interval::as_str).collect::<Vec<_>>(),
            settings.params.fast_period,
            settings.params.slow_period,
            settings.params.window_size,
            settings.params.multiplier
        );
        self.settings_tx.send_replace(settings);
        Ok(())
    }

    pub fn settings(&self) -> MonitorSettings {
        self.settings_tx.borrow().clone()
    }

    /// Most recently published snapshot, if any pass has completed.
    pub fn latest(&self) -> Option<Arc<EvaluationSnapshot>> {
        self.snapshot_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> SnapshotReceiver {
        self.snapshot_rx.clone()
    }

    pub fn state(&self) -> SchedulerState {
        *self.state_rx.borrow()
    }
}

pub struct CycleScheduler {
    source: Arc<dyn MarketDataSource>,
    timing: SchedulerTiming,
    sinks: Vec<Arc<dyn SnapshotSink>>,
    settings_rx: watch::Receiver<MonitorSettings>,
    stop_rx: watch::Receiver<bool>,
    snapshot_tx: watch::Sender<Option<Arc<EvaluationSnapshot>>>,
    state_tx: watch::Sender<SchedulerState>,
}

impl CycleScheduler {
    pub fn new(
        source: Arc<dyn MarketDataSource>,
        settings: MonitorSettings,
        timing: SchedulerTiming,
    ) -> Result<(Self, SchedulerHandle), ConfigError> {
        settings.validate()?;

        let (stop_tx, stop_rx) = watch::channel(false);
        let (settings_tx, settings_rx) = watch::channel(settings);
        let (snapshot_tx, snapshot_rx) = watch::channel(None);
        let (state_tx, state_rx) = watch::channel(SchedulerState::Idle);

        let scheduler = Self {
            source,
            timing,
            sinks: Vec::new(),
            settings_rx,
            stop_rx,
            snapshot_tx,
            state_tx,
        };
        let handle = SchedulerHandle {
            stop_tx: Arc::new(stop_tx),
            settings_tx: Arc::new(settings_tx),
            snapshot_rx,
            state_rx,
        };
        Ok((scheduler, handle))
    }

    pub fn with_sink(mut self, sink: Arc<dyn SnapshotSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Runs passes until a stop is requested through the handle.
    pub async fn run(mut self) {
        info!(
            "🚀 Scheduler started (source: {}, tick: {}s, fetch timeout: {}s)",
            self.source.name(),
            self.timing.tick_period.as_secs_f64(),
            self.timing.fetch_timeout.as_secs_f64()
        );

        let mut tick: u64 = 0;
        loop {
            if *self.stop_rx.borrow() {
                break;
            }

            let pass_start = Instant::now();
            self.state_tx.send_replace(SchedulerState::Evaluating);
            let snapshot = Arc::new(self.run_pass(tick).await);
            self.publish(snapshot);
            self.state_tx.send_replace(SchedulerState::Idle);

            let next_tick = pass_start + self.timing.tick_period;
            let elapsed = pass_start.elapsed();
            if elapsed >= self.timing.tick_period {
                warn!(
                    "⏱️ Pass #{} took {:.1}s, over the {:.0}s tick; starting next pass now",
                    tick,
                    elapsed.as_secs_f64(),
                    self.timing.tick_period.as_secs_f64()
                );
            }
            tick += 1;

            tokio::select! {
                biased;
                _ = wait_for_stop(&mut self.stop_rx) => break,
                _ = sleep_until(next_tick) => {}
            }
        }

        info!("🛑 Scheduler stopped after {} passes", tick);
    }

    /// One full pass over the configured intervals. Fetches run concurrently, one
    /// task per interval, and are all joined before the snapshot is assembled.
    pub async fn run_pass(&self, tick: u64) -> EvaluationSnapshot {
        let settings = self.settings_rx.borrow().clone();
        let started_at = Utc::now();
        debug!(
            "Pass #{} for {} over {} intervals",
            tick,
            settings.symbol,
            settings.intervals.len()
        );

        let tasks: Vec<(Interval, JoinHandle<IntervalSnapshot>)> = settings
            .intervals
            .iter()
            .map(|&interval| {
                let task = evaluate_interval(
                    self.source.clone(),
                    settings.symbol.clone(),
                    interval,
                    settings.params,
                    self.timing.fetch_timeout,
                );
                (interval, tokio::spawn(task))
            })
            .collect();

        let mut intervals = BTreeMap::new();
        for (interval, task) in tasks {
            let snapshot = match task.await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    error!("❌ Evaluation task for {} failed: {}", interval, e);
                    IntervalSnapshot::no_data(interval, format!("evaluation task failed: {}", e))
                }
            };
            intervals.insert(interval, snapshot);
        }

        EvaluationSnapshot {
            tick,
            symbol: settings.symbol,
            started_at,
            completed_at: Utc::now(),
            intervals,
        }
    }

    fn publish(&self, snapshot: Arc<EvaluationSnapshot>) {
        self.snapshot_tx.send_replace(Some(snapshot.clone()));
        for sink in &self.sinks {
            sink.publish(&snapshot);
        }
    }
}

/// Fetch and evaluate a single interval. Never fails: problems become status markers.
async fn evaluate_interval(
    source: Arc<dyn MarketDataSource>,
    symbol: String,
    interval: Interval,
    params: AnalysisParams,
    fetch_timeout: Duration,
) -> IntervalSnapshot {
    let fetch = source.fetch_series(&symbol, interval, interval.default_lookback());
    let fetched = match timeout(fetch_timeout, fetch).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Unavailable(format!(
            "fetch timed out after {:.1}s",
            fetch_timeout.as_secs_f64()
        ))),
    };

    let outcome = match fetched {
        Ok(series) => {
            debug!("{} {}: evaluating {} bars", symbol, series.interval(), series.len());
            evaluate_series(&series, &params)
        }
        Err(e) => {
            warn!("⚠️ {} {}: {}", symbol, interval, e);
            Err(EvaluationIssue::from(e))
        }
    };
    IntervalSnapshot::from_outcome(interval, outcome)
}

/// Resolves once a stop has been requested. If every handle is gone nobody can
/// stop us any more, so it never resolves.
async fn wait_for_stop(stop_rx: &mut watch::Receiver<bool>) {
    loop {
        if *stop_rx.borrow_and_update() {
            return;
        }
        if stop_rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timing_rejects_zero() {
        assert!(SchedulerTiming::new(Duration::ZERO, Duration::from_secs(1)).is_err());
        assert!(SchedulerTiming::new(Duration::from_secs(60), Duration::ZERO).is_err());
        assert!(SchedulerTiming::new(Duration::from_secs(60), Duration::from_secs(20)).is_ok());
    }
}
