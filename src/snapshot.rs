//! Results handed to renderers and notifiers.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::EvaluationIssue;
use crate::indicators::{AnomalyResult, Baseline, Signal, Trend};
use crate::models::Interval;

/// Complete evaluation of one interval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntervalReport {
    pub latest_close: f64,
    pub bar_time: DateTime<Utc>,
    pub bars: usize,
    pub ema_fast: Option<f64>,
    pub ema_slow: Option<f64>,
    pub trend: Trend,
    pub signal: Signal,
    pub baseline: Option<Baseline>,
    pub anomaly: AnomalyResult,
}

impl IntervalReport {
    /// `ComputationSkipped` when the anomaly guard declined to classify.
    pub fn issue(&self) -> Option<EvaluationIssue> {
        self.anomaly
            .skipped
            .map(|reason| EvaluationIssue::ComputationSkipped(reason.describe().to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IntervalStatus {
    Ready(IntervalReport),
    NoData { reason: String },
    InsufficientData { required: usize, actual: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntervalSnapshot {
    pub interval: Interval,
    #[serde(flatten)]
    pub status: IntervalStatus,
}

impl IntervalSnapshot {
    /// Guard skips inside a finished report (flat baseline, undefined change) stay `Ready`
    /// and surface through [`IntervalReport::issue`].
    pub fn from_outcome(
        interval: Interval,
        outcome: Result<IntervalReport, EvaluationIssue>,
    ) -> Self {
        let status = match outcome {
            Ok(report) => IntervalStatus::Ready(report),
            Err(EvaluationIssue::InsufficientHistory { required, actual }) => {
                IntervalStatus::InsufficientData { required, actual }
            }
            Err(EvaluationIssue::DataUnavailable(reason)) => IntervalStatus::NoData { reason },
            // No report could be built at all (non-finite EMA on the latest bars).
            Err(issue @ EvaluationIssue::ComputationSkipped(_)) => IntervalStatus::NoData {
                reason: issue.to_string(),
            },
        };
        Self { interval, status }
    }

    pub fn no_data(interval: Interval, reason: impl Into<String>) -> Self {
        Self {
            interval,
            status: IntervalStatus::NoData { reason: reason.into() },
        }
    }

    pub fn report(&self) -> Option<&IntervalReport> {
        match &self.status {
            IntervalStatus::Ready(report) => Some(report),
            _ => None,
        }
    }

    pub fn is_extreme(&self) -> bool {
        self.report().is_some_and(|r| r.anomaly.is_extreme)
    }
}

/// Everything one scheduler pass produced. Shared read-only once published.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationSnapshot {
    pub tick: u64,
    pub symbol: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub intervals: BTreeMap<Interval, IntervalSnapshot>,
}

impl EvaluationSnapshot {
    pub fn get(&self, interval: Interval) -> Option<&IntervalSnapshot> {
        self.intervals.get(&interval)
    }

    pub fn extremes(&self) -> impl Iterator<Item = &IntervalSnapshot> {
        self.intervals.values().filter(|s| s.is_extreme())
    }

    pub fn crossovers(&self) -> impl Iterator<Item = (&IntervalSnapshot, &IntervalReport)> {
        self.intervals
            .values()
            .filter_map(|s| s.report().map(|r| (s, r)))
            .filter(|(_, r)| r.signal.is_cross())
    }
}
