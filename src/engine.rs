//! Per-interval evaluation: Series → IndicatorFrame → Baseline → Signal + Anomaly.

use serde::{Deserialize, Serialize};

use crate::error::EvaluationIssue;
use crate::indicators::anomaly::DEFAULT_MULTIPLIER;
use crate::indicators::baseline::DEFAULT_WINDOW_SIZE;
use crate::indicators::{AnomalyResult, Baseline, IndicatorFrame, Signal};
use crate::models::Series;
use crate::snapshot::IntervalReport;

/// Tunable parameters of the indicator pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisParams {
    pub fast_period: usize,
    pub slow_period: usize,
    pub window_size: usize,
    pub multiplier: f64,
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self {
            fast_period: 9,
            slow_period: 21,
            window_size: DEFAULT_WINDOW_SIZE,
            multiplier: DEFAULT_MULTIPLIER,
        }
    }
}

impl AnalysisParams {
    /// Bars needed before anything is reported: `max(slow + 2, window + 2)`.
    pub fn min_history(&self) -> usize {
        self.slow_period.saturating_add(2).max(self.window_size.saturating_add(2))
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.fast_period == 0 || self.slow_period == 0 {
            return Err(format!(
                "EMA periods must be positive (fast={}, slow={})",
                self.fast_period, self.slow_period
            ));
        }
        if self.window_size == 0 {
            return Err("baseline window_size must be positive".into());
        }
        if !(self.multiplier.is_finite() && self.multiplier > 0.0) {
            return Err(format!("anomaly multiplier must be > 0, got {}", self.multiplier));
        }
        Ok(())
    }
}

/// Runs the full pipeline on one series.
///
/// Pure and deterministic: the same series and params always give the same report.
pub fn evaluate_series(
    series: &Series,
    params: &AnalysisParams,
) -> Result<IntervalReport, EvaluationIssue> {
    let required = params.min_history();
    if series.len() < required {
        return Err(EvaluationIssue::InsufficientHistory {
            required,
            actual: series.len(),
        });
    }

    let frame = IndicatorFrame::compute(series, params.fast_period, params.slow_period);
    let baseline = Baseline::estimate(&frame, params.window_size);
    let (Some(current), Some(bar)) = (frame.last(), series.last()) else {
        return Err(EvaluationIssue::InsufficientHistory {
            required,
            actual: series.len(),
        });
    };
    // Full history but no finite EMA on the last two bars: the closes themselves are bad.
    let Some(signal) = Signal::detect(&frame) else {
        return Err(EvaluationIssue::ComputationSkipped(format!(
            "EMA undefined on the latest bars (last close {})",
            bar.close
        )));
    };

    let anomaly = AnomalyResult::classify(
        current.price_change_pct,
        current.volume_change_pct,
        baseline,
        params.multiplier,
    );

    Ok(IntervalReport {
        latest_close: bar.close,
        bar_time: bar.timestamp,
        bars: series.len(),
        ema_fast: current.ema_fast,
        ema_slow: current.ema_slow,
        trend: signal.trend,
        signal,
        baseline,
        anomaly,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{CrossState, SkipReason, Trend};
    use crate::models::{Bar, Interval};
    use chrono::{TimeZone, Utc};

    fn series(closes: &[f64], volumes: &[f64]) -> Series {
        let bars = closes
            .iter()
            .zip(volumes)
            .enumerate()
            .map(|(i, (&c, &v))| {
                let ts = Utc.timestamp_opt(1_700_000_000 + i as i64 * 60, 0).unwrap();
                Bar::new(ts, c, c, c, c, v)
            })
            .collect();
        Series::new(Interval::M1, bars)
    }

    fn params() -> AnalysisParams {
        AnalysisParams { fast_period: 3, slow_period: 6, window_size: 10, multiplier: 3.0 }
    }

    /// Gently oscillating market followed by a final spike in price and volume.
    fn spike_series(n: usize, price_jump: f64, volume_jump: f64) -> Series {
        let mut closes = Vec::with_capacity(n);
        let mut volumes = Vec::with_capacity(n);
        for i in 0..n - 1 {
            closes.push(100.0 + if i % 2 == 0 { 0.0 } else { 0.5 });
            volumes.push(1000.0 + if i % 2 == 0 { 0.0 } else { 100.0 });
        }
        let last_close = *closes.last().unwrap();
        let last_volume = *volumes.last().unwrap();
        closes.push(last_close * (1.0 + price_jump / 100.0));
        volumes.push(last_volume * (1.0 + volume_jump / 100.0));
        series(&closes, &volumes)
    }

    #[test]
    fn test_min_history() {
        assert_eq!(params().min_history(), 12);
        let p = AnalysisParams { slow_period: 21, ..params() };
        assert_eq!(p.min_history(), 23);
    }

    #[test]
    fn test_insufficient_history() {
        let p = params();
        for n in 0..p.min_history() {
            let closes: Vec<f64> = (0..n).map(|i| 100.0 + i as f64).collect();
            let s = series(&closes, &closes);
            match evaluate_series(&s, &p) {
                Err(EvaluationIssue::InsufficientHistory { required, actual }) => {
                    assert_eq!(required, 12);
                    assert_eq!(actual, n);
                }
                other => panic!("expected insufficient history for {} bars, got {:?}", n, other),
            }
        }
    }

    #[test]
    fn test_huge_periods_do_not_overflow() {
        let p = AnalysisParams { slow_period: usize::MAX, window_size: usize::MAX - 1, ..params() };
        assert_eq!(p.min_history(), usize::MAX);
        let s = spike_series(30, 5.0, 500.0);
        assert_eq!(
            evaluate_series(&s, &p),
            Err(EvaluationIssue::InsufficientHistory { required: usize::MAX, actual: 30 })
        );
    }

    #[test]
    fn test_non_finite_close_is_skipped_not_insufficient() {
        let mut closes: Vec<f64> = (0..20).map(|i| 100.0 + (i % 2) as f64).collect();
        closes.push(f64::INFINITY);
        let volumes = vec![1000.0; closes.len()];
        match evaluate_series(&series(&closes, &volumes), &params()) {
            Err(EvaluationIssue::ComputationSkipped(reason)) => {
                assert!(reason.contains("EMA undefined"))
            }
            other => panic!("expected a skipped computation, got {:?}", other),
        }
    }

    #[test]
    fn test_spike_is_extreme() {
        let report = evaluate_series(&spike_series(30, 5.0, 500.0), &params()).unwrap();
        assert!(report.anomaly.is_extreme);
        assert_eq!(report.trend, Trend::Bull);
        assert_eq!(report.bars, 30);
        assert!((report.anomaly.current_price_change_pct.unwrap() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_price_spike_without_volume_is_not_extreme() {
        let report = evaluate_series(&spike_series(30, 5.0, 0.0), &params()).unwrap();
        assert!(!report.anomaly.is_extreme);
        assert_eq!(report.anomaly.skipped, None);
    }

    #[test]
    fn test_flat_market_skips_classification() {
        let closes = vec![100.0; 20];
        let volumes = vec![500.0; 20];
        let report = evaluate_series(&series(&closes, &volumes), &params()).unwrap();
        assert!(!report.anomaly.is_extreme);
        assert_eq!(report.anomaly.skipped, Some(SkipReason::FlatBaseline));
        // Equal EMAs: no cross, Bear by strict comparison.
        assert_eq!(report.signal.cross, CrossState::Stable);
        assert_eq!(report.trend, Trend::Bear);
    }

    #[test]
    fn test_crossover_reported() {
        // Downtrend then a sharp rally on the last bar pulls fast EMA above slow.
        let mut closes: Vec<f64> = (0..20).map(|i| 120.0 - i as f64).collect();
        closes.push(130.0);
        let volumes = vec![1000.0; closes.len()];
        let report = evaluate_series(&series(&closes, &volumes), &params()).unwrap();
        assert_eq!(report.signal.cross, CrossState::BullishCross);
        assert_eq!(report.trend, Trend::Bull);
    }

    #[test]
    fn test_pipeline_is_idempotent() {
        let s = spike_series(40, -3.0, 250.0);
        let a = evaluate_series(&s, &params()).unwrap();
        let b = evaluate_series(&s, &params()).unwrap();
        assert_eq!(a, b);
        assert_eq!(
            a.anomaly.current_price_change_pct.map(f64::to_bits),
            b.anomaly.current_price_change_pct.map(f64::to_bits)
        );
        assert_eq!(a.ema_fast.map(f64::to_bits), b.ema_fast.map(f64::to_bits));
    }

    #[test]
    fn test_params_validation() {
        assert!(AnalysisParams::default().validate().is_ok());
        assert!(AnalysisParams { fast_period: 0, ..params() }.validate().is_err());
        assert!(AnalysisParams { window_size: 0, ..params() }.validate().is_err());
        assert!(AnalysisParams { multiplier: 0.0, ..params() }.validate().is_err());
        assert!(AnalysisParams { multiplier: f64::NAN, ..params() }.validate().is_err());
    }
}
