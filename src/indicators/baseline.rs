//! Trailing-window baseline of absolute percent changes.

use serde::Serialize;

use super::base::mean_abs;
use super::frame::IndicatorFrame;

pub const DEFAULT_WINDOW_SIZE: usize = 10;

/// Typical recent move size: mean absolute percent change over the trailing
/// window that ends just before the current bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Baseline {
    pub avg_abs_price_change_pct: f64,
    pub avg_abs_volume_change_pct: f64,
}

impl Baseline {
    /// Uses rows `[last - window_size, last - 1]`. The current (last) row is never part
    /// of its own baseline.
    ///
    /// Returns `None` when the window does not fit before the current row, or when
    /// either field has no defined value inside it.
    pub fn estimate(frame: &IndicatorFrame, window_size: usize) -> Option<Self> {
        let rows = frame.rows();
        if window_size == 0 || rows.len() < window_size + 1 {
            return None;
        }
        let last = rows.len() - 1;
        let window = &rows[last - window_size..last];

        let price: Vec<Option<f64>> = window.iter().map(|r| r.price_change_pct).collect();
        let volume: Vec<Option<f64>> = window.iter().map(|r| r.volume_change_pct).collect();

        Some(Self {
            avg_abs_price_change_pct: mean_abs(&price)?,
            avg_abs_volume_change_pct: mean_abs(&volume)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Bar, Interval, Series};
    use chrono::{TimeZone, Utc};

    fn series(closes: &[f64], volumes: &[f64]) -> Series {
        let bars = closes
            .iter()
            .zip(volumes)
            .enumerate()
            .map(|(i, (&c, &v))| {
                let ts = Utc.timestamp_opt(i as i64 * 300, 0).unwrap();
                Bar::new(ts, c, c, c, c, v)
            })
            .collect();
        Series::new(Interval::M5, bars)
    }

    #[test]
    fn test_baseline_excludes_current_bar() {
        // 12 bars: index 0 undefined, indices 1..=10 move +/-1%, the last bar jumps 50%.
        let mut closes = vec![100.0];
        for i in 0..10 {
            let prev = *closes.last().unwrap();
            closes.push(if i % 2 == 0 { prev * 1.01 } else { prev * 0.99 });
        }
        let last = *closes.last().unwrap();
        closes.push(last * 1.5);
        let volumes = vec![1000.0; closes.len()];

        let frame = IndicatorFrame::compute(&series(&closes, &volumes), 2, 3);
        let baseline = Baseline::estimate(&frame, 10).unwrap();
        assert!((baseline.avg_abs_price_change_pct - 1.0).abs() < 1e-9);
        assert_eq!(baseline.avg_abs_volume_change_pct, 0.0);
    }

    #[test]
    fn test_baseline_eleven_bars_uses_rows_one_to_ten() {
        // Bars 1-10 are rows 0..=9, bar 11 (row 10) is the current one. Row 0 has
        // no predecessor, so the nine defined rows 1..=9 are averaged.
        let closes: Vec<f64> = (0..11).map(|i| 100.0 + i as f64).collect();
        let volumes: Vec<f64> = (0..11).map(|i| 10.0 * (i as f64 + 1.0)).collect();
        let frame = IndicatorFrame::compute(&series(&closes, &volumes), 2, 3);

        let baseline = Baseline::estimate(&frame, 10).unwrap();
        let expected: f64 =
            (1..10).map(|i| (closes[i] / closes[i - 1] - 1.0) * 100.0).sum::<f64>() / 9.0;
        assert!((baseline.avg_abs_price_change_pct - expected).abs() < 1e-10);

        // The current bar's own change must not be part of the average.
        let current = frame.last().unwrap().price_change_pct.unwrap();
        let with_current = (expected * 9.0 + current) / 10.0;
        assert!((baseline.avg_abs_price_change_pct - with_current).abs() > 1e-6);
    }

    #[test]
    fn test_baseline_requires_window_plus_one_rows() {
        let closes: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let frame = IndicatorFrame::compute(&series(&closes, &closes), 2, 3);
        assert!(Baseline::estimate(&frame, 10).is_none());
        assert!(Baseline::estimate(&frame, 9).is_some());
    }

    #[test]
    fn test_baseline_undefined_when_volume_never_defined() {
        let closes: Vec<f64> = (0..12).map(|i| 100.0 + i as f64).collect();
        let volumes = vec![0.0; 12];
        let frame = IndicatorFrame::compute(&series(&closes, &volumes), 2, 3);
        assert!(Baseline::estimate(&frame, 10).is_none());
    }
}
