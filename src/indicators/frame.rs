//! Per-bar derived fields, aligned with the source `Series`.

use serde::Serialize;

use super::base::pct_change;
use super::ema::ema_series;
use crate::models::Series;

/// Derived values for one bar. `None` means undefined.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct IndicatorRow {
    pub ema_fast: Option<f64>,
    pub ema_slow: Option<f64>,
    pub price_change_pct: Option<f64>,
    pub volume_change_pct: Option<f64>,
}

/// Indicator rows in the same order and length as the bars they came from.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndicatorFrame {
    rows: Vec<IndicatorRow>,
}

impl IndicatorFrame {
    /// Computes EMA(fast), EMA(slow) and percent changes for every bar.
    ///
    /// Fewer than two bars gives a frame whose fields are all undefined.
    pub fn compute(series: &Series, fast_period: usize, slow_period: usize) -> Self {
        let len = series.len();
        if len < 2 {
            return Self { rows: vec![IndicatorRow::default(); len] };
        }

        let closes = series.closes();
        let volumes = series.volumes();
        let fast = ema_series(&closes, fast_period);
        let slow = ema_series(&closes, slow_period);
        let price_chg = pct_change(&closes);
        let vol_chg = pct_change(&volumes);

        let rows = (0..len)
            .map(|i| IndicatorRow {
                ema_fast: Some(fast[i]).filter(|v| v.is_finite()),
                ema_slow: Some(slow[i]).filter(|v| v.is_finite()),
                price_change_pct: price_chg[i],
                volume_change_pct: vol_chg[i],
            })
            .collect();

        Self { rows }
    }

    pub fn from_rows(rows: Vec<IndicatorRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[IndicatorRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn last(&self) -> Option<&IndicatorRow> {
        self.rows.last()
    }
}
