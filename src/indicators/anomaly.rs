//! Extreme-move classification against the baseline.

use serde::Serialize;

use super::baseline::Baseline;

pub const DEFAULT_MULTIPLIER: f64 = 3.0;

/// Averages at or below this are treated as a flat market.
const FLAT_EPSILON: f64 = 1e-12;

/// Why the classifier declined to compare against the baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipReason {
    NoBaseline,
    FlatBaseline,
    UndefinedChange,
}

impl SkipReason {
    pub fn describe(&self) -> &'static str {
        match self {
            SkipReason::NoBaseline => "baseline undefined",
            SkipReason::FlatBaseline => "baseline average is zero",
            SkipReason::UndefinedChange => "current change undefined",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnomalyResult {
    pub is_extreme: bool,
    pub current_price_change_pct: Option<f64>,
    pub current_volume_change_pct: Option<f64>,
    pub baseline: Option<Baseline>,
    pub multiplier: f64,
    /// Set when no comparison was made; `is_extreme` is then always false.
    pub skipped: Option<SkipReason>,
}

impl AnomalyResult {
    /// An extreme move needs both the price change and the volume change to exceed
    /// `multiplier` times their baseline averages. Either one alone is not enough.
    pub fn classify(
        price_change_pct: Option<f64>,
        volume_change_pct: Option<f64>,
        baseline: Option<Baseline>,
        multiplier: f64,
    ) -> Self {
        let skipped = |reason| Self {
            is_extreme: false,
            current_price_change_pct: price_change_pct,
            current_volume_change_pct: volume_change_pct,
            baseline,
            multiplier,
            skipped: Some(reason),
        };

        let Some(base) = baseline else {
            return skipped(SkipReason::NoBaseline);
        };
        if base.avg_abs_price_change_pct <= FLAT_EPSILON
            || base.avg_abs_volume_change_pct <= FLAT_EPSILON
        {
            return skipped(SkipReason::FlatBaseline);
        }
        let (Some(price), Some(volume)) = (price_change_pct, volume_change_pct) else {
            return skipped(SkipReason::UndefinedChange);
        };

        let price_hot = price.abs() > base.avg_abs_price_change_pct * multiplier;
        let volume_hot = volume.abs() > base.avg_abs_volume_change_pct * multiplier;

        Self {
            is_extreme: price_hot && volume_hot,
            current_price_change_pct: Some(price),
            current_volume_change_pct: Some(volume),
            baseline,
            multiplier,
            skipped: None,
        }
    }

    /// Current price change relative to its baseline average (e.g. 4.0 = four times typical).
    pub fn price_ratio(&self) -> Option<f64> {
        let base = self.baseline?;
        let price = self.current_price_change_pct?;
        let avg = base.avg_abs_price_change_pct;
        (avg > FLAT_EPSILON).then(|| price.abs() / avg)
    }

    pub fn volume_ratio(&self) -> Option<f64> {
        let base = self.baseline?;
        let volume = self.current_volume_change_pct?;
        let avg = base.avg_abs_volume_change_pct;
        (avg > FLAT_EPSILON).then(|| volume.abs() / avg)
    }
}
