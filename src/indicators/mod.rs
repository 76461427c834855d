//! Indicator pipeline for a single interval.
//!
//! - `ema`: exponential moving average
//! - `frame`: per-bar EMA and percent-change rows
//! - `baseline`: trailing mean absolute change
//! - `signal`: EMA trend and crossovers
//! - `anomaly`: extreme-move classification
//! - `base`: shared numeric helpers

pub mod anomaly;
pub mod base;
pub mod baseline;
pub mod ema;
pub mod frame;
pub mod signal;

pub use anomaly::{AnomalyResult, SkipReason};
pub use baseline::Baseline;
pub use frame::{IndicatorFrame, IndicatorRow};
pub use signal::{CrossState, Signal, Trend};
