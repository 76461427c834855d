//! Market data models.
//!
//! `Bar` is one OHLCV candle as delivered by the data source, `Series` is the
//! time-ordered bar sequence of a single interval, and `Interval` names the
//! bar granularity.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Bar granularity. Serialized with the exchange-style short names ("1m", "5m", ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    M1,
    #[serde(rename = "5m")]
    M5,
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "30m")]
    M30,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
}

impl Interval {
    pub const ALL: [Interval; 7] = [
        Interval::M1,
        Interval::M5,
        Interval::M15,
        Interval::M30,
        Interval::H1,
        Interval::H4,
        Interval::D1,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::M1 => "1m",
            Interval::M5 => "5m",
            Interval::M15 => "15m",
            Interval::M30 => "30m",
            Interval::H1 => "1h",
            Interval::H4 => "4h",
            Interval::D1 => "1d",
        }
    }

    pub fn duration(&self) -> Duration {
        let secs = match self {
            Interval::M1 => 60,
            Interval::M5 => 300,
            Interval::M15 => 900,
            Interval::M30 => 1800,
            Interval::H1 => 3600,
            Interval::H4 => 14_400,
            Interval::D1 => 86_400,
        };
        Duration::from_secs(secs)
    }

    /// How much history to request. One-minute bars only go back a day,
    /// everything coarser gets five days.
    pub fn default_lookback(&self) -> Duration {
        match self {
            Interval::M1 => Duration::from_secs(86_400),
            _ => Duration::from_secs(5 * 86_400),
        }
    }

    /// Number of bars covering `lookback`, clamped to `[1, max_bars]`.
    pub fn bars_in(&self, lookback: Duration, max_bars: usize) -> usize {
        let bars = (lookback.as_secs() / self.duration().as_secs()) as usize;
        bars.clamp(1, max_bars.max(1))
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Interval::ALL
            .iter()
            .copied()
            .find(|i| i.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown interval '{}'", s))
    }
}

/// A single OHLCV candle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self { timestamp, open, high, low, close, volume }
    }
}

/// Ascending, duplicate-free bars of one interval.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    interval: Interval,
    bars: Vec<Bar>,
}

impl Series {
    /// Builds a series, sorting by timestamp. When two bars share a timestamp
    /// the one that came later in `bars` wins (the provider's latest revision).
    pub fn new(interval: Interval, mut bars: Vec<Bar>) -> Self {
        // Stable sort keeps arrival order among equal timestamps.
        bars.sort_by_key(|b| b.timestamp);
        let mut deduped: Vec<Bar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match deduped.last_mut() {
                Some(last) if last.timestamp == bar.timestamp => *last = bar,
                _ => deduped.push(bar),
            }
        }
        Self { interval, bars: deduped }
    }

    pub fn empty(interval: Interval) -> Self {
        Self { interval, bars: Vec::new() }
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn last(&self) -> Option<&Bar> {
        self.bars.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bar_at(secs: i64, close: f64) -> Bar {
        let ts = Utc.timestamp_opt(secs, 0).unwrap();
        Bar::new(ts, close, close, close, close, 1.0)
    }

    #[test]
    fn test_series_sorts_and_dedups() {
        let series = Series::new(
            Interval::M1,
            vec![bar_at(120, 3.0), bar_at(0, 1.0), bar_at(60, 2.0), bar_at(60, 2.5)],
        );
        assert_eq!(series.closes(), vec![1.0, 2.5, 3.0]);
        assert!(series.bars().windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn test_interval_parse_and_display() {
        assert_eq!("15m".parse::<Interval>().unwrap(), Interval::M15);
        assert_eq!(" 1H ".parse::<Interval>().unwrap(), Interval::H1);
        assert!("2m".parse::<Interval>().is_err());
        assert_eq!(Interval::M30.to_string(), "30m");
    }

    #[test]
    fn test_interval_serde_names() {
        let json = serde_json::to_string(&Interval::M5).unwrap();
        assert_eq!(json, "\"5m\"");
        let parsed: Vec<Interval> = serde_yaml::from_str("[1m, 30m]").unwrap();
        assert_eq!(parsed, vec![Interval::M1, Interval::M30]);
    }

    #[test]
    fn test_lookback_bars() {
        let m1 = Interval::M1;
        assert_eq!(m1.bars_in(m1.default_lookback(), 1000), 1000);
        let m5 = Interval::M5;
        assert_eq!(m5.bars_in(m5.default_lookback(), 1000), 1000);
        let m30 = Interval::M30;
        assert_eq!(m30.bars_in(m30.default_lookback(), 1000), 240);
        assert_eq!(Interval::D1.bars_in(Duration::from_secs(60), 1000), 1);
    }
}
