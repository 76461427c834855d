//! EMA trend and crossover detection.

use std::fmt;

use serde::Serialize;

use super::frame::IndicatorFrame;

/// Which side of the slow EMA the fast EMA sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Trend {
    Bull, // fast > slow
    Bear, // fast <= slow
}

/// Crossover event on the latest bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CrossState {
    Stable,
    BullishCross,
    BearishCross,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Signal {
    pub trend: Trend,
    pub cross: CrossState,
}

impl Signal {
    /// Compares the last two rows of `frame`. Needs both EMAs defined on both rows.
    ///
    /// Trend uses a strict `>`: equal EMAs are Bear. A cross needs the ordering to
    /// actually flip, so landing exactly on equality never counts as one.
    pub fn detect(frame: &IndicatorFrame) -> Option<Self> {
        let rows = frame.rows();
        if rows.len() < 2 {
            return None;
        }
        let prev = &rows[rows.len() - 2];
        let last = &rows[rows.len() - 1];
        let (prev_fast, prev_slow) = (prev.ema_fast?, prev.ema_slow?);
        let (fast, slow) = (last.ema_fast?, last.ema_slow?);

        let trend = if fast > slow { Trend::Bull } else { Trend::Bear };

        let cross = if prev_fast <= prev_slow && fast > slow {
            CrossState::BullishCross
        } else if prev_fast >= prev_slow && fast < slow {
            CrossState::BearishCross
        } else {
            CrossState::Stable
        };

        Some(Self { trend, cross })
    }

    pub fn is_cross(&self) -> bool {
        self.cross != CrossState::Stable
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Trend::Bull => "Bull",
            Trend::Bear => "Bear",
        })
    }
}

impl fmt::Display for CrossState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CrossState::Stable => "Stable",
            CrossState::BullishCross => "BullishCross",
            CrossState::BearishCross => "BearishCross",
        })
    }
}
