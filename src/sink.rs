//! Consumers of published snapshots.

use std::sync::Arc;

use tracing::{info, warn};

use crate::indicators::CrossState;
use crate::snapshot::{EvaluationSnapshot, IntervalSnapshot, IntervalStatus};

/// Receives every published snapshot.
///
/// Called on the scheduler task, so implementations must hand off quickly
/// (spawn, channel send) instead of doing slow I/O inline.
pub trait SnapshotSink: Send + Sync {
    fn publish(&self, snapshot: &Arc<EvaluationSnapshot>);
}

/// Renders the dashboard to the tracing log, one line per interval.
pub struct LogRenderer;

impl SnapshotSink for LogRenderer {
    fn publish(&self, snapshot: &Arc<EvaluationSnapshot>) {
        info!(
            "📈 {} | tick #{} | updated {}",
            snapshot.symbol,
            snapshot.tick,
            snapshot.completed_at.with_timezone(&chrono::Local).format("%H:%M:%S")
        );
        for interval in snapshot.intervals.values() {
            let line = format_interval_line(interval);
            if interval.is_extreme() {
                warn!("{}", line);
            } else {
                info!("{}", line);
            }
        }
    }
}

/// One dashboard row: current change against the trailing average for price and volume,
/// EMA trend, crossover and status.
pub fn format_interval_line(snapshot: &IntervalSnapshot) -> String {
    let label = snapshot.interval.as_str();
    match &snapshot.status {
        IntervalStatus::Ready(r) => {
            let pct = |v: Option<f64>, digits: usize| match v {
                Some(v) => format!("{:+.*}%", digits, v),
                None => "n/a".to_string(),
            };
            let (avg_p, avg_v) = match r.baseline {
                Some(b) => (
                    format!("{:.2}%", b.avg_abs_price_change_pct),
                    format!("{:.1}%", b.avg_abs_volume_change_pct),
                ),
                None => ("n/a".to_string(), "n/a".to_string()),
            };
            let cross = match r.signal.cross {
                CrossState::Stable => String::new(),
                CrossState::BullishCross => " | ⬆️ BullishCross".to_string(),
                CrossState::BearishCross => " | ⬇️ BearishCross".to_string(),
            };
            let status = if r.anomaly.is_extreme {
                "🔥 Extreme".to_string()
            } else if let Some(issue) = r.issue() {
                format!("😴 Calm ({})", issue)
            } else {
                "😴 Calm".to_string()
            };
            format!(
                "[{:>3}] close {:.4} | price {} vs avg {} | volume {} vs avg {} | {}{} | {}",
                label,
                r.latest_close,
                pct(r.anomaly.current_price_change_pct, 2),
                avg_p,
                pct(r.anomaly.current_volume_change_pct, 1),
                avg_v,
                r.trend,
                cross,
                status
            )
        }
        IntervalStatus::InsufficientData { required, actual } => {
            format!("[{:>3}] ⏳ insufficient data ({}/{} bars)", label, actual, required)
        }
        IntervalStatus::NoData { reason } => format!("[{:>3}] ❌ no data: {}", label, reason),
    }
}
