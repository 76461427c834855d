//! Slack alerts for extreme moves and EMA crossovers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::indicators::CrossState;
use crate::models::Interval;
use crate::sink::SnapshotSink;
use crate::snapshot::{EvaluationSnapshot, IntervalReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum AlertKind {
    Extreme,
    Cross,
}

/// Where formatted alert text ends up. Must not block the caller.
pub trait AlertTransport: Send + Sync {
    fn deliver(&self, message: String, what: &'static str);
}

/// Posts to a Slack incoming webhook from a spawned task.
pub struct SlackWebhook {
    client: reqwest::Client,
    webhook_url: String,
}

impl SlackWebhook {
    pub fn new(webhook_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            webhook_url,
        }
    }
}

impl AlertTransport for SlackWebhook {
    fn deliver(&self, message: String, what: &'static str) {
        let client = self.client.clone();
        let webhook_url = self.webhook_url.clone();
        tokio::spawn(async move {
            match client.post(webhook_url).json(&json!({"text": message})).send().await {
                Ok(_) => info!("🚀 {} delivered successfully.", what),
                Err(e) => error!("❌ Failed to send {}: {:?}", what, e),
            }
        });
    }
}

/// Turns snapshots into alerts.
///
/// Each (interval, kind) pair has its own cooldown so a noisy 1m stream does not
/// mute the 30m one.
pub struct AlertNotifier {
    transport: Box<dyn AlertTransport>,
    cooldown: Duration,
    notify_crossovers: bool,
    last_alert: Mutex<HashMap<(Interval, AlertKind), Instant>>,
}

impl AlertNotifier {
    pub fn new(
        transport: Box<dyn AlertTransport>,
        cooldown: Duration,
        notify_crossovers: bool,
    ) -> Self {
        Self {
            transport,
            cooldown,
            notify_crossovers,
            last_alert: Mutex::new(HashMap::new()),
        }
    }

    pub fn slack(webhook_url: String, cooldown: Duration, notify_crossovers: bool) -> Self {
        Self::new(Box::new(SlackWebhook::new(webhook_url)), cooldown, notify_crossovers)
    }

    /// True if an alert may go out now; records the send time when it does.
    fn try_acquire(&self, interval: Interval, kind: AlertKind, now: Instant) -> bool {
        let Ok(mut last_alert) = self.last_alert.lock() else {
            return false;
        };
        let needs_alert = match last_alert.get(&(interval, kind)) {
            None => true,
            Some(last) => now.duration_since(*last) >= self.cooldown,
        };
        if needs_alert {
            last_alert.insert((interval, kind), now);
        }
        needs_alert
    }
}

impl SnapshotSink for AlertNotifier {
    fn publish(&self, snapshot: &Arc<EvaluationSnapshot>) {
        let now = Instant::now();
        let time_str = snapshot
            .completed_at
            .with_timezone(&chrono::Local)
            .format("%H:%M:%S")
            .to_string();

        for interval in snapshot.extremes() {
            let Some(report) = interval.report() else {
                continue;
            };
            if !self.try_acquire(interval.interval, AlertKind::Extreme, now) {
                continue;
            }
            warn!(
                "🔥 Extreme move on {} {}: price {:+.2}%, volume {:+.1}%",
                snapshot.symbol,
                interval.interval,
                report.anomaly.current_price_change_pct.unwrap_or_default(),
                report.anomaly.current_volume_change_pct.unwrap_or_default()
            );
            let message =
                format_extreme_alert(&snapshot.symbol, interval.interval, report, &time_str);
            self.transport.deliver(message, "Extreme move alert");
        }

        if !self.notify_crossovers {
            return;
        }
        for (interval, report) in snapshot.crossovers() {
            if self.try_acquire(interval.interval, AlertKind::Cross, now) {
                let message =
                    format_cross_alert(&snapshot.symbol, interval.interval, report, &time_str);
                self.transport.deliver(message, "Crossover alert");
            }
        }
    }
}

pub fn format_extreme_alert(
    symbol: &str,
    interval: Interval,
    report: &IntervalReport,
    time_str: &str,
) -> String {
    let price = report.anomaly.current_price_change_pct.unwrap_or_default();
    let volume = report.anomaly.current_volume_change_pct.unwrap_or_default();
    let (avg_p, avg_v) = report
        .baseline
        .map(|b| (b.avg_abs_price_change_pct, b.avg_abs_volume_change_pct))
        .unwrap_or_default();
    let arrow = if price >= 0.0 { "📈" } else { "📉" };

    format!(
        "🚨 *{} Extreme Move ({})* 🚨\n\
        > *Close*: `{:.4}`\n\
        > *Price Change*: {} `{:+.2}%` (avg `{:.2}%`, ×{:.1})\n\
        > *Volume Change*: `{:+.1}%` (avg `{:.1}%`)\n\
        > *Trend*: `{}`\n\
        > *Time*: `{}`",
        symbol,
        interval,
        report.latest_close,
        arrow,
        price,
        avg_p,
        report.anomaly.multiplier,
        volume,
        avg_v,
        report.trend,
        time_str
    )
}

pub fn format_cross_alert(
    symbol: &str,
    interval: Interval,
    report: &IntervalReport,
    time_str: &str,
) -> String {
    let (icon, label) = match report.signal.cross {
        CrossState::BullishCross => ("🚀", "Bullish EMA Cross"),
        CrossState::BearishCross => ("🔻", "Bearish EMA Cross"),
        CrossState::Stable => ("➡️", "EMA Stable"),
    };

    format!(
        "{} *{} {} ({})*\n\
        > *Close*: `{:.4}`\n\
        > *EMA fast / slow*: `{:.4}` / `{:.4}`\n\
        > *Time*: `{}`",
        icon,
        symbol,
        label,
        interval,
        report.latest_close,
        report.ema_fast.unwrap_or(f64::NAN),
        report.ema_slow.unwrap_or(f64::NAN),
        time_str
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{AnomalyResult, Baseline, Signal, Trend};
    use crate::snapshot::{IntervalSnapshot, IntervalStatus};
    use chrono::{DateTime, Utc};
    use std::collections::BTreeMap;

    #[derive(Clone, Default)]
    struct Outbox(Arc<Mutex<Vec<(String, &'static str)>>>);

    impl Outbox {
        fn kinds(&self) -> Vec<&'static str> {
            self.0.lock().unwrap().iter().map(|(_, what)| *what).collect()
        }
    }

    impl AlertTransport for Outbox {
        fn deliver(&self, message: String, what: &'static str) {
            self.0.lock().unwrap().push((message, what));
        }
    }

    fn report(price: f64, volume: f64, cross: CrossState) -> IntervalReport {
        let baseline = Some(Baseline {
            avg_abs_price_change_pct: 0.4,
            avg_abs_volume_change_pct: 12.0,
        });
        IntervalReport {
            latest_close: 187.5,
            bar_time: DateTime::<Utc>::UNIX_EPOCH,
            bars: 390,
            ema_fast: Some(186.9),
            ema_slow: Some(186.2),
            trend: Trend::Bull,
            signal: Signal { trend: Trend::Bull, cross },
            baseline,
            anomaly: AnomalyResult::classify(Some(price), Some(volume), baseline, 3.0),
        }
    }

    fn snapshot(statuses: Vec<(Interval, IntervalStatus)>) -> Arc<EvaluationSnapshot> {
        let intervals: BTreeMap<_, _> = statuses
            .into_iter()
            .map(|(interval, status)| (interval, IntervalSnapshot { interval, status }))
            .collect();
        Arc::new(EvaluationSnapshot {
            tick: 0,
            symbol: "AAPL".into(),
            started_at: DateTime::<Utc>::UNIX_EPOCH,
            completed_at: DateTime::<Utc>::UNIX_EPOCH,
            intervals,
        })
    }

    #[test]
    fn test_extreme_alert_text() {
        let msg = format_extreme_alert(
            "AAPL",
            Interval::M1,
            &report(-1.8, 140.0, CrossState::Stable),
            "09:31:00",
        );
        assert!(msg.contains("AAPL Extreme Move (1m)"));
        assert!(msg.contains("📉 `-1.80%` (avg `0.40%`, ×3.0)"));
        assert!(msg.contains("`+140.0%` (avg `12.0%`)"));
        assert!(msg.contains("*Time*: `09:31:00`"));
    }

    #[test]
    fn test_cross_alert_text() {
        let r = report(-1.8, 140.0, CrossState::BullishCross);
        let msg = format_cross_alert("AAPL", Interval::M15, &r, "10:00:00");
        assert!(msg.starts_with("🚀 *AAPL Bullish EMA Cross (15m)*"));
        assert!(msg.contains("`186.9000` / `186.2000`"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_per_interval_and_kind() {
        let notifier =
            AlertNotifier::new(Box::new(Outbox::default()), Duration::from_secs(300), true);
        let t0 = Instant::now();

        assert!(notifier.try_acquire(Interval::M1, AlertKind::Extreme, t0));
        let soon = t0 + Duration::from_secs(10);
        assert!(!notifier.try_acquire(Interval::M1, AlertKind::Extreme, soon));
        // Other interval / other kind are independent.
        assert!(notifier.try_acquire(Interval::M5, AlertKind::Extreme, t0));
        assert!(notifier.try_acquire(Interval::M1, AlertKind::Cross, t0));
        // Cooldown elapsed.
        let later = t0 + Duration::from_secs(300);
        assert!(notifier.try_acquire(Interval::M1, AlertKind::Extreme, later));
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_extreme_alert_per_cooldown() {
        let outbox = Outbox::default();
        let cooldown = Duration::from_secs(300);
        let notifier = AlertNotifier::new(Box::new(outbox.clone()), cooldown, false);
        let snap = snapshot(vec![
            (Interval::M1, IntervalStatus::Ready(report(-1.8, 140.0, CrossState::Stable))),
            (Interval::M5, IntervalStatus::InsufficientData { required: 23, actual: 4 }),
            (Interval::M15, IntervalStatus::NoData { reason: "HTTP 503".into() }),
            (Interval::M30, IntervalStatus::Ready(report(0.1, 3.0, CrossState::Stable))),
        ]);

        notifier.publish(&snap);
        assert_eq!(outbox.kinds(), vec!["Extreme move alert"]);
        assert!(outbox.0.lock().unwrap()[0].0.contains("Extreme Move (1m)"));

        tokio::time::advance(Duration::from_secs(60)).await;
        notifier.publish(&snap);
        assert_eq!(outbox.kinds().len(), 1);

        tokio::time::advance(Duration::from_secs(240)).await;
        notifier.publish(&snap);
        assert_eq!(outbox.kinds().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_crossovers_follow_setting() {
        let snap = snapshot(vec![
            (Interval::M15, IntervalStatus::Ready(report(0.1, 3.0, CrossState::BearishCross))),
            (Interval::M30, IntervalStatus::Ready(report(0.1, 3.0, CrossState::Stable))),
        ]);

        let outbox = Outbox::default();
        let notifier = AlertNotifier::new(Box::new(outbox.clone()), Duration::from_secs(300), true);
        notifier.publish(&snap);
        assert_eq!(outbox.kinds(), vec!["Crossover alert"]);
        assert!(outbox.0.lock().unwrap()[0].0.starts_with("🔻 *AAPL Bearish EMA Cross (15m)*"));

        let muted = Outbox::default();
        let notifier = AlertNotifier::new(Box::new(muted.clone()), Duration::from_secs(300), false);
        notifier.publish(&snap);
        assert!(muted.kinds().is_empty());
    }
}
