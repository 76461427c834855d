//! Multi-interval volatility and EMA-crossover monitor.
//!
//! Each tick the [`scheduler`] fetches one series per interval, runs the [`engine`] on it
//! and publishes an [`snapshot::EvaluationSnapshot`] to the configured [`sink`]s.

pub mod config;
pub mod engine;
pub mod error;
pub mod indicators;
pub mod models;
pub mod notifier;
pub mod scheduler;
pub mod sink;
pub mod snapshot;
pub mod source;
pub mod telemetry;

pub use config::{MonitorConfig, MonitorSettings};
pub use engine::{AnalysisParams, evaluate_series};
pub use error::{ConfigError, EvaluationIssue, FetchError};
pub use models::{Bar, Interval, Series};
pub use scheduler::{CycleScheduler, SchedulerHandle, SchedulerState, SchedulerTiming};
pub use sink::{LogRenderer, SnapshotSink};
pub use snapshot::{EvaluationSnapshot, IntervalReport, IntervalSnapshot, IntervalStatus};
pub use source::MarketDataSource;
