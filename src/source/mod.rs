//! Market data providers.

pub mod binance;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::models::{Interval, Series};

/// Anything that can hand back a time-ordered OHLCV series on request.
///
/// Implementations may return fewer bars than asked for, or none at all; the
/// engine degrades to "insufficient data" in that case.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn fetch_series(
        &self,
        symbol: &str,
        interval: Interval,
        lookback: Duration,
    ) -> Result<Series, FetchError>;

    fn name(&self) -> &str;
}

pub use binance::BinanceSource;
