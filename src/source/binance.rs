//! Binance spot REST klines (`GET /api/v3/klines`).

use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use super::MarketDataSource;
use crate::error::FetchError;
use crate::models::{Bar, Interval, Series};

pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";

/// Most bars the endpoint returns in one request.
pub const MAX_KLINES: usize = 1000;

/// One kline row as returned by Binance. Prices and volumes arrive as strings.
#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct RawKline(
    i64,    // 0: Open time (ms)
    String, // 1: Open
    String, // 2: High
    String, // 3: Low
    String, // 4: Close
    String, // 5: Volume
    i64,    // 6: Close time
    String, // 7: Quote asset volume
    u64,    // 8: Number of trades
    String, // 9: Taker buy base asset volume
    String, // 10: Taker buy quote asset volume
    String, // 11: Ignore
);

/// Error body, e.g. `{"code":-1121,"msg":"Invalid symbol."}`
#[derive(Debug, Deserialize)]
struct ApiError {
    code: i64,
    msg: String,
}

const INVALID_SYMBOL_CODE: i64 = -1121;

pub struct BinanceSource {
    client: reqwest::Client,
    base_url: String,
}

impl BinanceSource {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(request_timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn klines_url(&self, symbol: &str, interval: Interval, limit: usize) -> String {
        format!(
            "{}/api/v3/klines?symbol={}&interval={}&limit={}",
            self.base_url,
            symbol.to_uppercase(),
            interval.as_str(),
            limit
        )
    }
}

#[async_trait]
impl MarketDataSource for BinanceSource {
    async fn fetch_series(
        &self,
        symbol: &str,
        interval: Interval,
        lookback: Duration,
    ) -> Result<Series, FetchError> {
        let limit = interval.bars_in(lookback, MAX_KLINES);
        let url = self.klines_url(symbol, interval, limit);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Unavailable(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Unavailable(format!("failed to read body: {}", e)))?;

        if !status.is_success() {
            return Err(classify_failure(status, &body));
        }

        let series = parse_klines(&body, interval)?;
        debug!("{} {}: fetched {} bars (limit {})", symbol, interval, series.len(), limit);
        Ok(series)
    }

    fn name(&self) -> &str {
        "binance"
    }
}

/// Maps a non-success response onto the provider error taxonomy.
fn classify_failure(status: StatusCode, body: &str) -> FetchError {
    // 418 is Binance's escalation after ignoring 429s.
    if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::IM_A_TEAPOT {
        return FetchError::RateLimited(format!("HTTP {}", status));
    }
    match serde_json::from_str::<ApiError>(body) {
        Ok(err)
            if err.code == INVALID_SYMBOL_CODE
                || err.msg.to_lowercase().contains("invalid symbol") =>
        {
            FetchError::InvalidSymbol(err.msg)
        }
        Ok(err) => {
            FetchError::Unavailable(format!("HTTP {} (code {}): {}", status, err.code, err.msg))
        }
        Err(_) => FetchError::Unavailable(format!("HTTP {}", status)),
    }
}

fn parse_klines(body: &str, interval: Interval) -> Result<Series, FetchError> {
    let rows: Vec<RawKline> = serde_json::from_str(body)
        .map_err(|e| FetchError::Unavailable(format!("JSON parse failed: {}", e)))?;

    let bars = rows
        .into_iter()
        .filter_map(|k| {
            Some(Bar {
                timestamp: DateTime::from_timestamp_millis(k.0)?,
                open: finite(&k.1)?,
                high: finite(&k.2)?,
                low: finite(&k.3)?,
                close: finite(&k.4)?,
                volume: finite(&k.5)?,
            })
        })
        .collect();

    Ok(Series::new(interval, bars))
}

/// `str::parse` accepts "inf" and "NaN"; neither is a usable price or volume.
fn finite(raw: &str) -> Option<f64> {
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}
