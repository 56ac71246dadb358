// src/quotes/chart.rs
//! Client and parser for the chart JSON endpoint.

use super::{MinuteBar, QuoteSource};
use crate::constants::{
    ERROR_BODY_PREVIEW_LENGTH, EXCHANGE_TZ, SESSION_CLOSE, SESSION_OPEN,
    TRADING_CALENDAR_LOOKBACK_DAYS,
};
use crate::error::AppError;
use crate::types::Symbol;
use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, NaiveDateTime, TimeZone};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

const CHART_BASE_URL: &str = "https://query1.finance.yahoo.com/v7/finance/chart";

/// Liquid instrument whose daily chart serves as the trading calendar.
const CALENDAR_SYMBOL: &str = "X";

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    #[serde(default)]
    timestamp: Option<Vec<i64>>,
    #[serde(default)]
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteColumns>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteColumns {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
}

fn first_result(body: &str) -> Result<Option<ChartResult>, AppError> {
    let envelope: ChartEnvelope = serde_json::from_str(body)?;
    if let Some(error) = envelope.chart.error.filter(|e| !e.is_null()) {
        log::warn!("Chart endpoint reported an error: {}", error);
    }
    Ok(envelope
        .chart
        .result
        .and_then(|results| results.into_iter().next()))
}

fn to_exchange_time(epoch_seconds: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(epoch_seconds, 0).map(|utc| utc.with_timezone(&EXCHANGE_TZ).naive_local())
}

/// Parses a 1-minute chart into bars, skipping bars without a close.
///
/// `Ok(None)` when the chart carries no result or no timestamps.
pub fn parse_minute_bars(body: &str) -> Result<Option<Vec<MinuteBar>>, AppError> {
    let Some(result) = first_result(body)? else {
        return Ok(None);
    };
    let Some(timestamps) = result.timestamp else {
        return Ok(None);
    };
    let columns = result
        .indicators
        .quote
        .into_iter()
        .next()
        .unwrap_or_default();

    let at = |column: &[Option<f64>], i: usize| column.get(i).copied().flatten();
    let bars = timestamps
        .iter()
        .enumerate()
        .filter_map(|(i, &ts)| {
            Some(MinuteBar {
                timestamp: to_exchange_time(ts)?,
                open: at(&columns.open, i),
                high: at(&columns.high, i),
                low: at(&columns.low, i),
                close: at(&columns.close, i)?,
            })
        })
        .collect();
    Ok(Some(bars))
}

/// Parses a daily chart into the exchange-local dates it covers.
pub fn parse_trading_days(body: &str) -> Result<Vec<NaiveDate>, AppError> {
    let timestamps = first_result(body)?
        .and_then(|r| r.timestamp)
        .ok_or_else(|| AppError::MalformedResponse("daily chart has no timestamps".into()))?;

    let mut days: Vec<NaiveDate> = timestamps
        .into_iter()
        .filter_map(to_exchange_time)
        .map(|t| t.date())
        .collect();
    days.sort();
    days.dedup();
    Ok(days)
}

/// Regular session bounds of `date` as epoch seconds.
pub fn session_window(date: NaiveDate) -> Result<(i64, i64), AppError> {
    let epoch = |(hour, minute): (u32, u32)| {
        date.and_hms_opt(hour, minute, 0)
            .and_then(|local| EXCHANGE_TZ.from_local_datetime(&local).earliest())
            .map(|t| t.timestamp())
            .ok_or_else(|| AppError::InternalError {
                message: format!("{} {:02}:{:02} has no exchange-local time", date, hour, minute),
                source: None,
            })
    };
    Ok((epoch(SESSION_OPEN)?, epoch(SESSION_CLOSE)?))
}

/// Direct (unproxied) chart client.
#[derive(Clone)]
pub struct ChartClient {
    client: Client,
    base_url: String,
}

impl ChartClient {
    pub fn new(timeout: Duration) -> Result<Self, AppError> {
        Self::with_base_url(CHART_BASE_URL, timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, AppError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn minute_chart_url(&self, symbol: &Symbol, date: NaiveDate) -> Result<String, AppError> {
        let (start, end) = session_window(date)?;
        Ok(format!(
            "{}/{}?period1={}&period2={}&interval=1m&indicators=quote&includeTimestamps=true&events=div%7Csplit%7Cearn",
            self.base_url,
            symbol.as_str(),
            start,
            end
        ))
    }

    pub fn daily_chart_url(&self, until: NaiveDate) -> Result<String, AppError> {
        let (_, end) = session_window(until)?;
        let start = end - ChronoDuration::days(TRADING_CALENDAR_LOOKBACK_DAYS).num_seconds();
        Ok(format!(
            "{}/{}?period1={}&period2={}&interval=1d&includeTimestamps=true",
            self.base_url, CALENDAR_SYMBOL, start, end
        ))
    }

    async fn get_text(&self, url: &str) -> Result<String, AppError> {
        log::debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let preview: String = body.chars().take(ERROR_BODY_PREVIEW_LENGTH).collect();
            log::debug!("HTTP {} from {}: {}", status, url, preview);
            return Err(AppError::UpstreamStatus {
                url: url.to_string(),
                status,
            });
        }
        Ok(body)
    }
}

#[async_trait::async_trait]
impl QuoteSource for ChartClient {
    async fn minute_bars(
        &self,
        symbol: &Symbol,
        date: NaiveDate,
    ) -> Result<Option<Vec<MinuteBar>>, AppError> {
        let url = self.minute_chart_url(symbol, date)?;
        let body = self.get_text(&url).await?;
        parse_minute_bars(&body)
    }

    async fn trading_days(&self, until: NaiveDate) -> Result<Vec<NaiveDate>, AppError> {
        let url = self.daily_chart_url(until)?;
        let body = self.get_text(&url).await?;
        parse_trading_days(&body)
    }
}
