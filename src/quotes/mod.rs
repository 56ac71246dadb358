// src/quotes/mod.rs
//! Minute quote series and the trading calendar.
//!
//! Both come from the public chart endpoint and are fetched directly, not
//! through the proxy pool.

mod chart;

pub use chart::{parse_minute_bars, parse_trading_days, session_window, ChartClient};

use crate::error::AppError;
use crate::types::Symbol;
use chrono::{NaiveDate, NaiveDateTime};

/// One 1-minute quote bar in exchange-local time.
///
/// Only the close is guaranteed; bars without one are dropped on parse.
#[derive(Debug, Clone, PartialEq)]
pub struct MinuteBar {
    pub timestamp: NaiveDateTime,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: f64,
}

/// Supplies minute bars and trading days.
#[async_trait::async_trait]
pub trait QuoteSource: Send + Sync {
    /// Regular-session minute bars for `symbol` on `date`. `None` when the
    /// upstream has no series for that symbol.
    async fn minute_bars(
        &self,
        symbol: &Symbol,
        date: NaiveDate,
    ) -> Result<Option<Vec<MinuteBar>>, AppError>;

    /// Trading days in the lookback window ending on `until`, oldest first.
    async fn trading_days(&self, until: NaiveDate) -> Result<Vec<NaiveDate>, AppError>;
}
