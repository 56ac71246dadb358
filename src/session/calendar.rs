// src/session/calendar.rs
//! Deciding whether today's tape can be harvested.

use crate::constants::{EXCHANGE_TZ, SESSION_CLOSE};
use crate::error::AppError;
use crate::error_recovery::{retry_with_backoff, RetryPolicy};
use crate::quotes::QuoteSource;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::fmt;

/// Outcome of the pre-flight session check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
    /// The session for `date` has closed and can be harvested.
    Ready { date: NaiveDate },
    /// The regular session has not closed yet.
    TooEarly { now: NaiveDateTime },
    /// `date` is not a trading day; `last_trading_day` is the most recent one.
    NotTradingDay {
        date: NaiveDate,
        last_trading_day: Option<NaiveDate>,
    },
}

impl SessionStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, SessionStatus::Ready { .. })
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Ready { date } => write!(f, "session of {} is closed", date),
            SessionStatus::TooEarly { now } => write!(
                f,
                "it is {} exchange time; the session closes at {:02}:{:02}",
                now.format("%H:%M"),
                SESSION_CLOSE.0,
                SESSION_CLOSE.1
            ),
            SessionStatus::NotTradingDay {
                date,
                last_trading_day: Some(last),
            } => write!(f, "{} is not a trading day (last was {})", date, last),
            SessionStatus::NotTradingDay { date, .. } => {
                write!(f, "{} is not a trading day", date)
            }
        }
    }
}

/// Current wall-clock time at the exchange.
pub fn exchange_now() -> NaiveDateTime {
    Utc::now().with_timezone(&EXCHANGE_TZ).naive_local()
}

/// Whether the regular session of `now`'s date has closed.
pub fn session_closed(now: NaiveDateTime) -> bool {
    let (hour, minute) = SESSION_CLOSE;
    NaiveTime::from_hms_opt(hour, minute, 0).is_some_and(|close| now.time() >= close)
}

/// Compares `date` with the latest known trading day.
pub fn classify_day(date: NaiveDate, trading_days: &[NaiveDate]) -> SessionStatus {
    match trading_days.iter().max().copied() {
        Some(last) if last == date => SessionStatus::Ready { date },
        last_trading_day => SessionStatus::NotTradingDay {
            date,
            last_trading_day,
        },
    }
}

/// Checks the clock, then the trading calendar.
pub async fn check_session(
    now: NaiveDateTime,
    quotes: &dyn QuoteSource,
    policy: RetryPolicy,
) -> Result<SessionStatus, AppError> {
    if !session_closed(now) {
        return Ok(SessionStatus::TooEarly { now });
    }

    let date = now.date();
    let trading_days =
        retry_with_backoff("trading calendar", policy, || quotes.trading_days(date)).await?;
    Ok(classify_day(date, &trading_days))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quotes::MinuteBar;
    use crate::types::Symbol;
    use pretty_assertions::assert_eq;

    struct FixedCalendar(Vec<NaiveDate>);

    #[async_trait::async_trait]
    impl QuoteSource for FixedCalendar {
        async fn minute_bars(
            &self,
            _symbol: &Symbol,
            _date: NaiveDate,
        ) -> Result<Option<Vec<MinuteBar>>, AppError> {
            Ok(None)
        }

        async fn trading_days(&self, _until: NaiveDate) -> Result<Vec<NaiveDate>, AppError> {
            Ok(self.0.clone())
        }
    }

    fn friday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2018, 3, 9).unwrap()
    }

    #[tokio::test]
    async fn test_before_close_is_too_early() {
        let now = friday().and_hms_opt(15, 59, 0).unwrap();
        let status = check_session(now, &FixedCalendar(vec![friday()]), RetryPolicy::immediate(1))
            .await
            .unwrap();
        assert_eq!(status, SessionStatus::TooEarly { now });
    }

    #[tokio::test]
    async fn test_after_close_on_trading_day_is_ready() {
        let now = friday().and_hms_opt(16, 0, 0).unwrap();
        let days = vec![friday().pred_opt().unwrap(), friday()];
        let status = check_session(now, &FixedCalendar(days), RetryPolicy::immediate(1))
            .await
            .unwrap();
        assert_eq!(status, SessionStatus::Ready { date: friday() });
        assert!(status.is_ready());
    }

    #[test]
    fn test_weekend_is_not_a_trading_day() {
        let saturday = friday().succ_opt().unwrap();
        assert_eq!(
            classify_day(saturday, &[friday()]),
            SessionStatus::NotTradingDay {
                date: saturday,
                last_trading_day: Some(friday()),
            }
        );
        assert_eq!(
            classify_day(saturday, &[]),
            SessionStatus::NotTradingDay {
                date: saturday,
                last_trading_day: None,
            }
        );
    }
}
