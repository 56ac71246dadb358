// src/tape/merge.rs
//! Left join of minute quotes with aggregated trades.

use super::aggregate::{TradeBucket, TradeTable};
use crate::quotes::MinuteBar;

/// One output line: a minute bar and, if any trades landed in that minute,
/// their totals.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedMinute {
    pub bar: MinuteBar,
    pub trades: Option<TradeBucket>,
}

/// Joins `bars` with `trades` on the minute timestamp.
///
/// Every bar is kept, in input order; trade buckets without a matching bar
/// are dropped.
pub fn merge_minutes(bars: &[MinuteBar], trades: &TradeTable) -> Vec<MergedMinute> {
    let merged: Vec<MergedMinute> = bars
        .iter()
        .map(|bar| MergedMinute {
            bar: bar.clone(),
            trades: trades.get(&bar.timestamp).copied(),
        })
        .collect();

    let matched = merged.iter().filter(|m| m.trades.is_some()).count();
    if matched < trades.len() {
        log::debug!(
            "{} trade buckets fell outside the quote series",
            trades.len() - matched
        );
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};
    use pretty_assertions::assert_eq;

    fn at(minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 5, 6)
            .unwrap()
            .and_hms_opt(9, minute, 0)
            .unwrap()
    }

    fn bar(minute: u32) -> MinuteBar {
        MinuteBar {
            timestamp: at(minute),
            open: Some(1.0),
            high: Some(2.0),
            low: Some(0.5),
            close: 1.5,
        }
    }

    #[test]
    fn test_left_join_keeps_every_bar() {
        let bucket = TradeBucket {
            cost: 15_000.0,
            volume: 1_000,
            trades_count: 1,
        };
        let mut trades = TradeTable::new();
        trades.insert(at(31), bucket);
        trades.insert(at(59), bucket);

        let merged = merge_minutes(&[bar(30), bar(31), bar(32)], &trades);

        assert_eq!(merged.len(), 3);
        assert_eq!(merged[0].trades, None);
        assert_eq!(merged[1].trades, Some(bucket));
        assert_eq!(merged[2].trades, None);
    }
}
