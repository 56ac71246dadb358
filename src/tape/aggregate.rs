// src/tape/aggregate.rs
//! Groups raw trades into per-minute buckets.

use crate::dispatch::Row;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;

/// Totals for one minute of trading.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TradeBucket {
    /// Sum of `price × volume`.
    pub cost: f64,
    pub volume: u64,
    pub trades_count: u64,
}

impl TradeBucket {
    fn add(&mut self, row: &Row) {
        self.cost += row.price * row.volume as f64;
        self.volume += row.volume;
        self.trades_count += 1;
    }

    /// Volume-weighted average price of the bucket.
    pub fn vwap(&self) -> Option<f64> {
        (self.volume > 0).then(|| self.cost / self.volume as f64)
    }
}

/// Trade totals keyed by minute bucket, in time order.
pub type TradeTable = BTreeMap<NaiveDateTime, TradeBucket>;

/// Aggregates trades into minute buckets.
///
/// Trades below `min_volume` shares are discarded first; this is a
/// data-quality filter against odd lots. The result depends only on the
/// multiset of rows: rows are put in a canonical order before the
/// floating-point sums are taken, so arrival order never changes a cent.
pub fn aggregate_trades(rows: &[Row], min_volume: u64) -> TradeTable {
    let mut kept: Vec<&Row> = rows.iter().filter(|r| r.volume >= min_volume).collect();
    kept.sort_by(|a, b| {
        a.timestamp
            .cmp(&b.timestamp)
            .then(a.price.total_cmp(&b.price))
            .then(a.volume.cmp(&b.volume))
    });

    let mut table = TradeTable::new();
    for row in kept {
        table.entry(row.bucket()).or_default().add(row);
    }

    log::debug!(
        "Aggregated {} trades ({} below {} shares dropped) into {} minute buckets",
        rows.len(),
        rows.iter().filter(|r| r.volume < min_volume).count(),
        min_volume,
        table.len()
    );
    table
}
