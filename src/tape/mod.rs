// src/tape/mod.rs
//! Turning raw trades into per-minute totals and joining them with quotes.

mod aggregate;
mod merge;

pub use aggregate::{aggregate_trades, TradeBucket, TradeTable};
pub use merge::{merge_minutes, MergedMinute};
