// src/lib.rs
//! tapeharvest library: a proxy-rotating, self-expanding page dispatcher and
//! the intraday trade harvest built on it.
//!
//! # Public API
//!
//! The library exposes types organized by concern:
//! - **Error handling**: `AppError`, `ProxyFailure`, `ValidationError`
//! - **Configuration**: `CommandLineInput`, `HarvestConfig`
//! - **Dispatch**: `Dispatcher`, `TaskQueue`, `ProxyPool`, `FetchWorker`, `ResultCollector`
//! - **Page sources**: `PageSource`, `HttpPageSource`, `TimeSalesDecoder`
//! - **Tape**: `aggregate_trades`, `merge_minutes`
//! - **Session**: `Harvester`, `check_session`, `load_symbols`

mod config;
pub mod constants;
pub mod dispatch;
mod error;
mod error_recovery;
pub mod output;
pub mod quotes;
pub mod session;
pub mod source;
pub mod tape;
pub mod types;

// --- Error Handling ---
pub use crate::error::{AppError, ProxyFailure, Result};
pub use crate::types::ValidationError;

// --- Configuration ---
pub use crate::config::{CommandLineInput, HarvestConfig};
pub use crate::error_recovery::{retry_with_backoff, RetryPolicy};

// --- Domain Types ---
pub use crate::types::{Proxy, Symbol};

// --- Dispatch ---
pub use crate::dispatch::{
    DispatchConfig, DispatchOutcome, Dispatcher, ExitReason, FetchedPage, PageMetadata, Row, Task,
    WorkerReport,
};

// --- Sources ---
pub use crate::quotes::{ChartClient, MinuteBar, QuoteSource};
pub use crate::source::{HttpPageSource, PageDecoder, PageSource, TimeSalesDecoder};

// --- Tape ---
pub use crate::tape::{aggregate_trades, merge_minutes, MergedMinute, TradeBucket, TradeTable};

// --- Session ---
pub use crate::session::{
    check_session, HarvestPlan, HarvestSummary, Harvester, SessionStatus, SymbolStatus,
};
