// src/constants.rs
//! Domain constants that define the operational boundaries of the system.
//!
//! Each constant is named for the domain concept it constrains, not its
//! technical role. Reading these constants should tell you how a harvest
//! runs: when the market closes, how a trading day is sliced, how long a
//! proxy gets to answer and what counts as a meaningful trade.

// ---------------------------------------------------------------------------
// Trading session
// ---------------------------------------------------------------------------

/// Exchange time zone all timestamps are expressed in.
pub const EXCHANGE_TZ: chrono_tz::Tz = chrono_tz::America::New_York;

/// Regular session open (hour, minute) in exchange time.
pub const SESSION_OPEN: (u32, u32) = (9, 30);

/// Regular session close (hour, minute) in exchange time. Harvesting
/// refuses to start before this.
pub const SESSION_CLOSE: (u32, u32) = (16, 0);

/// How far back the daily chart is requested when looking for the latest
/// trading day. Twenty calendar days always contain at least one session.
pub const TRADING_CALENDAR_LOOKBACK_DAYS: i64 = 20;

// ---------------------------------------------------------------------------
// Time & sales pagination
// ---------------------------------------------------------------------------

/// Number of time-slices the time & sales tape is split into per day. Each
/// slice is an independent pagination dimension.
pub const TIME_SLICES_PER_DAY: u32 = 13;

/// First page of every dimension. Discovered pages start after it.
pub const FIRST_PAGE: u32 = 1;

/// Upper bound on discovered pages per dimension. A pager advertising more
/// than this is treated as malformed.
pub const MAX_PAGES_PER_DIMENSION: u32 = 10_000;

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Default number of concurrent fetch workers. Capped by the proxy count.
pub const DEFAULT_WORKER_COUNT: usize = 100;

/// Default per-fetch time budget in seconds.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 12;

/// Default politeness delay after a successful page, in milliseconds.
pub const DEFAULT_PAGE_DELAY_MS: u64 = 5_000;

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// Trades smaller than this many shares are dropped before aggregation.
pub const DEFAULT_MIN_TRADE_VOLUME: u64 = 1_000;

// ---------------------------------------------------------------------------
// Outer retry loop
// ---------------------------------------------------------------------------

/// Attempts made for a whole-symbol quote download before giving up.
pub const QUOTE_RETRY_ATTEMPTS: u32 = 5;

/// First backoff delay between quote download attempts, in seconds.
pub const QUOTE_RETRY_INITIAL_DELAY_SECS: u64 = 10;

/// Cap on the backoff delay between quote download attempts, in seconds.
pub const QUOTE_RETRY_MAX_DELAY_SECS: u64 = 160;

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

pub const DEFAULT_PROXY_FILE: &str = "proxies_approved.csv";
pub const DEFAULT_SYMBOL_FILE: &str = "stocks_for_scrapping.csv";
pub const DEFAULT_DATA_DIR: &str = "data";

/// Maximum characters shown when previewing unexpected response bodies.
pub const ERROR_BODY_PREVIEW_LENGTH: usize = 200;
