// src/config.rs
use crate::constants::{
    DEFAULT_DATA_DIR, DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_MIN_TRADE_VOLUME, DEFAULT_PAGE_DELAY_MS,
    DEFAULT_PROXY_FILE, DEFAULT_SYMBOL_FILE, DEFAULT_WORKER_COUNT, TIME_SLICES_PER_DAY,
};
use crate::dispatch::DispatchConfig;
use crate::error::AppError;
use crate::error_recovery::RetryPolicy;
use crate::types::ValidationError;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Parsed command-line input.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct CommandLineInput {
    /// File with proxies (host:port), separated by whitespace or commas
    #[arg(long, default_value = DEFAULT_PROXY_FILE)]
    pub proxies: String,

    /// Maximum number of concurrent fetch workers (capped by the proxy count)
    #[arg(short, long, default_value_t = DEFAULT_WORKER_COUNT)]
    pub workers: usize,

    /// CSV file of symbols to harvest; every cell is a symbol
    #[arg(short, long, default_value = DEFAULT_SYMBOL_FILE)]
    pub symbols: String,

    /// Root directory for results (files land in <data-dir>/<date>/<SYMBOL>.csv)
    #[arg(short, long, default_value = DEFAULT_DATA_DIR)]
    pub data_dir: String,

    /// Trades below this many shares are dropped
    #[arg(long, default_value_t = DEFAULT_MIN_TRADE_VOLUME)]
    pub min_volume: u64,

    /// Time budget for one page request, in seconds
    #[arg(long, default_value_t = DEFAULT_FETCH_TIMEOUT_SECS)]
    pub fetch_timeout: u64,

    /// Pause after each successfully fetched page, in milliseconds
    #[arg(long, default_value_t = DEFAULT_PAGE_DELAY_MS)]
    pub page_delay_ms: u64,

    /// Number of time slices the daily tape is split into
    #[arg(long, default_value_t = TIME_SLICES_PER_DAY)]
    pub time_slices: u32,

    /// Harvest even before the close or on a non-trading day
    #[arg(long, default_value_t = false)]
    pub skip_session_check: bool,

    /// Enable verbose logging (debug level)
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

/// Resolved harvest configuration, validated and ready to drive a run.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    pub proxy_file: PathBuf,
    pub symbol_file: PathBuf,
    pub data_dir: PathBuf,
    pub worker_count: usize,
    pub time_slices: u32,
    pub min_trade_volume: u64,
    /// Upstream request budget, enforced by the HTTP client.
    pub request_timeout: Duration,
    pub page_delay: Duration,
    pub skip_session_check: bool,
    pub verbose: bool,
    pub quote_retry: RetryPolicy,
}

impl HarvestConfig {
    /// Resolves a complete configuration from CLI input.
    pub fn resolve(cli: CommandLineInput) -> Result<Self, AppError> {
        if cli.workers == 0 {
            return Err(ValidationError::OutOfBounds {
                value: 0,
                min: 1,
                max: u64::MAX,
            }
            .into());
        }
        if cli.time_slices == 0 {
            return Err(ValidationError::OutOfBounds {
                value: 0,
                min: 1,
                max: u64::from(u32::MAX),
            }
            .into());
        }
        if cli.fetch_timeout == 0 {
            return Err(AppError::MissingConfiguration(
                "--fetch-timeout must be at least one second".to_string(),
            ));
        }
        for (flag, path) in [("--proxies", &cli.proxies), ("--symbols", &cli.symbols)] {
            if path.trim().is_empty() {
                return Err(ValidationError::InvalidFilePath {
                    path: path.clone(),
                    reason: format!("{} needs a file path", flag),
                }
                .into());
            }
        }

        Ok(HarvestConfig {
            proxy_file: PathBuf::from(cli.proxies),
            symbol_file: PathBuf::from(cli.symbols),
            data_dir: PathBuf::from(cli.data_dir),
            worker_count: cli.workers,
            time_slices: cli.time_slices,
            min_trade_volume: cli.min_volume,
            request_timeout: Duration::from_secs(cli.fetch_timeout),
            page_delay: Duration::from_millis(cli.page_delay_ms),
            skip_session_check: cli.skip_session_check,
            verbose: cli.verbose,
            quote_retry: RetryPolicy::default(),
        })
    }

    /// Dispatcher settings.
    ///
    /// A worker's fetch covers the request and the politeness pause that
    /// follows a good page, so its budget is the sum of both.
    pub fn dispatch_config(&self) -> DispatchConfig {
        DispatchConfig {
            fetch_timeout: self.request_timeout + self.page_delay,
            min_trade_volume: self.min_trade_volume,
        }
    }
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            proxy_file: PathBuf::from(DEFAULT_PROXY_FILE),
            symbol_file: PathBuf::from(DEFAULT_SYMBOL_FILE),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            worker_count: DEFAULT_WORKER_COUNT,
            time_slices: TIME_SLICES_PER_DAY,
            min_trade_volume: DEFAULT_MIN_TRADE_VOLUME,
            request_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            page_delay: Duration::from_millis(DEFAULT_PAGE_DELAY_MS),
            skip_session_check: false,
            verbose: false,
            quote_retry: RetryPolicy::default(),
        }
    }
}
