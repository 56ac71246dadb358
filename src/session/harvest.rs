// src/session/harvest.rs
//! The per-symbol harvest loop: quotes, trade tape, merge, write.

use crate::dispatch::{DispatchOutcome, Dispatcher, Task};
use crate::error::AppError;
use crate::error_recovery::{retry_with_backoff, RetryPolicy};
use crate::output::{create_directory, day_dir, symbol_csv_path, write_merged_csv};
use crate::quotes::QuoteSource;
use crate::tape::merge_minutes;
use crate::types::{Proxy, Symbol};
use chrono::NaiveDate;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Everything a harvest run needs besides its collaborators.
#[derive(Debug, Clone)]
pub struct HarvestPlan {
    pub date: NaiveDate,
    pub symbols: Vec<Symbol>,
    /// Proxy list; every symbol starts with a fresh pool built from it.
    pub proxies: Vec<Proxy>,
    pub worker_count: usize,
    pub time_slices: u32,
    pub data_dir: PathBuf,
    pub quote_retry: RetryPolicy,
}

/// What happened to one symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolStatus {
    /// Every page was fetched and the file written.
    Complete,
    /// The file was written, but `abandoned` pages could not be fetched.
    Degraded { abandoned: usize },
    /// The quote endpoint has no series for the symbol; nothing written.
    NoQuotes,
    /// Minute quotes could not be downloaded; nothing written.
    QuotesFailed { reason: String },
}

#[derive(Debug, Clone)]
pub struct SymbolReport {
    pub symbol: Symbol,
    pub status: SymbolStatus,
    pub path: Option<PathBuf>,
    pub minutes_written: usize,
    pub trades_kept: u64,
    pub pages_fetched: usize,
    pub proxy_failures: usize,
    pub elapsed: Duration,
}

impl SymbolReport {
    fn skipped(symbol: Symbol, status: SymbolStatus, elapsed: Duration) -> Self {
        Self {
            symbol,
            status,
            path: None,
            minutes_written: 0,
            trades_kept: 0,
            pages_fetched: 0,
            proxy_failures: 0,
            elapsed,
        }
    }

    /// True when the symbol's output is missing or incomplete.
    pub fn needs_attention(&self) -> bool {
        matches!(
            self.status,
            SymbolStatus::Degraded { .. } | SymbolStatus::QuotesFailed { .. }
        )
    }
}

/// Result of a whole harvest run.
#[derive(Debug, Clone)]
pub struct HarvestSummary {
    pub date: NaiveDate,
    pub symbols: Vec<SymbolReport>,
    pub elapsed: Duration,
}

impl HarvestSummary {
    pub fn is_degraded(&self) -> bool {
        self.symbols.iter().any(SymbolReport::needs_attention)
    }

    pub fn degraded_symbols(&self) -> Vec<&Symbol> {
        self.symbols
            .iter()
            .filter(|r| r.needs_attention())
            .map(|r| &r.symbol)
            .collect()
    }

    pub fn files_written(&self) -> usize {
        self.symbols.iter().filter(|r| r.path.is_some()).count()
    }
}

/// Drives quotes and the dispatcher symbol by symbol.
pub struct Harvester {
    quotes: Arc<dyn QuoteSource>,
    dispatcher: Dispatcher,
}

impl Harvester {
    pub fn new(quotes: Arc<dyn QuoteSource>, dispatcher: Dispatcher) -> Self {
        Self { quotes, dispatcher }
    }

    /// Harvests every symbol of `plan` in order.
    ///
    /// Symbol-level trouble (no quotes, exhausted proxies) is recorded in the
    /// summary and the run moves on. I/O errors and crashed workers abort.
    pub async fn harvest(&self, plan: &HarvestPlan) -> Result<HarvestSummary, AppError> {
        let started = Instant::now();
        create_directory(&day_dir(&plan.data_dir, plan.date))?;

        log::info!(
            "Harvesting {} symbols for {} with {} proxies",
            plan.symbols.len(),
            plan.date,
            plan.proxies.len()
        );

        let mut reports = Vec::with_capacity(plan.symbols.len());
        for symbol in &plan.symbols {
            let report = self.harvest_symbol(plan, symbol).await?;
            log::info!(
                "{}: {:?} ({} minutes, {} pages) in {:.1?}",
                report.symbol,
                report.status,
                report.minutes_written,
                report.pages_fetched,
                report.elapsed
            );
            reports.push(report);
        }

        Ok(HarvestSummary {
            date: plan.date,
            symbols: reports,
            elapsed: started.elapsed(),
        })
    }

    /// Harvests one symbol.
    pub async fn harvest_symbol(
        &self,
        plan: &HarvestPlan,
        symbol: &Symbol,
    ) -> Result<SymbolReport, AppError> {
        let started = Instant::now();
        let what = format!("minute quotes for {}", symbol);

        let bars = match retry_with_backoff(&what, plan.quote_retry, || {
            self.quotes.minute_bars(symbol, plan.date)
        })
        .await
        {
            Ok(Some(bars)) => bars,
            Ok(None) => {
                log::warn!("No minute quotes for {}; skipping", symbol);
                return Ok(SymbolReport::skipped(
                    symbol.clone(),
                    SymbolStatus::NoQuotes,
                    started.elapsed(),
                ));
            }
            Err(e) => {
                log::error!("Giving up on {}: {}", what, e);
                return Ok(SymbolReport::skipped(
                    symbol.clone(),
                    SymbolStatus::QuotesFailed {
                        reason: e.to_string(),
                    },
                    started.elapsed(),
                ));
            }
        };

        let outcome: DispatchOutcome = self
            .dispatcher
            .run(
                Task::seed(symbol, plan.time_slices),
                plan.proxies.clone(),
                plan.worker_count,
            )
            .await?;

        let status = if outcome.is_degraded() {
            log::warn!(
                "{}: {} pages abandoned after every proxy failed; writing partial tape",
                symbol,
                outcome.abandoned.len()
            );
            SymbolStatus::Degraded {
                abandoned: outcome.abandoned.len(),
            }
        } else {
            SymbolStatus::Complete
        };

        let merged = merge_minutes(&bars, &outcome.table);
        let path = symbol_csv_path(&plan.data_dir, plan.date, symbol);
        let minutes_written = write_merged_csv(&path, &merged)?;

        Ok(SymbolReport {
            symbol: symbol.clone(),
            status,
            path: Some(path),
            minutes_written,
            trades_kept: outcome.table.values().map(|b| b.trades_count).sum(),
            pages_fetched: outcome.pages_fetched(),
            proxy_failures: outcome.proxy_failures(),
            elapsed: started.elapsed(),
        })
    }
}
