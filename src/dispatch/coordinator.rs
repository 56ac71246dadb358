// src/dispatch/coordinator.rs
//! Runs a pool of proxy-bound workers over a self-expanding task set.

use super::state::DispatchState;
use super::task::{ExitReason, Row, Task, WorkerReport};
use super::worker::FetchWorker;
use crate::constants::{DEFAULT_FETCH_TIMEOUT_SECS, DEFAULT_MIN_TRADE_VOLUME};
use crate::error::AppError;
use crate::source::PageSource;
use crate::tape::{aggregate_trades, TradeTable};
use crate::types::Proxy;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// Knobs of a dispatch run that are not part of its inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchConfig {
    /// Budget for a single page fetch; expiry burns the proxy.
    pub fetch_timeout: Duration,
    /// Trades below this many shares are dropped before aggregation.
    pub min_trade_volume: u64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
            min_trade_volume: DEFAULT_MIN_TRADE_VOLUME,
        }
    }
}

/// Result of a dispatch run.
#[derive(Debug, Clone)]
pub struct DispatchOutcome {
    /// Aggregated trades, after the volume filter.
    pub table: TradeTable,
    /// Every row fetched, in no particular order.
    pub rows: Vec<Row>,
    /// Tasks nobody could fetch because the proxies ran out.
    pub abandoned: Vec<Task>,
    pub workers: Vec<WorkerReport>,
    /// Proxies handed to workers over the run.
    pub proxies_checked_out: usize,
    /// Proxies nobody needed.
    pub proxies_left: usize,
    pub elapsed: Duration,
}

impl DispatchOutcome {
    /// True when some tasks were permanently abandoned.
    pub fn is_degraded(&self) -> bool {
        !self.abandoned.is_empty()
    }

    pub fn pages_fetched(&self) -> usize {
        self.workers.iter().map(|w| w.pages_fetched).sum()
    }

    pub fn proxy_failures(&self) -> usize {
        self.workers.iter().map(|w| w.proxy_failures).sum()
    }
}

/// Coordinates one run: seeds the shared state, fans out workers, waits for
/// the queue to drain (or for every worker to die), then aggregates.
pub struct Dispatcher {
    source: Arc<dyn PageSource>,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(source: Arc<dyn PageSource>, config: DispatchConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Fetches `initial_tasks` and everything they discover.
    ///
    /// At most `min(worker_count, proxies.len())` workers are spawned, since
    /// a worker without a proxy can do nothing. The run ends either drained
    /// (every task fetched) or degraded (all workers gone with tasks left,
    /// which are returned in [`DispatchOutcome::abandoned`]). Only a crashed
    /// worker makes it fail.
    pub async fn run(
        &self,
        initial_tasks: Vec<Task>,
        proxies: Vec<Proxy>,
        worker_count: usize,
    ) -> Result<DispatchOutcome, AppError> {
        let started = Instant::now();
        let fan_out = worker_count.min(proxies.len());

        log::info!(
            "Dispatching {} tasks over {} workers ({} proxies available)",
            initial_tasks.len(),
            fan_out,
            proxies.len()
        );

        let state = Arc::new(DispatchState::new(initial_tasks, proxies));

        let mut join_set = JoinSet::new();
        let mut worker_ids = HashMap::with_capacity(fan_out);
        for id in 0..fan_out {
            let worker = FetchWorker::new(
                id,
                Arc::clone(&state),
                Arc::clone(&self.source),
                self.config.fetch_timeout,
            );
            let handle = join_set.spawn(worker.run());
            worker_ids.insert(handle.id(), id);
        }

        let mut reports = Vec::with_capacity(fan_out);
        {
            let drained = state.queue.wait_drained();
            tokio::pin!(drained);

            loop {
                tokio::select! {
                    _ = &mut drained => {
                        log::debug!("Task queue drained; stopping workers");
                        break;
                    }
                    joined = join_set.join_next() => match joined {
                        Some(result) => {
                            let report = unpack_report(result, &worker_ids)?;
                            if report.exit == ExitReason::ProxiesExhausted {
                                log::info!(
                                    "Worker {} retired; {} still alive",
                                    report.worker,
                                    state.live_workers()
                                );
                            }
                            reports.push(report);
                        }
                        None => {
                            if !state.queue.is_drained() {
                                log::warn!(
                                    "All workers terminated with {} tasks outstanding",
                                    state.queue.outstanding()
                                );
                            }
                            break;
                        }
                    },
                }
            }
        }

        // Idle workers see the close and exit; busy ones finish their fetch
        // first. No fetch is cancelled midway.
        state.queue.close();
        while let Some(result) = join_set.join_next().await {
            reports.push(unpack_report(result, &worker_ids)?);
        }
        reports.sort_by_key(|r| r.worker);

        let abandoned = state.queue.drain_pending();
        let rows = state.collector.drain_all();
        let table = aggregate_trades(&rows, self.config.min_trade_volume);

        let outcome = DispatchOutcome {
            table,
            rows,
            abandoned,
            workers: reports,
            proxies_checked_out: state.pool.checked_out(),
            proxies_left: state.pool.remaining(),
            elapsed: started.elapsed(),
        };

        if outcome.is_degraded() {
            log::warn!(
                "Dispatch degraded: {} tasks abandoned after {} proxies were checked out{}",
                outcome.abandoned.len(),
                outcome.proxies_checked_out,
                if state.pool.is_exhausted() {
                    " and the pool ran dry"
                } else {
                    ""
                }
            );
        }
        log::info!(
            "Dispatch finished in {:?}: {} pages, {} rows, {} buckets, {} proxy failures",
            outcome.elapsed,
            outcome.pages_fetched(),
            outcome.rows.len(),
            outcome.table.len(),
            outcome.proxy_failures()
        );

        Ok(outcome)
    }
}

fn unpack_report(
    result: Result<WorkerReport, tokio::task::JoinError>,
    worker_ids: &HashMap<tokio::task::Id, usize>,
) -> Result<WorkerReport, AppError> {
    result.map_err(|e| AppError::WorkerPanicked {
        worker: worker_ids.get(&e.id()).copied().unwrap_or(usize::MAX),
        message: e.to_string(),
    })
}
