// src/dispatch/worker.rs
//! A fetch worker: one proxy at a time, one task at a time.
//!
//! Workers pull tasks from the shared queue and fetch them through their
//! current proxy. A successful fetch stores rows and may enqueue the rest of
//! a dimension's pages. A failed fetch burns the proxy; the worker claims a
//! replacement and retries the same task privately, or, if the pool is dry,
//! hands the task back to the queue and stops.

use super::state::DispatchState;
use super::task::{discover_pages, Discovery, ExitReason, FetchedPage, Task, WorkerReport};
use crate::error::ProxyFailure;
use crate::source::PageSource;
use crate::types::Proxy;
use std::sync::Arc;
use std::time::Duration;

/// Lifecycle of a worker.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerState {
    /// Holding a proxy. `retry` is a task kept back after a proxy failure;
    /// it is fetched before anything else is popped.
    Running { proxy: Proxy, retry: Option<Task> },
    /// The proxy just failed on `task`; a replacement is needed.
    AwaitingProxy { task: Task },
    /// The queue is drained or closed and the worker holds nothing.
    Draining,
    Terminated(ExitReason),
}

/// One concurrent fetch worker.
pub struct FetchWorker {
    id: usize,
    state: Arc<DispatchState>,
    source: Arc<dyn PageSource>,
    fetch_timeout: Duration,
    report: WorkerReport,
}

impl FetchWorker {
    /// Creates a worker and counts it as live.
    pub fn new(
        id: usize,
        state: Arc<DispatchState>,
        source: Arc<dyn PageSource>,
        fetch_timeout: Duration,
    ) -> Self {
        state.worker_started();
        Self {
            id,
            state,
            source,
            fetch_timeout,
            report: WorkerReport::new(id),
        }
    }

    /// Drives the worker until it terminates, returning its report.
    pub async fn run(mut self) -> WorkerReport {
        let mut current = self.claim_initial_proxy();

        loop {
            current = match current {
                WorkerState::Terminated(exit) => {
                    self.report.exit = exit;
                    break;
                }
                WorkerState::Running { proxy, retry } => self.run_task(proxy, retry).await,
                WorkerState::AwaitingProxy { task } => self.rotate_proxy(task),
                WorkerState::Draining => WorkerState::Terminated(ExitReason::Drained),
            };
        }

        let alive = self.state.worker_terminated();
        log::debug!(
            "Worker {} terminated ({:?}); {} workers still alive",
            self.id,
            self.report.exit,
            alive
        );
        self.report
    }

    /// A worker that cannot claim a proxy at startup never runs.
    fn claim_initial_proxy(&mut self) -> WorkerState {
        match self.state.pool.try_acquire() {
            Some(proxy) => {
                log::debug!("Worker {} starting with proxy {}", self.id, proxy);
                self.report.proxies_used.push(proxy.clone());
                WorkerState::Running { proxy, retry: None }
            }
            None => {
                log::warn!("Worker {} found no proxy at startup", self.id);
                WorkerState::Terminated(ExitReason::NoProxyAtStartup)
            }
        }
    }

    /// Running: take the retained task or pop one, then fetch it.
    async fn run_task(&mut self, proxy: Proxy, retry: Option<Task>) -> WorkerState {
        let task = match retry {
            Some(task) => task,
            None => match self.state.queue.pop().await {
                Some(task) => task,
                None => return WorkerState::Draining,
            },
        };

        log::debug!("Worker {} fetching {} via {}", self.id, task, proxy);

        match self.fetch(&task, &proxy).await {
            Ok(page) => {
                self.complete(&task, page);
                WorkerState::Running { proxy, retry: None }
            }
            Err(failure) => {
                self.report.proxy_failures += 1;
                log::warn!(
                    "Worker {}: proxy {} failed on {} ({}): {}",
                    self.id,
                    proxy,
                    task,
                    failure.kind(),
                    failure
                );
                WorkerState::AwaitingProxy { task }
            }
        }
    }

    async fn fetch(&self, task: &Task, proxy: &Proxy) -> Result<FetchedPage, ProxyFailure> {
        match tokio::time::timeout(self.fetch_timeout, self.source.fetch_page(task, proxy)).await
        {
            Ok(result) => result,
            Err(_) => Err(ProxyFailure::Timeout {
                after: self.fetch_timeout,
            }),
        }
    }

    /// Stores rows, enqueues discovered pages, then marks the task done.
    fn complete(&mut self, task: &Task, page: FetchedPage) {
        let FetchedPage { rows, metadata } = page;
        self.report.pages_fetched += 1;
        self.report.rows_collected += rows.len();
        self.state.collector.push(rows);

        match discover_pages(task, metadata.as_ref()) {
            Discovery::Pages(more) if !more.is_empty() => {
                log::debug!("{} discovered {} more pages", task, more.len());
                self.report.tasks_discovered += self.state.queue.push_all(more);
            }
            Discovery::Pages(_) => {}
            Discovery::Malformed { reason } => {
                log::warn!("{}: ignoring pager ({})", task, reason);
            }
        }

        // Discovered work is queued before this task stops counting as in
        // flight, so the queue cannot look drained in between.
        self.state.queue.mark_done();
    }

    /// AwaitingProxy: claim a replacement or give the task back and stop.
    fn rotate_proxy(&mut self, task: Task) -> WorkerState {
        match self.state.pool.try_acquire() {
            Some(proxy) => {
                log::info!(
                    "Worker {} rotated to proxy {} ({} left) to retry {}",
                    self.id,
                    proxy,
                    self.state.pool.remaining(),
                    task
                );
                self.report.proxies_used.push(proxy.clone());
                WorkerState::Running {
                    proxy,
                    retry: Some(task),
                }
            }
            None => {
                log::warn!(
                    "Worker {}: proxy pool exhausted, returning {} to the queue and stopping",
                    self.id,
                    task
                );
                self.state.queue.requeue(task);
                WorkerState::Terminated(ExitReason::ProxiesExhausted)
            }
        }
    }
}
