// src/dispatch/state.rs
//! Shared state of one dispatch run.

use super::collector::ResultCollector;
use super::proxy_pool::ProxyPool;
use super::task::Task;
use super::task_queue::TaskQueue;
use crate::types::Proxy;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Everything workers share during a run.
///
/// Created by the coordinator at run start and handed to workers behind an
/// `Arc`; dropped when the run ends. Nothing here outlives a run.
#[derive(Debug, Default)]
pub struct DispatchState {
    pub queue: TaskQueue,
    pub pool: ProxyPool,
    pub collector: ResultCollector,
    live_workers: AtomicUsize,
}

impl DispatchState {
    pub fn new(
        tasks: impl IntoIterator<Item = Task>,
        proxies: impl IntoIterator<Item = Proxy>,
    ) -> Self {
        Self {
            queue: TaskQueue::with_tasks(tasks),
            pool: ProxyPool::new(proxies),
            collector: ResultCollector::new(),
            live_workers: AtomicUsize::new(0),
        }
    }

    pub(crate) fn worker_started(&self) {
        self.live_workers.fetch_add(1, Ordering::SeqCst);
    }

    /// Records a terminated worker, returning how many are still alive.
    pub(crate) fn worker_terminated(&self) -> usize {
        self.live_workers.fetch_sub(1, Ordering::SeqCst).saturating_sub(1)
    }

    pub fn live_workers(&self) -> usize {
        self.live_workers.load(Ordering::SeqCst)
    }
}
