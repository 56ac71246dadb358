// src/dispatch/mod.rs
//! The proxy-rotating dispatcher.
//!
//! A run seeds a [`TaskQueue`] with one task per pagination dimension and
//! fans out [`FetchWorker`]s, each bound to a proxy claimed from a
//! [`ProxyPool`]. Workers push rows into a [`ResultCollector`] and feed
//! discovered pages back into the queue. The [`Dispatcher`] waits for the
//! queue to drain, or for every worker to give up, and aggregates.

mod collector;
mod coordinator;
mod proxy_pool;
mod state;
mod task;
mod task_queue;
mod worker;

pub use collector::ResultCollector;
pub use coordinator::{DispatchConfig, DispatchOutcome, Dispatcher};
pub use proxy_pool::{load_proxies, parse_proxy_list, ProxyPool};
pub use state::DispatchState;
pub use task::{
    discover_pages, Discovery, ExitReason, FetchedPage, PageMetadata, Row, Task, WorkerReport,
};
pub use task_queue::TaskQueue;
pub use worker::{FetchWorker, WorkerState};
