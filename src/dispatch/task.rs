// src/dispatch/task.rs
//! Work items, fetch results and per-worker reports for the dispatcher.

use crate::constants::{FIRST_PAGE, MAX_PAGES_PER_DIMENSION};
use crate::types::{Proxy, Symbol};
use chrono::{NaiveDateTime, Timelike};
use std::fmt;

/// One fetchable page of one pagination dimension of one symbol.
///
/// `page` is `None` for the first page of a dimension (the page count is not
/// known yet) and `Some(n)` for pages discovered from its pager.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Task {
    pub symbol: Symbol,
    pub dimension: u32,
    pub page: Option<u32>,
}

impl Task {
    /// The first page of a dimension.
    pub fn first_page(symbol: Symbol, dimension: u32) -> Self {
        Self {
            symbol,
            dimension,
            page: None,
        }
    }

    /// A page discovered from the first page's pager.
    pub fn discovered(symbol: Symbol, dimension: u32, page: u32) -> Self {
        Self {
            symbol,
            dimension,
            page: Some(page),
        }
    }

    /// Seeds one first-page task per dimension, `1..=dimensions`.
    pub fn seed(symbol: &Symbol, dimensions: u32) -> Vec<Self> {
        (1..=dimensions)
            .map(|dimension| Self::first_page(symbol.clone(), dimension))
            .collect()
    }

    pub fn is_first_page(&self) -> bool {
        self.page.is_none()
    }

    /// Page number to request upstream.
    pub fn page_number(&self) -> u32 {
        self.page.unwrap_or(FIRST_PAGE)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.page {
            Some(page) => write!(f, "{}/slice {}/page {}", self.symbol, self.dimension, page),
            None => write!(f, "{}/slice {}/first page", self.symbol, self.dimension),
        }
    }
}

/// One executed trade from the tape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Row {
    pub timestamp: NaiveDateTime,
    pub price: f64,
    pub volume: u64,
}

impl Row {
    pub fn new(timestamp: NaiveDateTime, price: f64, volume: u64) -> Self {
        Self {
            timestamp,
            price,
            volume,
        }
    }

    /// The minute bucket this trade belongs to.
    pub fn bucket(&self) -> NaiveDateTime {
        self.timestamp
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(self.timestamp)
    }
}

/// Pagination information found on a first page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageMetadata {
    /// The pager links up to this page number.
    MaxPage(u32),
    /// A pager was present but its page count could not be read.
    Malformed { raw: String },
}

/// What a successful fetch returns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FetchedPage {
    pub rows: Vec<Row>,
    pub metadata: Option<PageMetadata>,
}

impl FetchedPage {
    pub fn new(rows: Vec<Row>) -> Self {
        Self {
            rows,
            metadata: None,
        }
    }

    pub fn with_max_page(mut self, max_page: u32) -> Self {
        self.metadata = Some(PageMetadata::MaxPage(max_page));
        self
    }

    pub fn with_metadata(mut self, metadata: Option<PageMetadata>) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Outcome of interpreting a fetched page's pager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    /// New tasks to enqueue (possibly none).
    Pages(Vec<Task>),
    /// The pager could not be interpreted; nothing is enqueued.
    Malformed { reason: String },
}

/// Plans the follow-up tasks for a fetched page.
///
/// Only first pages discover work: a first page reporting `MaxPage(n)`
/// yields pages `2..=n`. Subsequent pages never discover anything, which
/// keeps a dimension from being expanded twice.
pub fn discover_pages(task: &Task, metadata: Option<&PageMetadata>) -> Discovery {
    if !task.is_first_page() {
        return Discovery::Pages(vec![]);
    }

    match metadata {
        None => Discovery::Pages(vec![]),
        Some(PageMetadata::MaxPage(max)) if *max > MAX_PAGES_PER_DIMENSION => Discovery::Malformed {
            reason: format!(
                "pager advertises {} pages (limit {})",
                max, MAX_PAGES_PER_DIMENSION
            ),
        },
        Some(PageMetadata::MaxPage(max)) => Discovery::Pages(
            (FIRST_PAGE + 1..=*max)
                .map(|page| Task::discovered(task.symbol.clone(), task.dimension, page))
                .collect(),
        ),
        Some(PageMetadata::Malformed { raw }) => Discovery::Malformed {
            reason: format!("unreadable page count {:?}", raw),
        },
    }
}

/// Why a worker stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitReason {
    /// The queue was drained or closed while the worker was idle.
    Drained,
    /// No proxy could be claimed at startup; the worker never ran.
    NoProxyAtStartup,
    /// The pool ran dry after a proxy failure; the held task was requeued.
    ProxiesExhausted,
}

/// Per-worker accounting returned when a worker terminates.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkerReport {
    pub worker: usize,
    pub pages_fetched: usize,
    pub rows_collected: usize,
    pub tasks_discovered: usize,
    pub proxy_failures: usize,
    pub proxies_used: Vec<Proxy>,
    pub exit: ExitReason,
}

impl WorkerReport {
    pub fn new(worker: usize) -> Self {
        Self {
            worker,
            pages_fetched: 0,
            rows_collected: 0,
            tasks_discovered: 0,
            proxy_failures: 0,
            proxies_used: Vec::new(),
            exit: ExitReason::Drained,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn symbol() -> Symbol {
        Symbol::new("A").unwrap()
    }

    #[test]
    fn test_seed_creates_one_first_page_per_dimension() {
        let tasks = Task::seed(&symbol(), 13);
        assert_eq!(tasks.len(), 13);
        assert!(tasks.iter().all(Task::is_first_page));
        assert_eq!(tasks[0].dimension, 1);
        assert_eq!(tasks[12].dimension, 13);
    }

    #[test]
    fn test_max_page_three_discovers_exactly_two_pages() {
        let task = Task::first_page(symbol(), 4);
        let discovery = discover_pages(&task, Some(&PageMetadata::MaxPage(3)));
        assert_eq!(
            discovery,
            Discovery::Pages(vec![
                Task::discovered(symbol(), 4, 2),
                Task::discovered(symbol(), 4, 3),
            ])
        );
    }

    #[test]
    fn test_single_page_and_missing_pager_discover_nothing() {
        let task = Task::first_page(symbol(), 1);
        assert_eq!(
            discover_pages(&task, Some(&PageMetadata::MaxPage(1))),
            Discovery::Pages(vec![])
        );
        assert_eq!(discover_pages(&task, None), Discovery::Pages(vec![]));
    }

    #[test]
    fn test_discovered_pages_never_discover_again() {
        let task = Task::discovered(symbol(), 1, 2);
        assert_eq!(
            discover_pages(&task, Some(&PageMetadata::MaxPage(9))),
            Discovery::Pages(vec![])
        );
    }

    #[test]
    fn test_malformed_pager_is_reported() {
        let task = Task::first_page(symbol(), 1);
        let discovery = discover_pages(
            &task,
            Some(&PageMetadata::Malformed {
                raw: "pageno=abc".into(),
            }),
        );
        assert!(matches!(discovery, Discovery::Malformed { .. }));

        let absurd = discover_pages(&task, Some(&PageMetadata::MaxPage(u32::MAX)));
        assert!(matches!(absurd, Discovery::Malformed { .. }));
    }

    #[test]
    fn test_row_bucket_truncates_to_minute() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(10, 15, 42)
            .unwrap();
        let row = Row::new(ts, 1.0, 1);
        assert_eq!(
            row.bucket(),
            NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(10, 15, 0)
                .unwrap()
        );
    }
}
