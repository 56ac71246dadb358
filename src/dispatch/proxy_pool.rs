// src/dispatch/proxy_pool.rs
//! Depletable pool of egress proxies.
//!
//! Proxies are consumed, not recycled: a worker claims one, uses it until it
//! fails and then drops it. There is no release operation, so the pool only
//! ever shrinks over a run.

use crate::error::AppError;
use crate::types::Proxy;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Thread-safe bag of proxies that have not been checked out yet.
#[derive(Debug, Default)]
pub struct ProxyPool {
    available: Mutex<VecDeque<Proxy>>,
    checked_out: AtomicUsize,
}

impl ProxyPool {
    /// Creates a pool handing out `proxies` in list order.
    pub fn new(proxies: impl IntoIterator<Item = Proxy>) -> Self {
        Self {
            available: Mutex::new(proxies.into_iter().collect()),
            checked_out: AtomicUsize::new(0),
        }
    }

    /// Claims a proxy without waiting.
    ///
    /// `None` means the pool is exhausted for the rest of the run, not that
    /// the caller should wait and retry.
    pub fn try_acquire(&self) -> Option<Proxy> {
        let proxy = self.available.lock().pop_front()?;
        self.checked_out.fetch_add(1, Ordering::SeqCst);
        Some(proxy)
    }

    /// Proxies still available for checkout.
    pub fn remaining(&self) -> usize {
        self.available.lock().len()
    }

    /// Proxies handed out so far.
    pub fn checked_out(&self) -> usize {
        self.checked_out.load(Ordering::SeqCst)
    }

    pub fn is_exhausted(&self) -> bool {
        self.available.lock().is_empty()
    }
}

/// Parses a whitespace-delimited proxy list.
///
/// Invalid entries are skipped with a warning; an empty result is not an
/// error here, the caller decides whether a run without proxies makes sense.
pub fn parse_proxy_list(content: &str) -> Vec<Proxy> {
    content
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|entry| !entry.trim().is_empty())
        .filter_map(|entry| match Proxy::parse(entry) {
            Ok(proxy) => Some(proxy),
            Err(e) => {
                log::warn!("Skipping proxy entry: {}", e);
                None
            }
        })
        .collect()
}

/// Reads and parses the proxy list at `path`.
pub fn load_proxies(path: &Path) -> Result<Vec<Proxy>, AppError> {
    let content =
        std::fs::read_to_string(path).map_err(|source| AppError::ProxyListUnreadable {
            path: path.display().to_string(),
            source,
        })?;

    let proxies = parse_proxy_list(&content);
    log::info!("Loaded {} proxies from {}", proxies.len(), path.display());
    Ok(proxies)
}
