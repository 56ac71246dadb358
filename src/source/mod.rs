// src/source/mod.rs
//! Page fetching: the ability to retrieve one page of a trade tape through
//! one proxy.
//!
//! The dispatcher depends only on [`PageSource`]; HTTP transport and page
//! decoding are adapters behind it.

pub mod decode;
pub mod http;

use crate::dispatch::{FetchedPage, Task};
use crate::error::ProxyFailure;
use crate::types::Proxy;

/// The ability to fetch one page of trades through a given proxy.
///
/// Every failure is proxy-attributable: the dispatcher answers any `Err` by
/// dropping the proxy and retrying the task through another one.
/// Implementations should bound their own I/O; the dispatcher additionally
/// wraps each call in its fetch timeout.
#[async_trait::async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, task: &Task, proxy: &Proxy) -> Result<FetchedPage, ProxyFailure>;
}

pub use decode::{PageDecoder, TimeSalesDecoder};
pub use http::{HttpPageSource, SourceConfig, TIME_SALES_URL};
