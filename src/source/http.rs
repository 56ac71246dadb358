// src/source/http.rs
//! HTTP page source: one pooled reqwest client per proxy.

use super::decode::PageDecoder;
use super::PageSource;
use crate::constants::ERROR_BODY_PREVIEW_LENGTH;
use crate::dispatch::{FetchedPage, Task};
use crate::error::ProxyFailure;
use crate::types::Proxy;
use chrono::NaiveDate;
use parking_lot::RwLock;
use reqwest::{Client, ClientBuilder};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Default time & sales endpoint. `{symbol}`, `{time}` and `{pageno}` are
/// substituted per task.
pub const TIME_SALES_URL: &str =
    "http://www.nasdaq.com/symbol/{symbol}/time-sales?time={time}&pageno={pageno}";

/// Connection settings for the per-proxy clients.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// URL template, see [`TIME_SALES_URL`]
    pub url_template: String,
    /// Trading day the tape belongs to; rows are stamped with it
    pub session_date: NaiveDate,
    /// Whole-request timeout
    pub request_timeout: Duration,
    /// TCP connect timeout
    pub connect_timeout: Duration,
    /// Pause after each successful page, to stay under rate limits
    pub page_delay: Duration,
}

impl SourceConfig {
    pub fn new(session_date: NaiveDate) -> Self {
        Self {
            url_template: TIME_SALES_URL.to_string(),
            session_date,
            request_timeout: Duration::from_secs(crate::constants::DEFAULT_FETCH_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(6),
            page_delay: Duration::from_millis(crate::constants::DEFAULT_PAGE_DELAY_MS),
        }
    }
}

/// Fetches time & sales pages over HTTP through the task's proxy.
pub struct HttpPageSource {
    config: SourceConfig,
    decoder: Arc<dyn PageDecoder>,
    /// One client per proxy, built on first use
    clients: RwLock<HashMap<Proxy, Client>>,
}

impl HttpPageSource {
    pub fn new(config: SourceConfig, decoder: Arc<dyn PageDecoder>) -> Self {
        Self {
            config,
            decoder,
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// URL of the page a task refers to.
    pub fn page_url(&self, task: &Task) -> String {
        self.config
            .url_template
            .replace("{symbol}", &task.symbol.to_url_segment())
            .replace("{time}", &task.dimension.to_string())
            .replace("{pageno}", &task.page_number().to_string())
    }

    /// Get or create the client bound to `proxy`.
    fn client_for(&self, proxy: &Proxy) -> Result<Client, ProxyFailure> {
        if let Some(client) = self.clients.read().get(proxy) {
            return Ok(client.clone());
        }

        let client = self.build_client(proxy).map_err(|e| ProxyFailure::Transport {
            message: format!("cannot configure proxy {}: {}", proxy, e),
        })?;
        self.clients.write().insert(proxy.clone(), client.clone());
        Ok(client)
    }

    fn build_client(&self, proxy: &Proxy) -> Result<Client, reqwest::Error> {
        ClientBuilder::new()
            .proxy(reqwest::Proxy::http(proxy.to_url())?)
            .connect_timeout(self.config.connect_timeout)
            .timeout(self.config.request_timeout)
            .pool_max_idle_per_host(2)
            .build()
    }

    /// Number of proxy-bound clients built so far.
    pub fn client_count(&self) -> usize {
        self.clients.read().len()
    }
}

#[async_trait::async_trait]
impl PageSource for HttpPageSource {
    async fn fetch_page(&self, task: &Task, proxy: &Proxy) -> Result<FetchedPage, ProxyFailure> {
        let client = self.client_for(proxy)?;
        let url = self.page_url(task);
        log::debug!("GET {} via {}", url, proxy);

        let budget = self.config.request_timeout;
        let response = client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProxyFailure::from_transport(&e, budget))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProxyFailure::Rejected {
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProxyFailure::from_transport(&e, budget))?;

        let page = self
            .decoder
            .decode(&body, self.config.session_date)
            .inspect_err(|e| {
                let preview: String = body.chars().take(ERROR_BODY_PREVIEW_LENGTH).collect();
                log::debug!("Undecodable page {} via {} ({}): {}", url, proxy, e, preview);
            })?;

        if !self.config.page_delay.is_zero() {
            tokio::time::sleep(self.config.page_delay).await;
        }
        Ok(page)
    }
}
