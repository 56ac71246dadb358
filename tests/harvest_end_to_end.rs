// tests/harvest_end_to_end.rs
//! Full harvest runs against in-memory quote and page sources, writing into
//! a temporary data directory.

use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use tapeharvest::source::TimeSalesDecoder;
use tapeharvest::{
    AppError, DispatchConfig, Dispatcher, FetchedPage, HarvestPlan, Harvester, MinuteBar,
    PageDecoder, PageSource, Proxy, ProxyFailure, QuoteSource, RetryPolicy, Symbol, SymbolStatus,
    Task,
};

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2018, 3, 9).unwrap()
}

/// Three minute bars for every symbol except `NOPE`.
struct Quotes;

#[async_trait::async_trait]
impl QuoteSource for Quotes {
    async fn minute_bars(
        &self,
        symbol: &Symbol,
        date: NaiveDate,
    ) -> Result<Option<Vec<MinuteBar>>, AppError> {
        if symbol.as_str() == "NOPE" {
            return Ok(None);
        }
        Ok(Some(
            (30..33)
                .map(|minute| MinuteBar {
                    timestamp: date.and_hms_opt(9, minute, 0).unwrap(),
                    open: Some(10.0),
                    high: Some(10.5),
                    low: Some(9.5),
                    close: 10.25,
                })
                .collect(),
        ))
    }

    async fn trading_days(&self, until: NaiveDate) -> Result<Vec<NaiveDate>, AppError> {
        Ok(vec![until])
    }
}

/// Serves real time & sales markup through the production decoder. Slice 1
/// has two pages; every other slice has one page and no trades.
struct HtmlTape;

fn table(rows: &[(&str, &str, &str)], last_page: Option<u32>) -> String {
    let mut html = String::from(
        r#"<html><body><table id="AfterHoursPagingContents_Table">
           <tr><th>NLS Time (ET)</th><th>NLS Price</th><th>NLS Share Volume</th></tr>"#,
    );
    for (time, price, volume) in rows {
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td></tr>",
            time, price, volume
        ));
    }
    html.push_str("</table>");
    if let Some(last) = last_page {
        html.push_str(&format!(
            r#"<ul id="pager"><li><a href="/symbol/aapl/time-sales?time=1&pageno={}">last</a></li></ul>"#,
            last
        ));
    }
    html.push_str("</body></html>");
    html
}

#[async_trait::async_trait]
impl PageSource for HtmlTape {
    async fn fetch_page(&self, task: &Task, _: &Proxy) -> Result<FetchedPage, ProxyFailure> {
        let body = match (task.dimension, task.page_number()) {
            (1, 1) => table(
                &[
                    ("09:30:05 ET", "$ 10.00", "1,000"),
                    ("09:30:41 ET", "$ 10.50", "3,000"),
                    ("09:31:02 ET", "$ 10.75", "100"),
                ],
                Some(2),
            ),
            (1, 2) => table(&[("09:32:59 ET", "$ 10.25", "2,000")], None),
            _ => table(&[], None),
        };
        TimeSalesDecoder.decode(&body, day())
    }
}

fn plan(data_dir: &std::path::Path, symbols: &[&str], proxies: usize) -> HarvestPlan {
    HarvestPlan {
        date: day(),
        symbols: symbols.iter().map(|s| Symbol::new(s).unwrap()).collect(),
        proxies: (0..proxies)
            .map(|i| Proxy::parse(&format!("127.0.0.{}:3128", i + 1)).unwrap())
            .collect(),
        worker_count: 4,
        time_slices: 3,
        data_dir: data_dir.to_path_buf(),
        quote_retry: RetryPolicy::immediate(1),
    }
}

fn harvester() -> Harvester {
    let config = DispatchConfig {
        fetch_timeout: Duration::from_secs(5),
        min_trade_volume: 1_000,
    };
    Harvester::new(Arc::new(Quotes), Dispatcher::new(Arc::new(HtmlTape), config))
}

/// Quotes and trades are merged per minute and written under the day
/// directory; symbols without quotes are skipped.
#[tokio::test]
async fn harvest_writes_merged_minutes() {
    let dir = tempfile::tempdir().unwrap();
    let summary = harvester()
        .harvest(&plan(dir.path(), &["AAPL", "NOPE"], 4))
        .await
        .unwrap();

    assert!(!summary.is_degraded());
    assert_eq!(summary.files_written(), 1);
    assert_eq!(summary.symbols[0].status, SymbolStatus::Complete);
    assert_eq!(summary.symbols[0].pages_fetched, 4);
    assert_eq!(summary.symbols[1].status, SymbolStatus::NoQuotes);
    assert!(!dir.path().join("2018-03-09").join("NOPE.csv").exists());

    let written =
        std::fs::read_to_string(dir.path().join("2018-03-09").join("AAPL.csv")).unwrap();
    assert_eq!(
        written,
        "timestamp,open,high,low,close,cost,volume,trades_count\n\
         2018-03-09 09:30:00,10.0,10.5,9.5,10.25,41500.0,4000,2\n\
         2018-03-09 09:31:00,10.0,10.5,9.5,10.25,,,\n\
         2018-03-09 09:32:00,10.0,10.5,9.5,10.25,20500.0,2000,1\n"
    );
}

/// Output files are named after the symbol as the list spells it.
#[tokio::test]
async fn output_file_keeps_the_listed_spelling() {
    let dir = tempfile::tempdir().unwrap();
    let summary = harvester()
        .harvest(&plan(dir.path(), &["aapl"], 2))
        .await
        .unwrap();

    assert_eq!(summary.files_written(), 1);
    let day = dir.path().join("2018-03-09");
    assert!(day.join("aapl.csv").exists());
    let names: Vec<String> = std::fs::read_dir(&day)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["aapl.csv".to_string()]);
}

/// With no proxies the file is still written from quotes alone and the
/// symbol is reported as degraded.
#[tokio::test]
async fn harvest_without_proxies_is_degraded() {
    let dir = tempfile::tempdir().unwrap();
    let summary = harvester()
        .harvest(&plan(dir.path(), &["AAPL"], 0))
        .await
        .unwrap();

    assert!(summary.is_degraded());
    assert_eq!(
        summary.symbols[0].status,
        SymbolStatus::Degraded { abandoned: 3 }
    );
    assert_eq!(summary.degraded_symbols(), vec![&Symbol::new("AAPL").unwrap()]);
    assert_eq!(summary.symbols[0].minutes_written, 3);
}

/// Quote downloads that keep failing mark the symbol, not the run, as failed.
#[tokio::test]
async fn failing_quotes_are_reported_per_symbol() {
    struct Down;

    #[async_trait::async_trait]
    impl QuoteSource for Down {
        async fn minute_bars(
            &self,
            _: &Symbol,
            _: NaiveDate,
        ) -> Result<Option<Vec<MinuteBar>>, AppError> {
            Err(AppError::MalformedResponse("truncated chart".into()))
        }

        async fn trading_days(&self, _: NaiveDate) -> Result<Vec<NaiveDate>, AppError> {
            Ok(vec![])
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let harvester = Harvester::new(
        Arc::new(Down),
        Dispatcher::new(Arc::new(HtmlTape), DispatchConfig::default()),
    );
    let summary = harvester
        .harvest(&plan(dir.path(), &["AAPL"], 2))
        .await
        .unwrap();

    assert!(matches!(
        summary.symbols[0].status,
        SymbolStatus::QuotesFailed { .. }
    ));
    assert!(summary.is_degraded());
    assert_eq!(summary.files_written(), 0);
}
