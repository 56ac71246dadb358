// src/source/decode.rs
//! Turning a fetched time & sales page into rows and pager metadata.

use crate::dispatch::{FetchedPage, PageMetadata, Row};
use crate::error::ProxyFailure;
use chrono::{NaiveDate, NaiveDateTime};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use url::Url;

static NOT_TIME: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\d:]+").expect("static regex"));
static NOT_PRICE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\d.]+").expect("static regex"));
static NOT_DIGIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\d]+").expect("static regex"));

static TRADE_ROWS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("table#AfterHoursPagingContents_Table tr").expect("static selector")
});
static TRADE_TABLE: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("table#AfterHoursPagingContents_Table").expect("static selector")
});
static CELLS: Lazy<Selector> = Lazy::new(|| Selector::parse("td, th").expect("static selector"));
static PAGER_LINKS: Lazy<Selector> =
    Lazy::new(|| Selector::parse("ul#pager a").expect("static selector"));

/// Decodes a page body into rows and optional pagination metadata.
///
/// Returning `Err` means the body is unusable; the dispatcher treats that
/// like any other proxy failure.
pub trait PageDecoder: Send + Sync {
    fn decode(&self, body: &str, session_date: NaiveDate) -> Result<FetchedPage, ProxyFailure>;
}

/// Decoder for the time & sales HTML tape.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeSalesDecoder;

impl PageDecoder for TimeSalesDecoder {
    fn decode(&self, body: &str, session_date: NaiveDate) -> Result<FetchedPage, ProxyFailure> {
        let document = Html::parse_document(body);

        if document.select(&TRADE_TABLE).next().is_none() {
            return Err(ProxyFailure::MissingTable);
        }

        let rows: Vec<Row> = document
            .select(&TRADE_ROWS)
            .filter_map(|tr| {
                let cells: Vec<String> = tr
                    .select(&CELLS)
                    .map(|cell| cell.text().collect::<String>())
                    .collect();
                match cells.as_slice() {
                    [time, price, volume, ..] => {
                        parse_trade_cells(time, price, volume, session_date)
                    }
                    _ => None,
                }
            })
            .collect();

        let metadata = read_pager(&document);
        Ok(FetchedPage::new(rows).with_metadata(metadata))
    }
}

/// Reads the last pager link's `pageno`. `None` when there is no pager.
fn read_pager(document: &Html) -> Option<PageMetadata> {
    let last = document.select(&PAGER_LINKS).last()?;
    let href = last.value().attr("href").unwrap_or_default();
    Some(page_number_from_href(href))
}

/// Extracts the `pageno` query parameter from a (possibly relative) link.
pub fn page_number_from_href(href: &str) -> PageMetadata {
    let malformed = || PageMetadata::Malformed {
        raw: href.to_string(),
    };

    let Ok(base) = Url::parse("http://pager.invalid/") else {
        return malformed();
    };
    let Ok(url) = base.join(href) else {
        return malformed();
    };

    url.query_pairs()
        .find(|(key, _)| key == "pageno")
        .and_then(|(_, value)| value.trim().parse::<u32>().ok())
        .map(PageMetadata::MaxPage)
        .unwrap_or_else(malformed)
}

/// Cleans and parses one trade's time, price and volume cells.
///
/// Cells carry decoration such as `"10:31:07 ET"`, `"$ 182.45"` and
/// `"1,200"`. Rows that still don't parse (headers, footers) yield `None`.
pub fn parse_trade_cells(
    time: &str,
    price: &str,
    volume: &str,
    session_date: NaiveDate,
) -> Option<Row> {
    let time = NOT_TIME.replace_all(time, "");
    let mut parts = time.split(':').filter(|p| !p.is_empty());
    let hour: u32 = parts.next()?.parse().ok()?;
    let minute: u32 = parts.next()?.parse().ok()?;
    let second: u32 = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    let timestamp: NaiveDateTime = session_date.and_hms_opt(hour, minute, second)?;

    let price: f64 = NOT_PRICE.replace_all(price, "").parse().ok()?;
    let volume: u64 = NOT_DIGIT.replace_all(volume, "").parse().ok()?;

    Some(Row::new(timestamp, price, volume))
}
