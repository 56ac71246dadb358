// src/output/paths.rs
//! Pure path calculations for the data directory layout.
//!
//! Results land in `<data_dir>/<YYYY-MM-DD>/<SYMBOL>.csv`.

use crate::types::Symbol;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};

/// Directory holding every symbol file of one trading day.
pub fn day_dir(data_dir: &Path, date: NaiveDate) -> PathBuf {
    data_dir.join(date.format("%Y-%m-%d").to_string())
}

/// Output file for one symbol on one trading day.
pub fn symbol_csv_path(data_dir: &Path, date: NaiveDate, symbol: &Symbol) -> PathBuf {
    day_dir(data_dir, date).join(format!("{}.csv", sanitize_file_stem(symbol.as_str())))
}

/// Replaces characters that are unsafe in file names.
///
/// Symbols like `BRK/B` or `^GSPC` otherwise escape the day directory or
/// trip up shells.
pub fn sanitize_file_stem(name: &str) -> String {
    let safe: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '^' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let safe = safe.trim().trim_matches('.');
    if safe.is_empty() {
        "unnamed".to_string()
    } else {
        safe.to_string()
    }
}
