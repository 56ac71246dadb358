// src/output/writer.rs
//! Writes merged minute series to disk.
//!
//! This module is the only place where result files are written.

use crate::error::AppError;
use crate::tape::MergedMinute;
use serde::Serialize;
use std::fs;
use std::path::Path;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One CSV line. Missing values are written as empty cells.
#[derive(Debug, Serialize)]
struct CsvLine {
    timestamp: String,
    open: Option<f64>,
    high: Option<f64>,
    low: Option<f64>,
    close: f64,
    cost: Option<f64>,
    volume: Option<u64>,
    trades_count: Option<u64>,
}

impl From<&MergedMinute> for CsvLine {
    fn from(minute: &MergedMinute) -> Self {
        let bar = &minute.bar;
        Self {
            timestamp: bar.timestamp.format(TIMESTAMP_FORMAT).to_string(),
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            cost: minute.trades.map(|t| t.cost),
            volume: minute.trades.map(|t| t.volume),
            trades_count: minute.trades.map(|t| t.trades_count),
        }
    }
}

/// Writes `minutes` as CSV to `path`, replacing any existing file.
///
/// Returns the number of data lines written.
pub fn write_merged_csv(path: &Path, minutes: &[MergedMinute]) -> Result<usize, AppError> {
    if let Some(parent) = path.parent() {
        create_directory(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    for minute in minutes {
        writer.serialize(CsvLine::from(minute))?;
    }
    writer.flush()?;

    log::info!("Wrote {} minutes to {}", minutes.len(), path.display());
    Ok(minutes.len())
}

/// Creates a directory, tolerating one that already exists.
pub fn create_directory(path: &Path) -> Result<(), AppError> {
    if path.as_os_str().is_empty() {
        return Ok(());
    }
    if path.exists() {
        if path.is_dir() {
            return Ok(());
        }
        return Err(AppError::Io(std::io::Error::new(
            std::io::ErrorKind::AlreadyExists,
            format!("Path exists but is not a directory: {}", path.display()),
        )));
    }

    fs::create_dir_all(path)?;
    log::debug!("Created directory: {}", path.display());
    Ok(())
}
