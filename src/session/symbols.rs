// src/session/symbols.rs
//! Reading the list of symbols to harvest.

use crate::error::AppError;
use crate::types::Symbol;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;

/// Reads symbols from CSV. Every cell is a symbol; rows may have any width.
///
/// Blank cells are skipped, invalid ones are logged and skipped, and
/// repeats keep their first position.
pub fn read_symbols<R: Read>(reader: R) -> Result<Vec<Symbol>, AppError> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut seen = HashSet::new();
    let mut symbols = Vec::new();

    for record in csv.records() {
        let record = record?;
        for cell in record.iter().filter(|cell| !cell.is_empty()) {
            match Symbol::new(cell) {
                Ok(symbol) if seen.insert(symbol.clone()) => symbols.push(symbol),
                Ok(symbol) => log::debug!("Skipping repeated symbol {}", symbol),
                Err(e) => log::warn!("Skipping symbol entry: {}", e),
            }
        }
    }

    Ok(symbols)
}

/// Loads the symbol file at `path`.
pub fn load_symbols(path: &Path) -> Result<Vec<Symbol>, AppError> {
    let file = std::fs::File::open(path).map_err(|e| {
        AppError::MissingConfiguration(format!(
            "symbol list {} could not be opened: {}",
            path.display(),
            e
        ))
    })?;
    let symbols = read_symbols(file)?;
    log::info!("Loaded {} symbols from {}", symbols.len(), path.display());
    Ok(symbols)
}
