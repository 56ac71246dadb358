// src/dispatch/collector.rs
//! Thread-safe accumulation point for rows produced by all workers.

use super::task::Row;
use parking_lot::Mutex;

/// Multi-producer row sink. Arrival order carries no meaning.
#[derive(Debug, Default)]
pub struct ResultCollector {
    rows: Mutex<Vec<Row>>,
}

impl ResultCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores all rows of one fetched page.
    pub fn push(&self, rows: impl IntoIterator<Item = Row>) {
        self.rows.lock().extend(rows);
    }

    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }

    /// Takes every collected row, leaving the collector empty.
    pub fn drain_all(&self) -> Vec<Row> {
        std::mem::take(&mut *self.rows.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn row(minute: u32, volume: u64) -> Row {
        let ts = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(10, minute, 0)
            .unwrap();
        Row::new(ts, 1.0, volume)
    }

    #[test]
    fn test_drain_all_empties_the_collector() {
        let collector = ResultCollector::new();
        collector.push(vec![row(1, 10), row(2, 20)]);
        assert_eq!(collector.len(), 2);

        let rows = collector.drain_all();
        assert_eq!(rows.len(), 2);
        assert!(collector.is_empty());
        assert!(collector.drain_all().is_empty());
    }

    #[test]
    fn test_concurrent_pushes_are_all_kept() {
        let collector = Arc::new(ResultCollector::new());
        let handles: Vec<_> = (0..8u64)
            .map(|worker| {
                let collector = Arc::clone(&collector);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        collector.push([row((i % 60) as u32, worker)]);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(collector.drain_all().len(), 400);
    }
}
