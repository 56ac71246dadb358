// src/output/mod.rs
//! Result persistence: where files go and how they are written.

mod paths;
mod writer;

pub use paths::{day_dir, sanitize_file_stem, symbol_csv_path};
pub use writer::{create_directory, write_merged_csv};
