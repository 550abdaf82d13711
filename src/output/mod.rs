//! Output module for run results
//!
//! This module handles:
//! - Exporting result records as CSV
//! - Summarizing a run into statistics

mod results;
pub mod stats;

pub use results::{write_results, write_results_csv, CSV_HEADERS};
pub use stats::{print_statistics, RunStatistics};

use thiserror::Error;

/// Errors raised while writing run output
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to write CSV: {0}")]
    Csv(#[from] csv::Error),
}
