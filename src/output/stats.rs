//! Run statistics
//!
//! Summarizes the records of a finished run for display.

use crate::crawler::ResultRecord;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

/// Summary of one run
#[derive(Debug, Clone)]
pub struct RunStatistics {
    /// Number of work items submitted
    pub total: usize,

    /// Number of records produced
    pub completed: usize,

    /// Record count per status (HTTP code or error tag)
    pub by_status: BTreeMap<String, usize>,

    /// Records carrying an extracted link
    pub links_found: usize,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunStatistics {
    /// Builds statistics from the records of a run over `total` items
    pub fn from_records(
        total: usize,
        records: &[ResultRecord],
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
    ) -> Self {
        let mut by_status = BTreeMap::new();
        for record in records {
            *by_status.entry(record.status.to_string()).or_insert(0) += 1;
        }

        Self {
            total,
            completed: records.len(),
            by_status,
            links_found: records
                .iter()
                .filter(|record| record.extracted_link.is_some())
                .count(),
            started_at,
            finished_at,
        }
    }

    /// Records whose status was usable
    pub fn usable(&self) -> usize {
        self.by_status
            .iter()
            .filter(|(status, _)| matches!(status.as_str(), "200" | "301" | "302"))
            .map(|(_, count)| count)
            .sum()
    }

    /// Wall-clock duration of the run in seconds
    pub fn duration_seconds(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds()
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &RunStatistics) {
    println!("=== Run Statistics ===\n");

    println!("completed {}/{}", stats.completed, stats.total);
    println!("  Started:  {}", stats.started_at.to_rfc3339());
    println!("  Finished: {}", stats.finished_at.to_rfc3339());
    println!("  Duration: {}s", stats.duration_seconds());
    println!();

    println!("Records by Status:");
    let mut status_counts: Vec<_> = stats.by_status.iter().collect();
    status_counts.sort_by(|a, b| b.1.cmp(a.1));

    for (status, count) in status_counts {
        let percentage = if stats.completed > 0 {
            (*count as f64 / stats.completed as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", status, count, percentage);
    }
    println!();

    println!(
        "Links extracted: {} / {} usable pages",
        stats.links_found,
        stats.usable()
    );
}
