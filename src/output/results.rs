//! CSV export of result records

use crate::crawler::ResultRecord;
use crate::output::OutputError;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Column order of the results file
pub const CSV_HEADERS: [&str; 4] = ["identifier", "key", "status", "extracted_link"];

/// Writes `records` to a CSV file at `path`, replacing any existing file
pub fn write_results_csv(records: &[ResultRecord], path: &Path) -> Result<(), OutputError> {
    let file = File::create(path)?;
    write_results(records, file)?;
    tracing::info!("Wrote {} result rows to {}", records.len(), path.display());
    Ok(())
}

/// Writes `records` as CSV to any writer
///
/// The status column holds the HTTP code or the error tag. A missing link is
/// an empty cell.
pub fn write_results<W: Write>(records: &[ResultRecord], writer: W) -> Result<(), OutputError> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(CSV_HEADERS)?;

    for record in records {
        writer.write_record([
            record.identifier.as_str(),
            record.key.as_str(),
            record.status.to_string().as_str(),
            record.extracted_link.as_deref().unwrap_or(""),
        ])?;
    }

    writer.flush()?;
    Ok(())
}
