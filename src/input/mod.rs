//! Work-item loading
//!
//! Reads `key,identifier` lines into an ordered list of work items.

use crate::crawler::WorkItem;
use crate::InputError;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

/// Quote character removed everywhere in a field
const QUOTE: char = '"';

/// Loads work items from a `key,identifier` file
///
/// # Returns
///
/// * `Ok(Vec<WorkItem>)` - Items in file order, duplicates folded
/// * `Err(NotFound)` - The file does not exist
/// * `Err(Malformed)` - A line does not hold exactly one delimiter
pub fn load_work_items(path: &Path) -> Result<Vec<WorkItem>, InputError> {
    if !path.is_file() {
        return Err(InputError::NotFound(path.display().to_string()));
    }

    let file = std::fs::File::open(path).map_err(csv::Error::from)?;
    let items = read_work_items(file)?;
    tracing::info!("Loaded {} work items from {}", items.len(), path.display());
    Ok(items)
}

/// Reads work items from any reader
///
/// Every quote character is removed from both fields, then surrounding
/// whitespace is trimmed. A line without the delimiter, blank lines
/// included, fails the whole load; empty fields next to a delimiter are
/// kept. When an identifier repeats, the later key replaces the earlier one
/// but keeps the earlier position.
pub fn read_work_items<R: Read>(reader: R) -> Result<Vec<WorkItem>, InputError> {
    let mut builder = csv::ReaderBuilder::new();
    builder.has_headers(false).quoting(false).flexible(true);

    let mut items: Vec<WorkItem> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    // The csv reader drops blank lines, so lines are split here and each
    // one is parsed as a single record
    for (index, line) in BufReader::new(reader).lines().enumerate() {
        let line = line.map_err(csv::Error::from)?;
        let number = index as u64 + 1;
        let line = line.trim_end();

        let record = builder
            .from_reader(line.as_bytes())
            .into_records()
            .next()
            .transpose()?
            .unwrap_or_default();
        let fields: Vec<String> = record.iter().map(clean_field).collect();

        let (key, identifier) = match fields.as_slice() {
            [key, identifier] => (key.as_str(), identifier.as_str()),
            _ => {
                return Err(InputError::Malformed {
                    line: number,
                    content: line.to_string(),
                })
            }
        };

        match positions.get(identifier) {
            Some(&index) => {
                tracing::warn!(
                    "Duplicate identifier {}: key {} replaces {}",
                    identifier,
                    key,
                    items[index].key
                );
                items[index].key = key.to_string();
            }
            None => {
                positions.insert(identifier.to_string(), items.len());
                items.push(WorkItem::new(key, identifier));
            }
        }
    }

    Ok(items)
}

fn clean_field(field: &str) -> String {
    field.replace(QUOTE, "").trim().to_string()
}
