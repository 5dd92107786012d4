//! Semicolon-delimited product export reader

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use super::payload::RawRow;

const BOM: char = '\u{feff}';

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("Cannot read {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Read every data row of `path`, keyed by header name.
///
/// Short rows read their missing cells as empty; cells beyond the header
/// are ignored. A leading byte-order mark is dropped.
pub fn read_rows(path: impl AsRef<Path>) -> Result<Vec<RawRow>, SourceError> {
    let path = path.as_ref();
    let wrap = |source| SourceError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_path(path)
        .map_err(wrap)?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(wrap)?
        .iter()
        .enumerate()
        .map(|(i, h)| if i == 0 { h.trim_start_matches(BOM).to_string() } else { h.to_string() })
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(wrap)?;
        let row: RawRow = headers
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), record.get(i).unwrap_or_default().to_string()))
            .collect();
        rows.push(row);
    }

    debug!(path = %path.display(), rows = rows.len(), "Read input rows");
    Ok(rows)
}
