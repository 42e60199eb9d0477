//! CSV Connector - Splits decoded CSV text into a header and data rows

use crate::error::{IngestError, Result};
use csv::ReaderBuilder;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Header plus data rows of one file. Every row has exactly `headers.len()`
/// cells; short rows are padded with empty cells.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CsvGrid {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Malformed rows dropped while parsing.
    pub skipped_rows: usize,
}

impl CsvGrid {
    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// All values of column `idx`, in row order.
    pub fn column(&self, idx: usize) -> impl Iterator<Item = &str> {
        self.rows.iter().map(move |row| row[idx].as_str())
    }
}

/// CSV Connector - Wraps decoded CSV text and parses it with row-level tolerance.
pub struct CsvConnector<'a> {
    source_id: String,
    csv_text: &'a str,
    delimiter: u8,
}

impl<'a> CsvConnector<'a> {
    pub fn new(source_id: impl Into<String>, csv_text: &'a str) -> Self {
        Self {
            source_id: source_id.into(),
            csv_text,
            delimiter: b',',
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Parse the text. Fails only when there is no usable header; rows with
    /// more fields than the header, or that the reader rejects, are skipped.
    pub fn parse(&self) -> Result<CsvGrid> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_reader(self.csv_text.as_bytes());

        let headers = rdr
            .headers()
            .map_err(|e| {
                IngestError::SchemaInferenceFailed(format!(
                    "{}: failed to read CSV header: {}",
                    self.source_id, e
                ))
            })?
            .iter()
            .map(|h| h.to_string())
            .collect::<Vec<_>>();

        if headers.is_empty() || headers.iter().all(|h| h.trim().is_empty()) {
            return Err(IngestError::SchemaInferenceFailed(format!(
                "{}: empty header row",
                self.source_id
            )));
        }

        let width = headers.len();
        let mut rows = Vec::new();
        let mut skipped_rows = 0;

        for (idx, result) in rdr.records().enumerate() {
            let record = match result {
                Ok(record) => record,
                Err(e) => {
                    debug!(source = %self.source_id, row = idx + 1, error = %e, "skipping unreadable row");
                    skipped_rows += 1;
                    continue;
                }
            };

            if record.len() > width {
                debug!(
                    source = %self.source_id,
                    row = idx + 1,
                    fields = record.len(),
                    expected = width,
                    "skipping row with too many fields"
                );
                skipped_rows += 1;
                continue;
            }

            // A blank line comes back as a single empty field.
            if record.len() == 1 && width > 1 && record.get(0) == Some("") {
                continue;
            }

            let mut row: Vec<String> = record.iter().map(|c| c.to_string()).collect();
            row.resize(width, String::new());
            rows.push(row);
        }

        Ok(CsvGrid {
            headers,
            rows,
            skipped_rows,
        })
    }
}
