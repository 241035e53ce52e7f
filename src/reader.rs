//! Semicolon-delimited reader for household power consumption exports.
//!
//! Resolves the header into a column mapping, then yields one `RawRecord`
//! per data line. Fields are kept as raw text, sentinels included; type
//! interpretation belongs to the cleaner.

use crate::constants::{DATE_COLUMN, FIELD_DELIMITER, TIME_COLUMN};
use crate::error::{IngestError, Result};
use crate::models::{MEASUREMENT_COUNT, MeasurementColumn, RawRecord, ReadStats};
use csv::{StringRecord, StringRecordsIntoIter};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use tracing::debug;

/// Positions of the required columns within a source row
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMapping {
    pub date: usize,
    pub time: usize,
    pub measurements: [usize; MEASUREMENT_COUNT],
    /// Number of fields every data row must have
    pub width: usize,
}

impl ColumnMapping {
    /// Resolve required columns by trimmed, lower-cased header name
    pub fn from_header(header: &StringRecord) -> Result<Self> {
        let normalized: HashMap<String, usize> = header
            .iter()
            .enumerate()
            .map(|(i, name)| (normalize_column_name(name), i))
            .collect();

        let mut missing = Vec::new();
        let mut lookup = |name: &str| match normalized.get(name) {
            Some(&index) => index,
            None => {
                missing.push(name.to_string());
                0
            }
        };

        let date = lookup(DATE_COLUMN);
        let time = lookup(TIME_COLUMN);
        let measurements = MeasurementColumn::ALL.map(|column| lookup(column.name()));

        if !missing.is_empty() {
            return Err(IngestError::structural(
                1,
                format!("header is missing required columns: {}", missing.join(", ")),
            ));
        }

        Ok(Self {
            date,
            time,
            measurements,
            width: header.len(),
        })
    }
}

/// Header names are matched case-insensitively and without surrounding whitespace
fn normalize_column_name(name: &str) -> String {
    name.trim().trim_start_matches('\u{feff}').to_lowercase()
}

/// Lazy, single-pass reader over a delimited source
pub struct Reader<R: Read> {
    records: StringRecordsIntoIter<R>,
    mapping: ColumnMapping,
    stats: ReadStats,
}

impl Reader<BufReader<File>> {
    /// Open a file on disk
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| IngestError::io(path, e))?;
        debug!("Opened input file {}", path.display());
        Self::new(BufReader::new(file))
    }
}

impl<R: Read> Reader<R> {
    /// Read and resolve the header; data rows are consumed lazily afterwards
    pub fn new(source: R) -> Result<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(FIELD_DELIMITER)
            .has_headers(true)
            .flexible(true)
            .from_reader(source);

        let header = csv_reader
            .headers()
            .map_err(|e| IngestError::structural(1, format!("unreadable header: {}", e)))?
            .clone();

        if header.iter().all(|field| field.trim().is_empty()) {
            return Err(IngestError::structural(1, "missing header line"));
        }

        let mapping = ColumnMapping::from_header(&header)?;
        debug!("Resolved column mapping: {:?}", mapping);

        Ok(Self {
            records: csv_reader.into_records(),
            mapping,
            stats: ReadStats::default(),
        })
    }

    pub fn mapping(&self) -> &ColumnMapping {
        &self.mapping
    }

    pub fn stats(&self) -> &ReadStats {
        &self.stats
    }

    fn to_raw_record(&self, record: &StringRecord, line: u64) -> Result<RawRecord> {
        if record.len() != self.mapping.width {
            return Err(IngestError::structural(
                line,
                format!(
                    "expected {} fields to match the header, found {}",
                    self.mapping.width,
                    record.len()
                ),
            ));
        }

        let field = |index: usize| record.get(index).unwrap_or_default().to_string();

        Ok(RawRecord {
            line,
            date: field(self.mapping.date),
            time: field(self.mapping.time),
            measurements: self.mapping.measurements.map(field),
        })
    }
}

impl<R: Read> Iterator for Reader<R> {
    type Item = Result<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let record = match self.records.next()? {
                Ok(record) => record,
                Err(e) => {
                    let line = e.position().map(|p| p.line()).unwrap_or_default();
                    return Some(Err(IngestError::structural(
                        line,
                        format!("unreadable row: {}", e),
                    )));
                }
            };

            let line = record.position().map(|p| p.line()).unwrap_or_default();

            if record.iter().all(|field| field.trim().is_empty()) {
                self.stats.blank_lines += 1;
                continue;
            }

            let raw = self.to_raw_record(&record, line);
            if raw.is_ok() {
                self.stats.records_read += 1;
            }
            return Some(raw);
        }
    }
}
