//! Conversion of raw field text into cleaned measurement records.
//!
//! Per record: build a UTC timestamp from the day-first date and time
//! fields, map the missing-value sentinel to `None` and coerce each
//! measurement to `f64`. Across the whole set: repair gaps column by column.

use crate::constants::{MISSING_VALUE_SENTINEL, TIMESTAMP_FORMAT};
use crate::error::{IngestError, Result};
use crate::models::{CleaningStats, MeasurementColumn, MeasurementRecord, RawRecord};
use crate::repair::repair_column;
use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::{debug, info, warn};

/// Cleaned records plus repair statistics
#[derive(Debug, Clone)]
pub struct CleaningResult {
    pub records: Vec<MeasurementRecord>,
    pub stats: CleaningStats,
}

#[derive(Debug, Clone)]
pub struct Cleaner {
    missing_value: String,
}

impl Default for Cleaner {
    fn default() -> Self {
        Self::new(MISSING_VALUE_SENTINEL)
    }
}

impl Cleaner {
    pub fn new(missing_value: impl Into<String>) -> Self {
        Self {
            missing_value: missing_value.into(),
        }
    }

    /// Clean every raw record and repair gaps across the full set
    ///
    /// Stops at the first reader error or unparsable timestamp.
    pub fn clean<I>(&self, raw_records: I) -> Result<CleaningResult>
    where
        I: IntoIterator<Item = Result<RawRecord>>,
    {
        let mut stats = CleaningStats::default();
        let mut records = Vec::new();

        for raw in raw_records {
            let record = self.clean_record(&raw?, &mut stats)?;
            records.push(record);
        }
        stats.records_cleaned = records.len();

        debug!(
            "Coerced {} records, {} missing values before repair",
            records.len(),
            stats.total_missing()
        );

        for column in MeasurementColumn::ALL {
            let outcome = repair_column(&mut records, column);
            stats.interpolated += outcome.interpolated;
            stats.forward_filled += outcome.forward_filled;
            stats.backward_filled += outcome.backward_filled;

            if outcome.all_missing {
                warn!("Column {} has no values; leaving it entirely missing", column);
                stats.entirely_missing.push(column);
            }
        }

        info!(
            "Data cleaned: {} records, {} gaps repaired ({} interpolated, {} forward, {} backward)",
            stats.records_cleaned,
            stats.total_repaired(),
            stats.interpolated,
            stats.forward_filled,
            stats.backward_filled
        );

        Ok(CleaningResult { records, stats })
    }

    /// Timestamp and coerce one record; gaps are left as `None`
    pub fn clean_record(
        &self,
        raw: &RawRecord,
        stats: &mut CleaningStats,
    ) -> Result<MeasurementRecord> {
        let timestamp = parse_timestamp(&raw.date, &raw.time, raw.line)?;

        let values = MeasurementColumn::ALL.map(|column| {
            let value = coerce_field(raw.measurement(column), &self.missing_value);
            if value.is_none() {
                stats.missing_before_repair[column.index()] += 1;
            }
            value
        });

        Ok(MeasurementRecord::from_values(timestamp, values))
    }
}

/// Parse `DD/MM/YYYY` and `HH:MM:SS` into a UTC timestamp
pub fn parse_timestamp(date: &str, time: &str, line: u64) -> Result<DateTime<Utc>> {
    let combined = format!("{} {}", date.trim(), time.trim());

    NaiveDateTime::parse_from_str(&combined, TIMESTAMP_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| IngestError::format(line, combined))
}

/// Sentinel, unparsable and non-finite text all become `None`
pub fn coerce_field(raw: &str, missing_value: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == missing_value {
        return None;
    }

    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}
