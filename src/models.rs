//! Core data structures for the ingestion pipeline.
//!
//! Defines the raw and cleaned record types, the measurement column
//! catalogue, yearly partition ranges and the per-stage statistics
//! reported at the end of a run.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Number of numeric measurement columns in the source file
pub const MEASUREMENT_COUNT: usize = 7;

/// The seven numeric measurement columns, in source file order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MeasurementColumn {
    GlobalActivePower,
    GlobalReactivePower,
    Voltage,
    GlobalIntensity,
    SubMetering1,
    SubMetering2,
    SubMetering3,
}

impl MeasurementColumn {
    pub const ALL: [MeasurementColumn; MEASUREMENT_COUNT] = [
        MeasurementColumn::GlobalActivePower,
        MeasurementColumn::GlobalReactivePower,
        MeasurementColumn::Voltage,
        MeasurementColumn::GlobalIntensity,
        MeasurementColumn::SubMetering1,
        MeasurementColumn::SubMetering2,
        MeasurementColumn::SubMetering3,
    ];

    /// Column name used both in the normalized source header and in the destination table
    pub fn name(self) -> &'static str {
        match self {
            MeasurementColumn::GlobalActivePower => "global_active_power",
            MeasurementColumn::GlobalReactivePower => "global_reactive_power",
            MeasurementColumn::Voltage => "voltage",
            MeasurementColumn::GlobalIntensity => "global_intensity",
            MeasurementColumn::SubMetering1 => "sub_metering_1",
            MeasurementColumn::SubMetering2 => "sub_metering_2",
            MeasurementColumn::SubMetering3 => "sub_metering_3",
        }
    }

    /// Position of this column within `MeasurementColumn::ALL`
    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for MeasurementColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One data line exactly as read from the source file
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// 1-based line number in the source file
    pub line: u64,
    pub date: String,
    pub time: String,
    /// Raw measurement text, indexed by `MeasurementColumn::index`
    pub measurements: [String; MEASUREMENT_COUNT],
}

impl RawRecord {
    pub fn measurement(&self, column: MeasurementColumn) -> &str {
        &self.measurements[column.index()]
    }
}

/// A cleaned measurement; `None` marks a missing value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub timestamp: DateTime<Utc>,
    pub global_active_power: Option<f64>,
    pub global_reactive_power: Option<f64>,
    pub voltage: Option<f64>,
    pub global_intensity: Option<f64>,
    pub sub_metering_1: Option<f64>,
    pub sub_metering_2: Option<f64>,
    pub sub_metering_3: Option<f64>,
}

impl MeasurementRecord {
    /// Build a record from values ordered as `MeasurementColumn::ALL`
    pub fn from_values(timestamp: DateTime<Utc>, values: [Option<f64>; MEASUREMENT_COUNT]) -> Self {
        let [
            global_active_power,
            global_reactive_power,
            voltage,
            global_intensity,
            sub_metering_1,
            sub_metering_2,
            sub_metering_3,
        ] = values;

        Self {
            timestamp,
            global_active_power,
            global_reactive_power,
            voltage,
            global_intensity,
            sub_metering_1,
            sub_metering_2,
            sub_metering_3,
        }
    }

    pub fn get(&self, column: MeasurementColumn) -> Option<f64> {
        match column {
            MeasurementColumn::GlobalActivePower => self.global_active_power,
            MeasurementColumn::GlobalReactivePower => self.global_reactive_power,
            MeasurementColumn::Voltage => self.voltage,
            MeasurementColumn::GlobalIntensity => self.global_intensity,
            MeasurementColumn::SubMetering1 => self.sub_metering_1,
            MeasurementColumn::SubMetering2 => self.sub_metering_2,
            MeasurementColumn::SubMetering3 => self.sub_metering_3,
        }
    }

    pub fn set(&mut self, column: MeasurementColumn, value: Option<f64>) {
        let slot = match column {
            MeasurementColumn::GlobalActivePower => &mut self.global_active_power,
            MeasurementColumn::GlobalReactivePower => &mut self.global_reactive_power,
            MeasurementColumn::Voltage => &mut self.voltage,
            MeasurementColumn::GlobalIntensity => &mut self.global_intensity,
            MeasurementColumn::SubMetering1 => &mut self.sub_metering_1,
            MeasurementColumn::SubMetering2 => &mut self.sub_metering_2,
            MeasurementColumn::SubMetering3 => &mut self.sub_metering_3,
        };
        *slot = value;
    }
}

/// A yearly `[start, end)` range the destination table routes rows into
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionSpec {
    pub year: i32,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl PartitionSpec {
    /// Partition covering the whole of `year`; `None` if the year is outside chrono's range
    pub fn for_year(year: i32) -> Option<Self> {
        let start = Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).single()?;
        let end = Utc.with_ymd_and_hms(year + 1, 1, 1, 0, 0, 0).single()?;
        Some(Self { year, start, end })
    }

    /// Name of the partition table attached to `parent`
    pub fn table_name(&self, parent: &str) -> String {
        format!("{}_y{}", parent, self.year)
    }

    pub fn contains(&self, timestamp: &DateTime<Utc>) -> bool {
        *timestamp >= self.start && *timestamp < self.end
    }
}

/// Summary of what the reader consumed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReadStats {
    /// Data lines yielded as raw records
    pub records_read: usize,
    /// Blank lines skipped
    pub blank_lines: usize,
}

/// Per-column repair bookkeeping from the cleaner
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CleaningStats {
    pub records_cleaned: usize,
    /// Values that were the sentinel, unparsable or non-finite, per column
    pub missing_before_repair: [usize; MEASUREMENT_COUNT],
    pub interpolated: usize,
    pub forward_filled: usize,
    pub backward_filled: usize,
    /// Columns that had no value at all and were passed through as missing
    pub entirely_missing: Vec<MeasurementColumn>,
}

impl CleaningStats {
    pub fn total_missing(&self) -> usize {
        self.missing_before_repair.iter().sum()
    }

    pub fn total_repaired(&self) -> usize {
        self.interpolated + self.forward_filled + self.backward_filled
    }
}

/// Outcome of the soft validation checks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub records_validated: usize,
    /// Rows whose voltage fell outside the plausible range and was re-derived
    pub voltage_out_of_range: usize,
}

/// Result of the load stage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadStats {
    pub truncated: bool,
    pub batches_committed: usize,
    pub rows_inserted: usize,
}

/// Row count and active-power total read back from the destination table
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TableSummary {
    pub row_count: i64,
    pub global_active_power_sum: f64,
}

/// End-of-run statistics across all stages
#[derive(Debug, Clone, Default)]
pub struct IngestionSummary {
    pub read: ReadStats,
    pub cleaning: CleaningStats,
    pub validation: ValidationReport,
    pub partitions_provisioned: usize,
    pub load: LoadStats,
    pub table: TableSummary,
    pub elapsed: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_order_matches_index() {
        for (i, column) in MeasurementColumn::ALL.iter().enumerate() {
            assert_eq!(column.index(), i);
        }
    }

    #[test]
    fn test_record_get_set_roundtrip_per_column() {
        let ts = Utc.with_ymd_and_hms(2007, 3, 1, 0, 0, 0).unwrap();
        let mut record = MeasurementRecord::from_values(ts, [None; MEASUREMENT_COUNT]);

        for (i, column) in MeasurementColumn::ALL.iter().enumerate() {
            record.set(*column, Some(i as f64));
        }

        assert_eq!(record.global_active_power, Some(0.0));
        assert_eq!(record.voltage, Some(2.0));
        assert_eq!(record.sub_metering_3, Some(6.0));
        assert_eq!(record.get(MeasurementColumn::GlobalIntensity), Some(3.0));
    }

    #[test]
    fn test_partition_bounds() {
        let partition = PartitionSpec::for_year(2008).unwrap();

        assert_eq!(partition.table_name("power_consumption"), "power_consumption_y2008");
        assert!(partition.contains(&Utc.with_ymd_and_hms(2008, 1, 1, 0, 0, 0).unwrap()));
        assert!(partition.contains(&Utc.with_ymd_and_hms(2008, 12, 31, 23, 59, 59).unwrap()));
        assert!(!partition.contains(&Utc.with_ymd_and_hms(2009, 1, 1, 0, 0, 0).unwrap()));
        assert!(!partition.contains(&Utc.with_ymd_and_hms(2007, 12, 31, 23, 59, 0).unwrap()));
    }
}
