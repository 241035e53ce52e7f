//! Domain validation of cleaned measurements.
//!
//! Negative power readings are impossible and reject the whole record set.
//! Implausible voltages are counted, cleared and re-derived from their
//! neighbours; they never abort a run.

use crate::config::PipelineConfig;
use crate::constants::{DEFAULT_VOLTAGE_MAX, DEFAULT_VOLTAGE_MIN};
use crate::error::{IngestError, Result};
use crate::models::{MeasurementColumn, MeasurementRecord, ValidationReport};
use crate::repair::repair_column;
use tracing::{info, warn};

/// Validated records plus the soft-check report
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub records: Vec<MeasurementRecord>,
    pub report: ValidationReport,
}

#[derive(Debug, Clone)]
pub struct Validator {
    voltage_min: f64,
    voltage_max: f64,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(DEFAULT_VOLTAGE_MIN, DEFAULT_VOLTAGE_MAX)
    }
}

impl Validator {
    pub fn new(voltage_min: f64, voltage_max: f64) -> Self {
        Self {
            voltage_min,
            voltage_max,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.voltage_min, config.voltage_max)
    }

    /// Run the hard power check, then the soft voltage repair
    pub fn validate(&self, mut records: Vec<MeasurementRecord>) -> Result<ValidationResult> {
        check_power_non_negative(&records)?;
        let voltage_out_of_range = self.repair_voltage(&mut records);

        info!("Data validation passed for {} records", records.len());

        Ok(ValidationResult {
            report: ValidationReport {
                records_validated: records.len(),
                voltage_out_of_range,
            },
            records,
        })
    }

    /// Clear implausible voltages and repair the voltage column only
    ///
    /// Returns the number of values that were out of range.
    pub fn repair_voltage(&self, records: &mut [MeasurementRecord]) -> usize {
        let mut out_of_range = 0;

        for record in records.iter_mut() {
            if let Some(voltage) = record.voltage {
                if voltage < self.voltage_min || voltage > self.voltage_max {
                    record.voltage = None;
                    out_of_range += 1;
                }
            }
        }

        if out_of_range > 0 {
            warn!(
                "Voltage values out of range [{}, {}]: {} occurrences",
                self.voltage_min, self.voltage_max, out_of_range
            );
            let outcome = repair_column(records, MeasurementColumn::Voltage);
            if outcome.all_missing {
                warn!("Every voltage value was out of range; voltage column left missing");
            }
        }

        out_of_range
    }
}

/// Reject the record set if any active or reactive power reading is negative
pub fn check_power_non_negative(records: &[MeasurementRecord]) -> Result<()> {
    let power_columns = [
        MeasurementColumn::GlobalActivePower,
        MeasurementColumn::GlobalReactivePower,
    ];

    let mut violations = 0;
    let mut first = None;

    for (row, record) in records.iter().enumerate() {
        for column in power_columns {
            if record.get(column).is_some_and(|v| v < 0.0) {
                violations += 1;
                if first.is_none() {
                    first = Some((row, record.timestamp, column));
                }
            }
        }
    }

    match first {
        None => Ok(()),
        Some((row, timestamp, column)) => Err(IngestError::domain(format!(
            "{} negative values found in power columns (first: {} at row {} / {})",
            violations,
            column,
            row + 1,
            timestamp.to_rfc3339()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn record(minute: i64, active: f64, reactive: f64, voltage: f64) -> MeasurementRecord {
        let ts = Utc.with_ymd_and_hms(2006, 12, 16, 17, 24, 0).unwrap() + Duration::minutes(minute);
        MeasurementRecord::from_values(
            ts,
            [
                Some(active),
                Some(reactive),
                Some(voltage),
                Some(10.0),
                Some(0.0),
                Some(1.0),
                Some(17.0),
            ],
        )
    }

    #[test]
    fn test_clean_records_pass_unchanged() {
        let records = vec![record(0, 1.0, 0.1, 230.0), record(1, 2.0, 0.2, 240.0)];

        let result = Validator::default().validate(records.clone()).unwrap();

        assert_eq!(result.records, records);
        assert_eq!(result.report.voltage_out_of_range, 0);
        assert_eq!(result.report.records_validated, 2);
    }

    #[test]
    fn test_negative_active_power_rejected() {
        let records = vec![record(0, 1.0, 0.1, 230.0), record(1, -1.0, 0.1, 230.0)];

        match Validator::default().validate(records) {
            Err(IngestError::Domain { reason }) => {
                assert!(reason.contains("global_active_power"));
                assert!(reason.contains("row 2"));
            }
            other => panic!("Expected Domain error, got {:?}", other),
        }
    }

    #[test]
    fn test_negative_reactive_power_rejected() {
        let records = vec![record(0, 1.0, -0.5, 230.0)];
        assert!(matches!(
            check_power_non_negative(&records),
            Err(IngestError::Domain { .. })
        ));
    }

    #[test]
    fn test_out_of_range_voltage_is_interpolated() {
        let records = vec![
            record(0, 1.0, 0.1, 230.0),
            record(1, 1.0, 0.1, 999.0),
            record(2, 1.0, 0.1, 240.0),
        ];

        let result = Validator::default().validate(records).unwrap();

        assert_eq!(result.report.voltage_out_of_range, 1);
        assert_eq!(result.records[1].voltage, Some(235.0));
    }

    #[test]
    fn test_voltage_bounds_are_inclusive() {
        let mut records = vec![record(0, 1.0, 0.1, 100.0), record(1, 1.0, 0.1, 300.0)];
        assert_eq!(Validator::default().repair_voltage(&mut records), 0);
    }

    #[test]
    fn test_voltage_repair_leaves_other_columns_alone() {
        let mut records = vec![
            record(0, 1.0, 0.1, 230.0),
            record(1, 1.0, 0.1, 50.0),
            record(2, 1.0, 0.1, 240.0),
        ];
        records[1].global_intensity = None;

        let count = Validator::default().repair_voltage(&mut records);

        assert_eq!(count, 1);
        assert_eq!(records[1].voltage, Some(235.0));
        assert_eq!(records[1].global_intensity, None);
    }

    #[test]
    fn test_edge_voltage_is_filled_from_neighbour() {
        let mut records = vec![record(0, 1.0, 0.1, 5.0), record(1, 1.0, 0.1, 232.0)];

        Validator::default().repair_voltage(&mut records);

        assert_eq!(records[0].voltage, Some(232.0));
    }
}
