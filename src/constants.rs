//! Application constants for the household power ingestion pipeline
//!
//! Default values, source-format details and destination schema names
//! shared by the reader, cleaner, schema manager and CLI.

// =============================================================================
// Source File Format
// =============================================================================

/// Field delimiter used by the household power consumption export
pub const FIELD_DELIMITER: u8 = b';';

/// Literal token the source uses for an absent measurement
pub const MISSING_VALUE_SENTINEL: &str = "?";

/// Day-first pattern applied to the concatenated `Date` and `Time` fields
pub const TIMESTAMP_FORMAT: &str = "%d/%m/%Y %H:%M:%S";

/// Normalized header name of the date column
pub const DATE_COLUMN: &str = "date";

/// Normalized header name of the time column
pub const TIME_COLUMN: &str = "time";

/// Default input file, resolved against the working directory
pub const DEFAULT_INPUT_FILE: &str = "household_power_consumption.csv";

// =============================================================================
// Store Connection Defaults
// =============================================================================

pub const DEFAULT_DB_HOST: &str = "localhost";
pub const DEFAULT_DB_PORT: u16 = 5432;
pub const DEFAULT_DB_NAME: &str = "power_consumption_db";
pub const DEFAULT_DB_USER: &str = "poweruser";
pub const DEFAULT_DB_PASSWORD: &str = "powerpassword";

// =============================================================================
// Destination Schema
// =============================================================================

/// Destination table name
pub const DEFAULT_TABLE_NAME: &str = "power_consumption";

/// Timestamp column the table is range-partitioned on
pub const TIMESTAMP_COLUMN: &str = "date_time";

/// Extensions enabled before the table is created
pub const DEFAULT_EXTENSIONS: &[&str] = &[
    "timescaledb",
    "uuid-ossp",
    "postgis",
    "postgis_topology",
    "postgis_raster",
];

/// First calendar year that receives a partition
pub const DEFAULT_FIRST_PARTITION_YEAR: i32 = 2006;

/// Last calendar year that receives a partition (inclusive)
pub const DEFAULT_LAST_PARTITION_YEAR: i32 = 2011;

/// Name of the composite `(date_time, global_active_power)` index
pub const COMPOSITE_INDEX_NAME: &str = "idx_date_power";

/// Name of the partial index over high-consumption rows
pub const HIGH_USAGE_INDEX_NAME: &str = "idx_high_power";

/// `global_active_power` (kW) above which a row counts as high usage
pub const DEFAULT_HIGH_USAGE_THRESHOLD_KW: f64 = 5.0;

// =============================================================================
// Loading and Validation
// =============================================================================

/// Rows inserted per transaction
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// PostgreSQL limit on bind parameters in one statement
pub const MAX_BIND_PARAMETERS: usize = 65_535;

/// Plausible voltage range (V), inclusive on both ends
pub const DEFAULT_VOLTAGE_MIN: f64 = 100.0;
pub const DEFAULT_VOLTAGE_MAX: f64 = 300.0;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_span_is_ordered() {
        assert!(DEFAULT_FIRST_PARTITION_YEAR <= DEFAULT_LAST_PARTITION_YEAR);
    }

    #[test]
    fn test_voltage_bounds_are_ordered() {
        assert!(DEFAULT_VOLTAGE_MIN < DEFAULT_VOLTAGE_MAX);
    }

    #[test]
    fn test_default_batch_fits_bind_limit() {
        // 8 bound columns per row
        assert!(DEFAULT_BATCH_SIZE * 8 <= MAX_BIND_PARAMETERS);
    }
}
