//! Pipeline tests
//!
//! Run the complete ingestion pipeline over small input files against the
//! in-memory store.


use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

pub const HEADER: &str = "Date;Time;Global_active_power;Global_reactive_power;Voltage;Global_intensity;Sub_metering_1;Sub_metering_2;Sub_metering_3";

/// Write `rows` under the standard header and return the file path
pub fn write_input(temp_dir: &TempDir, rows: &[&str]) -> PathBuf {
    let path = temp_dir.path().join("household_power_consumption.txt");
    let mut content = String::from(HEADER);
    for row in rows {
        content.push('\n');
        content.push_str(row);
    }
    content.push('\n');
    fs::write(&path, content).unwrap();
    path
}
