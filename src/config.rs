//! Configuration for an ingestion run.
//!
//! A single `IngestConfig` value is built once (normally by the CLI from
//! flags, environment variables and defaults) and threaded through the
//! reader, schema manager and loader. Nothing reads process-wide state.

use crate::constants::*;
use crate::error::{IngestError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;

static IDENTIFIER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").expect("valid identifier regex"));

static EXTENSION_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,63}$").expect("valid extension regex"));

/// Store connection parameters
#[derive(Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_DB_HOST.to_string(),
            port: DEFAULT_DB_PORT,
            database: DEFAULT_DB_NAME.to_string(),
            user: DEFAULT_DB_USER.to_string(),
            password: DEFAULT_DB_PASSWORD.to_string(),
        }
    }
}

impl StoreConfig {
    /// `user@host:port/database`, safe to log
    pub fn target(&self) -> String {
        format!("{}@{}:{}/{}", self.user, self.host, self.port, self.database)
    }
}

// Keep the password out of debug logs
impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"***")
            .finish()
    }
}

/// Destination table layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    pub table: String,
    pub extensions: Vec<String>,
    /// First partitioned calendar year
    pub first_year: i32,
    /// Last partitioned calendar year (inclusive)
    pub last_year: i32,
    /// Partial index predicate: `global_active_power > threshold`
    pub high_usage_threshold: f64,
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self {
            table: DEFAULT_TABLE_NAME.to_string(),
            extensions: DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            first_year: DEFAULT_FIRST_PARTITION_YEAR,
            last_year: DEFAULT_LAST_PARTITION_YEAR,
            high_usage_threshold: DEFAULT_HIGH_USAGE_THRESHOLD_KW,
        }
    }
}

/// Cleaning, validation and loading parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub missing_value: String,
    pub voltage_min: f64,
    pub voltage_max: f64,
    pub batch_size: usize,
    pub show_progress: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            missing_value: MISSING_VALUE_SENTINEL.to_string(),
            voltage_min: DEFAULT_VOLTAGE_MIN,
            voltage_max: DEFAULT_VOLTAGE_MAX,
            batch_size: DEFAULT_BATCH_SIZE,
            show_progress: false,
        }
    }
}

/// Global configuration for one ingestion run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub input_path: PathBuf,
    pub store: StoreConfig,
    pub schema: SchemaConfig,
    pub pipeline: PipelineConfig,

    /// Assume the destination table is already provisioned
    pub skip_schema: bool,

    /// Run every stage against an in-memory store instead of PostgreSQL
    pub dry_run: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from(DEFAULT_INPUT_FILE),
            store: StoreConfig::default(),
            schema: SchemaConfig::default(),
            pipeline: PipelineConfig::default(),
            skip_schema: false,
            dry_run: false,
        }
    }
}

impl IngestConfig {
    pub fn new(input_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            ..Self::default()
        }
    }

    pub fn with_store(mut self, store: StoreConfig) -> Self {
        self.store = store;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.pipeline.batch_size = batch_size;
        self
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.schema.table = table.into();
        self
    }

    pub fn with_partition_years(mut self, first_year: i32, last_year: i32) -> Self {
        self.schema.first_year = first_year;
        self.schema.last_year = last_year;
        self
    }

    pub fn with_skip_schema(mut self) -> Self {
        self.skip_schema = true;
        self
    }

    pub fn with_dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.pipeline.show_progress = show_progress;
        self
    }

    /// Reject settings that would produce invalid SQL or a meaningless run
    pub fn validate(&self) -> Result<()> {
        if self.pipeline.batch_size == 0 {
            return Err(IngestError::configuration("batch size must be at least 1"));
        }

        if self.schema.first_year > self.schema.last_year {
            return Err(IngestError::configuration(format!(
                "partition span is inverted: first year {} is after last year {}",
                self.schema.first_year, self.schema.last_year
            )));
        }

        if !(self.pipeline.voltage_min < self.pipeline.voltage_max) {
            return Err(IngestError::configuration(format!(
                "voltage range [{}, {}] is empty",
                self.pipeline.voltage_min, self.pipeline.voltage_max
            )));
        }

        if !self.schema.high_usage_threshold.is_finite() {
            return Err(IngestError::configuration(
                "high-usage threshold must be a finite number",
            ));
        }

        if !IDENTIFIER_PATTERN.is_match(&self.schema.table) {
            return Err(IngestError::configuration(format!(
                "'{}' is not a valid table name",
                self.schema.table
            )));
        }

        if let Some(bad) = self
            .schema
            .extensions
            .iter()
            .find(|ext| !EXTENSION_PATTERN.is_match(ext))
        {
            return Err(IngestError::configuration(format!(
                "'{}' is not a valid extension name",
                bad
            )));
        }

        if self.pipeline.missing_value.trim().is_empty() {
            return Err(IngestError::configuration(
                "missing-value sentinel must not be blank",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = IngestConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.pipeline.batch_size, 1000);
        assert_eq!(config.schema.table, "power_consumption");
        assert_eq!(config.store.port, 5432);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let config = IngestConfig::default().with_batch_size(0);
        assert!(matches!(
            config.validate(),
            Err(IngestError::Configuration { .. })
        ));
    }

    #[test]
    fn test_inverted_years_rejected() {
        let config = IngestConfig::default().with_partition_years(2012, 2006);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_table_name_must_be_identifier() {
        assert!(IngestConfig::default().with_table("readings_2024").validate().is_ok());
        assert!(IngestConfig::default().with_table("bad; DROP").validate().is_err());
        assert!(IngestConfig::default().with_table("1table").validate().is_err());
    }

    #[test]
    fn test_extension_names_allow_hyphen() {
        let mut config = IngestConfig::default();
        config.schema.extensions = vec!["uuid-ossp".to_string()];
        assert!(config.validate().is_ok());

        config.schema.extensions = vec!["ext\"; --".to_string()];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_debug_hides_password() {
        let store = StoreConfig::default();
        let rendered = format!("{:?}", store);
        assert!(!rendered.contains(DEFAULT_DB_PASSWORD));
        assert_eq!(store.target(), "poweruser@localhost:5432/power_consumption_db");
    }
}
