//! Command-line interface: arguments, logging setup and the run summary.

use crate::config::{IngestConfig, StoreConfig};
use crate::constants::*;
use crate::error::{IngestError, Result};
use crate::models::IngestionSummary;
use clap::Parser;
use colored::*;
use std::path::PathBuf;
use tracing::debug;

/// CLI arguments for the household power ingestion pipeline
///
/// Database settings fall back to the `DB_*` environment variables (a `.env`
/// file in the working directory is honoured) and then to built-in defaults.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "power_ingest",
    version,
    about = "Clean household power consumption readings and load them into partitioned PostgreSQL/TimescaleDB storage"
)]
pub struct Args {
    /// Semicolon-delimited input file
    #[arg(value_name = "INPUT", env = "INPUT_FILE", default_value = DEFAULT_INPUT_FILE)]
    pub input: PathBuf,

    #[arg(long = "db-host", env = "DB_HOST", default_value = DEFAULT_DB_HOST)]
    pub db_host: String,

    #[arg(long = "db-port", env = "DB_PORT", default_value_t = DEFAULT_DB_PORT)]
    pub db_port: u16,

    #[arg(long = "db-name", env = "DB_NAME", default_value = DEFAULT_DB_NAME)]
    pub db_name: String,

    #[arg(long = "db-user", env = "DB_USER", default_value = DEFAULT_DB_USER)]
    pub db_user: String,

    #[arg(
        long = "db-password",
        env = "DB_PASSWORD",
        default_value = DEFAULT_DB_PASSWORD,
        hide_env_values = true
    )]
    pub db_password: String,

    /// Destination table name
    #[arg(long, default_value = DEFAULT_TABLE_NAME)]
    pub table: String,

    /// Rows per insert transaction
    #[arg(long = "batch-size", value_name = "ROWS", default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// First calendar year to partition
    #[arg(long = "first-year", default_value_t = DEFAULT_FIRST_PARTITION_YEAR)]
    pub first_year: i32,

    /// Last calendar year to partition (inclusive)
    #[arg(long = "last-year", default_value_t = DEFAULT_LAST_PARTITION_YEAR)]
    pub last_year: i32,

    /// Assume the table and partitions already exist
    ///
    /// By default the table is dropped and re-created on every run.
    #[arg(long = "skip-schema")]
    pub skip_schema: bool,

    /// Run every stage against an in-memory store; nothing is written to the database
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Increase logging verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Only log errors and hide the progress bar
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

impl Args {
    pub fn get_log_level(&self) -> &'static str {
        if self.quiet {
            "error"
        } else {
            match self.verbose {
                0 => "info",
                1 => "debug",
                _ => "trace",
            }
        }
    }

    pub fn show_progress(&self) -> bool {
        !self.quiet
    }

    /// Build the run configuration; validated by `IngestionPipeline::new`
    pub fn into_config(self) -> IngestConfig {
        let show_progress = self.show_progress();
        let store = StoreConfig {
            host: self.db_host,
            port: self.db_port,
            database: self.db_name,
            user: self.db_user,
            password: self.db_password,
        };

        let mut config = IngestConfig::new(self.input)
            .with_store(store)
            .with_table(self.table)
            .with_batch_size(self.batch_size)
            .with_partition_years(self.first_year, self.last_year)
            .with_progress(show_progress);
        if self.skip_schema {
            config = config.with_skip_schema();
        }
        if self.dry_run {
            config = config.with_dry_run();
        }
        config
    }
}

/// Set up structured logging on stderr; `RUST_LOG` overrides the level flags
pub fn setup_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = args.get_log_level();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("power_ingest={}", log_level)));

    let result = if args.quiet {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
    result.map_err(|e| IngestError::configuration(format!("failed to initialise logging: {}", e)))?;

    debug!("Logging initialized at level: {}", log_level);
    Ok(())
}

/// Print the end-of-run summary to stdout
pub fn print_summary(summary: &IngestionSummary, dry_run: bool) {
    let title = if dry_run {
        "Ingestion Summary (dry run)"
    } else {
        "Ingestion Summary"
    };
    println!("\n{}", title.bright_green().bold());
    println!(
        "  {} {}ms",
        "Time elapsed:".bright_cyan(),
        summary.elapsed.as_millis().to_string().bright_white()
    );
    println!(
        "  {} {}",
        "Records read:".bright_cyan(),
        summary.read.records_read.to_string().bright_white()
    );
    println!(
        "  {} {} of {}",
        "Gaps repaired:".bright_cyan(),
        summary.cleaning.total_repaired().to_string().bright_white(),
        summary.cleaning.total_missing()
    );
    for column in &summary.cleaning.entirely_missing {
        println!(
            "  {} {}",
            "Column entirely missing:".bright_yellow(),
            column.name().bright_yellow().bold()
        );
    }
    if summary.validation.voltage_out_of_range > 0 {
        println!(
            "  {} {}",
            "Voltage readings repaired:".bright_yellow(),
            summary
                .validation
                .voltage_out_of_range
                .to_string()
                .bright_yellow()
                .bold()
        );
    }
    println!(
        "  {} {}",
        "Partitions provisioned:".bright_cyan(),
        summary.partitions_provisioned.to_string().bright_white()
    );
    println!(
        "  {} {} in {} batches",
        "Rows inserted:".bright_cyan(),
        summary.load.rows_inserted.to_string().bright_white().bold(),
        summary.load.batches_committed
    );
    println!(
        "  {} {} rows, global active power sum {:.3}",
        "Table contents:".bright_cyan(),
        summary.table.row_count.to_string().bright_white().bold(),
        summary.table.global_active_power_sum
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let args = Args::try_parse_from([
            "power_ingest",
            "readings.txt",
            "--db-host",
            "db.internal",
            "--db-port",
            "6543",
            "--table",
            "readings",
            "--batch-size",
            "250",
            "--first-year",
            "2007",
            "--last-year",
            "2008",
            "--skip-schema",
            "--dry-run",
        ])
        .unwrap();

        let config = args.into_config();
        assert_eq!(config.input_path, PathBuf::from("readings.txt"));
        assert_eq!(config.store.host, "db.internal");
        assert_eq!(config.store.port, 6543);
        assert_eq!(config.schema.table, "readings");
        assert_eq!(config.pipeline.batch_size, 250);
        assert_eq!((config.schema.first_year, config.schema.last_year), (2007, 2008));
        assert!(config.skip_schema);
        assert!(config.dry_run);
        assert!(config.pipeline.show_progress);
    }

    #[test]
    fn test_log_levels() {
        let parse = |flags: &[&str]| {
            let mut argv = vec!["power_ingest", "in.txt"];
            argv.extend_from_slice(flags);
            Args::try_parse_from(argv).unwrap()
        };

        assert_eq!(parse(&[]).get_log_level(), "info");
        assert_eq!(parse(&["-v"]).get_log_level(), "debug");
        assert_eq!(parse(&["-vv"]).get_log_level(), "trace");

        let quiet = parse(&["-q"]);
        assert_eq!(quiet.get_log_level(), "error");
        assert!(!quiet.into_config().pipeline.show_progress);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Args::try_parse_from(["power_ingest", "in.txt", "-q", "-v"]).is_err());
    }

    #[test]
    fn test_invalid_port_rejected() {
        assert!(Args::try_parse_from(["power_ingest", "in.txt", "--db-port", "not-a-port"]).is_err());
    }
}
