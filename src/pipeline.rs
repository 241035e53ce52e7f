//! Ingestion pipeline orchestration.
//!
//! Runs the stages strictly in sequence: read, clean and validate the
//! input (no store contact), then provision the destination schema, load
//! the records and read back a summary. The first failing stage halts the
//! run. The store session is closed whether the run succeeds or not.

use crate::cleaner::Cleaner;
use crate::config::IngestConfig;
use crate::error::Result;
use crate::loader::Loader;
use crate::models::{CleaningStats, IngestionSummary, MeasurementRecord, ReadStats, ValidationReport};
use crate::reader::Reader;
use crate::schema::SchemaManager;
use crate::store::{MeasurementStore, MemoryStore, PgStore};
use crate::validator::Validator;
use std::time::Instant;
use tracing::{error, info, warn};

#[cfg(test)]
mod tests;

/// Validated records ready for loading, with the statistics gathered so far
#[derive(Debug, Clone)]
pub struct PreparedRecords {
    pub records: Vec<MeasurementRecord>,
    pub read: ReadStats,
    pub cleaning: CleaningStats,
    pub validation: ValidationReport,
}

/// Main pipeline for one ingestion run
#[derive(Debug, Clone)]
pub struct IngestionPipeline {
    config: IngestConfig,
}

impl IngestionPipeline {
    /// Create a pipeline; the configuration is validated up front
    pub fn new(config: IngestConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Read, clean and validate the input file
    pub fn prepare(&self) -> Result<PreparedRecords> {
        info!("Reading {}", self.config.input_path.display());
        let mut reader = Reader::from_path(&self.config.input_path)?;

        let cleaner = Cleaner::new(self.config.pipeline.missing_value.clone());
        let cleaned = cleaner.clean(reader.by_ref())?;
        let read = reader.stats().clone();
        info!("Successfully read {} records", read.records_read);

        let validated = Validator::from_config(&self.config.pipeline).validate(cleaned.records)?;

        Ok(PreparedRecords {
            records: validated.records,
            read,
            cleaning: cleaned.stats,
            validation: validated.report,
        })
    }

    /// Provision (unless skipped), load and summarize against `store`
    pub async fn load_prepared<S: MeasurementStore>(
        &self,
        store: &mut S,
        prepared: PreparedRecords,
        started: Instant,
    ) -> Result<IngestionSummary> {
        let partitions_provisioned = if self.config.skip_schema {
            info!("Skipping schema provisioning");
            0
        } else {
            let report = SchemaManager::new(self.config.schema.clone())
                .provision(store)
                .await?;
            report.partitions.len()
        };

        let load = Loader::from_config(&self.config)
            .load(store, &prepared.records)
            .await?;

        let table = match store.summarize(&self.config.schema.table).await {
            Ok(table) => table,
            Err(e) => {
                warn!("Could not read back table summary: {}", e);
                Default::default()
            }
        };

        if table.row_count != load.rows_inserted as i64 {
            warn!(
                "Table {} holds {} rows but {} were inserted",
                self.config.schema.table, table.row_count, load.rows_inserted
            );
        }

        info!("All operations completed successfully");

        Ok(IngestionSummary {
            read: prepared.read,
            cleaning: prepared.cleaning,
            validation: prepared.validation,
            partitions_provisioned,
            load,
            table,
            elapsed: started.elapsed(),
        })
    }

    /// Run every stage against a caller-provided store, which stays open
    pub async fn run_with_store<S: MeasurementStore>(&self, store: &mut S) -> Result<IngestionSummary> {
        let started = Instant::now();
        let result = match self.prepare() {
            Ok(prepared) => self.load_prepared(store, prepared, started).await,
            Err(e) => Err(e),
        };
        result.inspect_err(log_halt)
    }

    /// Run every stage, connecting to the configured store only after validation
    pub async fn run(&self) -> Result<IngestionSummary> {
        let started = Instant::now();
        let result = self.run_inner(started).await;
        result.inspect_err(log_halt)
    }

    async fn run_inner(&self, started: Instant) -> Result<IngestionSummary> {
        let prepared = self.prepare()?;

        if self.config.dry_run {
            info!("Dry run: loading into an in-memory store");
            self.run_and_close(MemoryStore::new(), prepared, started).await
        } else {
            let store = PgStore::connect(&self.config.store).await?;
            self.run_and_close(store, prepared, started).await
        }
    }

    async fn run_and_close<S: MeasurementStore>(
        &self,
        mut store: S,
        prepared: PreparedRecords,
        started: Instant,
    ) -> Result<IngestionSummary> {
        let outcome = self.load_prepared(&mut store, prepared, started).await;

        if let Err(e) = store.close().await {
            warn!("Failed to close store session cleanly: {}", e);
        }

        outcome
    }
}

fn log_halt(error: &crate::error::IngestError) {
    error!("Ingestion halted ({} error): {}", error.kind(), error);
}
