//! Batched, idempotent loading of validated records.
//!
//! The destination table is truncated first so that re-running the same
//! input leaves the same final state. Records are then inserted in
//! fixed-size batches, one transaction each. A failing batch is rolled
//! back and loading stops; batches committed before it stay persisted.

use crate::config::IngestConfig;
use crate::constants::DEFAULT_BATCH_SIZE;
use crate::error::{IngestError, Result};
use crate::models::{LoadStats, MeasurementRecord};
use crate::store::MeasurementStore;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct Loader {
    table: String,
    batch_size: usize,
    show_progress: bool,
}

impl Loader {
    pub fn new(table: impl Into<String>, batch_size: usize) -> Self {
        Self {
            table: table.into(),
            batch_size,
            show_progress: false,
        }
    }

    pub fn from_config(config: &IngestConfig) -> Self {
        Self::new(config.schema.table.clone(), config.pipeline.batch_size)
            .with_progress(config.pipeline.show_progress)
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Truncate the destination table, then insert `records` batch by batch
    pub async fn load<S: MeasurementStore>(
        &self,
        store: &mut S,
        records: &[MeasurementRecord],
    ) -> Result<LoadStats> {
        if self.batch_size == 0 {
            return Err(IngestError::configuration("batch size must be at least 1"));
        }

        let mut stats = LoadStats {
            truncated: self.clear_table(store).await?,
            ..Default::default()
        };

        let total = records.len();
        let batch_count = total.div_ceil(self.batch_size);
        info!(
            "Inserting {} rows into {} in {} batches of up to {}",
            total, self.table, batch_count, self.batch_size
        );

        let progress_bar = self.show_progress.then(|| create_load_progress_bar(total as u64));

        for (i, batch) in records.chunks(self.batch_size).enumerate() {
            let start = i * self.batch_size;
            let end = start + batch.len();

            if let Err(e) = store.insert_batch(&self.table, batch).await {
                if let Some(pb) = &progress_bar {
                    pb.abandon_with_message(format!("Batch {} failed", i + 1));
                }
                error!("Error inserting batch {}/{}: {}", i + 1, batch_count, e);
                return Err(IngestError::load(
                    format!(
                        "batch {} of {} (rows {} to {}) was rolled back",
                        i + 1,
                        batch_count,
                        start + 1,
                        end
                    ),
                    stats.rows_inserted,
                    e,
                ));
            }

            stats.batches_committed += 1;
            stats.rows_inserted += batch.len();
            debug!("Inserted rows {} to {} out of {}", start + 1, end, total);

            if let Some(pb) = &progress_bar {
                pb.set_position(end as u64);
            }
        }

        if let Some(pb) = progress_bar {
            pb.finish_with_message(format!("Inserted {} rows", stats.rows_inserted));
        }

        info!(
            "Data insertion completed: {} rows in {} batches",
            stats.rows_inserted, stats.batches_committed
        );
        Ok(stats)
    }

    /// Truncate if the table exists; returns whether it did
    async fn clear_table<S: MeasurementStore>(&self, store: &mut S) -> Result<bool> {
        let exists = store
            .table_exists(&self.table)
            .await
            .map_err(|e| IngestError::load("existence check failed", 0, e))?;

        if !exists {
            warn!("Table {} does not exist. Skipping truncation.", self.table);
            return Ok(false);
        }

        store
            .truncate(&self.table)
            .await
            .map_err(|e| IngestError::load(format!("truncating {} failed", self.table), 0, e))?;
        info!("Table {} truncated", self.table);
        Ok(true)
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new(crate::constants::DEFAULT_TABLE_NAME, DEFAULT_BATCH_SIZE)
    }
}

fn create_load_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} rows ({percent}%) {msg} ETA: {eta}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb.set_message("Loading");
    pb
}
