//! In-memory store used for dry runs and tests.
//!
//! Tracks extensions, partitioned tables, partitions and indexes from the
//! provisioning steps it receives, and routes inserted rows to partitions
//! the way PostgreSQL does: a row outside every partition is rejected and
//! the whole batch with it.

use super::{MeasurementStore, StoreError, StoreResult};
use crate::models::{MeasurementRecord, PartitionSpec, TableSummary};
use crate::schema::ProvisioningStep;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

#[derive(Debug, Clone, Default)]
struct MemoryTable {
    partitions: Vec<PartitionSpec>,
    rows: Vec<MeasurementRecord>,
}

impl MemoryTable {
    fn route(&self, record: &MeasurementRecord) -> bool {
        self.partitions.iter().any(|p| p.contains(&record.timestamp))
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    extensions: BTreeSet<String>,
    tables: BTreeMap<String, MemoryTable>,
    /// Index name to owning table
    indexes: BTreeMap<String, String>,
    steps_applied: usize,
    insert_calls: usize,
    fail_insert_call: Option<usize>,
    fail_step: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the `n`th `insert_batch` call (1-based) fail
    pub fn fail_insert_on_call(mut self, n: usize) -> Self {
        self.fail_insert_call = Some(n);
        self
    }

    /// Make any provisioning step whose SQL contains `pattern` fail
    pub fn fail_step_matching(mut self, pattern: impl Into<String>) -> Self {
        self.fail_step = Some(pattern.into());
        self
    }

    pub fn has_table(&self, table: &str) -> bool {
        self.tables.contains_key(table)
    }

    pub fn has_index(&self, name: &str) -> bool {
        self.indexes.contains_key(name)
    }

    pub fn has_extension(&self, name: &str) -> bool {
        self.extensions.contains(name)
    }

    pub fn partition_years(&self, table: &str) -> Vec<i32> {
        self.tables
            .get(table)
            .map(|t| t.partitions.iter().map(|p| p.year).collect())
            .unwrap_or_default()
    }

    pub fn rows(&self, table: &str) -> &[MeasurementRecord] {
        self.tables
            .get(table)
            .map(|t| t.rows.as_slice())
            .unwrap_or_default()
    }

    /// Number of provisioning steps applied successfully
    pub fn steps_applied(&self) -> usize {
        self.steps_applied
    }

    /// Number of `insert_batch` calls, including failed ones
    pub fn insert_calls(&self) -> usize {
        self.insert_calls
    }

    /// True if nothing has been asked of this store yet
    pub fn is_untouched(&self) -> bool {
        self.steps_applied == 0 && self.insert_calls == 0 && self.tables.is_empty()
    }

    fn table_mut(&mut self, table: &str) -> StoreResult<&mut MemoryTable> {
        self.tables
            .get_mut(table)
            .ok_or_else(|| StoreError::rejected(format!("relation \"{}\" does not exist", table)))
    }
}

#[async_trait]
impl MeasurementStore for MemoryStore {
    fn describe(&self) -> String {
        "in-memory store".to_string()
    }

    async fn apply(&mut self, step: &ProvisioningStep) -> StoreResult<()> {
        if let Some(pattern) = &self.fail_step {
            if step.sql().contains(pattern.as_str()) {
                return Err(StoreError::rejected(format!(
                    "injected failure for: {}",
                    step.description()
                )));
            }
        }

        match step {
            ProvisioningStep::EnableExtension { name } => {
                self.extensions.insert(name.clone());
            }
            ProvisioningStep::DropTable { table } => {
                self.tables.remove(table);
                self.indexes.retain(|_, owner| owner != table);
            }
            ProvisioningStep::CreatePartitionedTable { table } => {
                self.tables.entry(table.clone()).or_default();
            }
            ProvisioningStep::CreatePartition { table, partition } => {
                let parent = self.table_mut(table)?;
                if parent.partitions.iter().any(|p| p == partition) {
                    return Ok(());
                }
                let overlaps = parent
                    .partitions
                    .iter()
                    .any(|p| partition.start < p.end && p.start < partition.end);
                if overlaps {
                    return Err(StoreError::rejected(format!(
                        "partition \"{}\" would overlap an existing partition",
                        partition.table_name(table)
                    )));
                }
                parent.partitions.push(partition.clone());
            }
            ProvisioningStep::CreateIndex { name, table, .. } => {
                self.table_mut(table)?;
                self.indexes.entry(name.clone()).or_insert_with(|| table.clone());
            }
        }

        self.steps_applied += 1;
        debug!("Applied {}", step.description());
        Ok(())
    }

    async fn table_exists(&mut self, table: &str) -> StoreResult<bool> {
        Ok(self.has_table(table))
    }

    async fn truncate(&mut self, table: &str) -> StoreResult<()> {
        self.table_mut(table)?.rows.clear();
        Ok(())
    }

    async fn insert_batch(&mut self, table: &str, records: &[MeasurementRecord]) -> StoreResult<u64> {
        self.insert_calls += 1;
        if self.fail_insert_call == Some(self.insert_calls) {
            return Err(StoreError::rejected("injected insert failure"));
        }

        let target = self.table_mut(table)?;
        if let Some(stray) = records.iter().find(|r| !target.route(r)) {
            return Err(StoreError::rejected(format!(
                "no partition of relation \"{}\" found for row with {}",
                table,
                stray.timestamp.to_rfc3339()
            )));
        }

        target.rows.extend_from_slice(records);
        Ok(records.len() as u64)
    }

    async fn summarize(&mut self, table: &str) -> StoreResult<TableSummary> {
        let rows = &self.table_mut(table)?.rows;
        Ok(TableSummary {
            row_count: rows.len() as i64,
            global_active_power_sum: rows.iter().filter_map(|r| r.global_active_power).sum(),
        })
    }

    async fn close(self) -> StoreResult<()>
    where
        Self: Sized,
    {
        debug!("Discarding in-memory store");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn record(year: i32, power: f64) -> MeasurementRecord {
        let ts = Utc.with_ymd_and_hms(year, 6, 1, 12, 0, 0).unwrap();
        MeasurementRecord::from_values(ts, [Some(power); 7])
    }

    async fn store_with_table() -> MemoryStore {
        let mut store = MemoryStore::new();
        store
            .apply(&ProvisioningStep::CreatePartitionedTable {
                table: "readings".to_string(),
            })
            .await
            .unwrap();
        store
            .apply(&ProvisioningStep::CreatePartition {
                table: "readings".to_string(),
                partition: PartitionSpec::for_year(2007).unwrap(),
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_rows_outside_partitions_reject_whole_batch() {
        let mut store = store_with_table().await;

        let result = store
            .insert_batch("readings", &[record(2007, 1.0), record(2012, 2.0)])
            .await;

        assert!(matches!(result, Err(StoreError::Rejected(_))));
        assert!(store.rows("readings").is_empty());
    }

    #[tokio::test]
    async fn test_insert_truncate_and_summarize() {
        let mut store = store_with_table().await;

        store
            .insert_batch("readings", &[record(2007, 1.5), record(2007, 2.5)])
            .await
            .unwrap();
        let summary = store.summarize("readings").await.unwrap();
        assert_eq!(summary.row_count, 2);
        assert_eq!(summary.global_active_power_sum, 4.0);

        store.truncate("readings").await.unwrap();
        assert_eq!(store.summarize("readings").await.unwrap().row_count, 0);
    }

    #[tokio::test]
    async fn test_insert_into_missing_table_fails() {
        let mut store = MemoryStore::new();
        assert!(store.insert_batch("readings", &[record(2007, 1.0)]).await.is_err());
        assert!(!store.table_exists("readings").await.unwrap());
    }

    #[tokio::test]
    async fn test_overlapping_partition_rejected() {
        let mut store = store_with_table().await;
        let mut overlapping = PartitionSpec::for_year(2007).unwrap();
        overlapping.year = 1;

        let result = store
            .apply(&ProvisioningStep::CreatePartition {
                table: "readings".to_string(),
                partition: overlapping,
            })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_drop_cascades_to_indexes() {
        let mut store = store_with_table().await;
        store
            .apply(&ProvisioningStep::CreateIndex {
                name: "idx_readings".to_string(),
                table: "readings".to_string(),
                predicate: None,
            })
            .await
            .unwrap();

        store
            .apply(&ProvisioningStep::DropTable {
                table: "readings".to_string(),
            })
            .await
            .unwrap();

        assert!(!store.has_table("readings"));
        assert!(!store.has_index("idx_readings"));
    }
}
