//! Destination schema provisioning.
//!
//! Builds the ordered list of DDL steps for the partitioned measurement
//! table (extensions, drop, partitioned table, yearly partitions, indexes)
//! and applies them to a store. A failing step stops provisioning; steps
//! that already ran are not rolled back.

use crate::config::SchemaConfig;
use crate::constants::{COMPOSITE_INDEX_NAME, HIGH_USAGE_INDEX_NAME, TIMESTAMP_COLUMN};
use crate::error::{IngestError, Result};
use crate::models::{MeasurementColumn, PartitionSpec};
use crate::store::MeasurementStore;
use tracing::{debug, info, warn};

/// One DDL statement in the provisioning plan
#[derive(Debug, Clone, PartialEq)]
pub enum ProvisioningStep {
    EnableExtension {
        name: String,
    },
    DropTable {
        table: String,
    },
    CreatePartitionedTable {
        table: String,
    },
    CreatePartition {
        table: String,
        partition: PartitionSpec,
    },
    CreateIndex {
        name: String,
        table: String,
        /// Rows covered by a partial index; `None` indexes every row
        predicate: Option<String>,
    },
}

impl ProvisioningStep {
    /// Short label used in logs and errors
    pub fn description(&self) -> String {
        match self {
            Self::EnableExtension { name } => format!("enable extension {}", name),
            Self::DropTable { table } => format!("drop table {}", table),
            Self::CreatePartitionedTable { table } => format!("create table {}", table),
            Self::CreatePartition { table, partition } => {
                format!("create partition {}", partition.table_name(table))
            }
            Self::CreateIndex { name, .. } => format!("create index {}", name),
        }
    }

    /// Render the SQL for this step
    pub fn sql(&self) -> String {
        match self {
            Self::EnableExtension { name } => {
                format!("CREATE EXTENSION IF NOT EXISTS \"{}\"", name)
            }
            Self::DropTable { table } => format!("DROP TABLE IF EXISTS {} CASCADE", table),
            Self::CreatePartitionedTable { table } => {
                let mut columns = vec![format!("{} TIMESTAMPTZ NOT NULL", TIMESTAMP_COLUMN)];
                columns.extend(
                    MeasurementColumn::ALL
                        .iter()
                        .map(|column| format!("{} FLOAT", column.name())),
                );
                format!(
                    "CREATE TABLE IF NOT EXISTS {} (\n    {}\n) PARTITION BY RANGE ({})",
                    table,
                    columns.join(",\n    "),
                    TIMESTAMP_COLUMN
                )
            }
            Self::CreatePartition { table, partition } => format!(
                "CREATE TABLE IF NOT EXISTS {} PARTITION OF {} FOR VALUES FROM ('{}') TO ('{}')",
                partition.table_name(table),
                table,
                partition.start.format("%Y-%m-%d %H:%M:%S+00"),
                partition.end.format("%Y-%m-%d %H:%M:%S+00")
            ),
            Self::CreateIndex {
                name,
                table,
                predicate,
            } => {
                let mut sql = format!(
                    "CREATE INDEX IF NOT EXISTS {} ON {} ({}, {})",
                    name,
                    table,
                    TIMESTAMP_COLUMN,
                    MeasurementColumn::GlobalActivePower.name()
                );
                if let Some(predicate) = predicate {
                    sql.push_str(" WHERE ");
                    sql.push_str(predicate);
                }
                sql
            }
        }
    }
}

/// What a successful provisioning run created
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisioningReport {
    pub steps_applied: usize,
    pub partitions: Vec<PartitionSpec>,
}

/// Schema manager for the partitioned measurement table
#[derive(Debug, Clone)]
pub struct SchemaManager {
    config: SchemaConfig,
}

impl SchemaManager {
    pub fn new(config: SchemaConfig) -> Self {
        Self { config }
    }

    pub fn table(&self) -> &str {
        &self.config.table
    }

    /// One partition per calendar year in the configured span
    pub fn partitions(&self) -> Vec<PartitionSpec> {
        (self.config.first_year..=self.config.last_year)
            .filter_map(PartitionSpec::for_year)
            .collect()
    }

    /// The full ordered DDL plan
    pub fn plan(&self) -> Vec<ProvisioningStep> {
        let table = self.config.table.clone();
        let mut steps: Vec<ProvisioningStep> = self
            .config
            .extensions
            .iter()
            .map(|name| ProvisioningStep::EnableExtension { name: name.clone() })
            .collect();

        steps.push(ProvisioningStep::DropTable {
            table: table.clone(),
        });
        steps.push(ProvisioningStep::CreatePartitionedTable {
            table: table.clone(),
        });

        steps.extend(
            self.partitions()
                .into_iter()
                .map(|partition| ProvisioningStep::CreatePartition {
                    table: table.clone(),
                    partition,
                }),
        );

        steps.push(ProvisioningStep::CreateIndex {
            name: COMPOSITE_INDEX_NAME.to_string(),
            table: table.clone(),
            predicate: None,
        });
        steps.push(ProvisioningStep::CreateIndex {
            name: HIGH_USAGE_INDEX_NAME.to_string(),
            table,
            predicate: Some(format!(
                "{} > {}",
                MeasurementColumn::GlobalActivePower.name(),
                self.config.high_usage_threshold
            )),
        });

        steps
    }

    /// Apply the plan in order, stopping at the first failing step
    pub async fn provision<S: MeasurementStore>(&self, store: &mut S) -> Result<ProvisioningReport> {
        let steps = self.plan();
        info!(
            "Provisioning {} on {} ({} steps)",
            self.config.table,
            store.describe(),
            steps.len()
        );

        for (i, step) in steps.iter().enumerate() {
            debug!("Step {}/{}: {}", i + 1, steps.len(), step.description());
            if let Err(e) = store.apply(step).await {
                if i > 0 {
                    warn!(
                        "{} of {} provisioning steps ran before the failure and were not rolled back",
                        i,
                        steps.len()
                    );
                }
                return Err(IngestError::provisioning(step.description(), e));
            }
        }

        let partitions = self.partitions();
        info!(
            "Table {} created with {} yearly partitions ({}-{})",
            self.config.table,
            partitions.len(),
            self.config.first_year,
            self.config.last_year
        );

        Ok(ProvisioningReport {
            steps_applied: steps.len(),
            partitions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn manager() -> SchemaManager {
        SchemaManager::new(SchemaConfig::default())
    }

    #[test]
    fn test_one_partition_per_year() {
        let partitions = manager().partitions();
        let years: Vec<i32> = partitions.iter().map(|p| p.year).collect();

        assert_eq!(years, vec![2006, 2007, 2008, 2009, 2010, 2011]);
        for pair in partitions.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn test_plan_order() {
        let plan = manager().plan();
        let descriptions: Vec<String> = plan.iter().map(|s| s.description()).collect();

        assert_eq!(descriptions[0], "enable extension timescaledb");
        assert_eq!(descriptions[1], "enable extension uuid-ossp");
        assert_eq!(descriptions[5], "drop table power_consumption");
        assert_eq!(descriptions[6], "create table power_consumption");
        assert_eq!(descriptions[7], "create partition power_consumption_y2006");
        assert_eq!(descriptions[12], "create partition power_consumption_y2011");
        assert_eq!(descriptions[13], "create index idx_date_power");
        assert_eq!(descriptions[14], "create index idx_high_power");
        assert_eq!(plan.len(), 15);
    }

    #[test]
    fn test_rendered_sql() {
        let plan = manager().plan();

        assert_eq!(plan[1].sql(), "CREATE EXTENSION IF NOT EXISTS \"uuid-ossp\"");
        assert_eq!(plan[5].sql(), "DROP TABLE IF EXISTS power_consumption CASCADE");

        let create = plan[6].sql();
        assert!(create.starts_with("CREATE TABLE IF NOT EXISTS power_consumption ("));
        assert!(create.contains("date_time TIMESTAMPTZ NOT NULL"));
        assert!(create.contains("sub_metering_3 FLOAT"));
        assert!(create.ends_with("PARTITION BY RANGE (date_time)"));

        assert_eq!(
            plan[7].sql(),
            "CREATE TABLE IF NOT EXISTS power_consumption_y2006 PARTITION OF power_consumption \
             FOR VALUES FROM ('2006-01-01 00:00:00+00') TO ('2007-01-01 00:00:00+00')"
        );
        assert_eq!(
            plan[13].sql(),
            "CREATE INDEX IF NOT EXISTS idx_date_power ON power_consumption (date_time, global_active_power)"
        );
        assert_eq!(
            plan[14].sql(),
            "CREATE INDEX IF NOT EXISTS idx_high_power ON power_consumption (date_time, global_active_power) \
             WHERE global_active_power > 5"
        );
    }

    #[tokio::test]
    async fn test_provision_creates_table_partitions_and_indexes() {
        let mut store = MemoryStore::new();

        let report = manager().provision(&mut store).await.unwrap();

        assert_eq!(report.steps_applied, 15);
        assert_eq!(report.partitions.len(), 6);
        assert!(store.has_table("power_consumption"));
        assert_eq!(
            store.partition_years("power_consumption"),
            vec![2006, 2007, 2008, 2009, 2010, 2011]
        );
        assert!(store.has_index("idx_date_power"));
        assert!(store.has_index("idx_high_power"));
        assert!(store.has_extension("postgis"));
    }

    #[tokio::test]
    async fn test_provision_is_repeatable() {
        let mut store = MemoryStore::new();
        manager().provision(&mut store).await.unwrap();
        manager().provision(&mut store).await.unwrap();

        assert_eq!(store.partition_years("power_consumption").len(), 6);
    }

    #[tokio::test]
    async fn test_failing_step_is_reported_and_not_rolled_back() {
        let mut store = MemoryStore::new().fail_step_matching("power_consumption_y2008");

        match manager().provision(&mut store).await {
            Err(IngestError::Provisioning { step, .. }) => {
                assert_eq!(step, "create partition power_consumption_y2008");
            }
            other => panic!("Expected Provisioning error, got {:?}", other),
        }

        // Earlier steps stay applied
        assert!(store.has_table("power_consumption"));
        assert_eq!(store.partition_years("power_consumption"), vec![2006, 2007]);
        assert!(!store.has_index("idx_date_power"));
    }
}
