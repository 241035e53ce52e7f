//! PostgreSQL / TimescaleDB store backed by a single sqlx connection.

use super::{MeasurementStore, StoreError, StoreResult};
use crate::config::StoreConfig;
use crate::constants::{MAX_BIND_PARAMETERS, TIMESTAMP_COLUMN};
use crate::error::{IngestError, Result};
use crate::models::{MeasurementColumn, MeasurementRecord, TableSummary};
use crate::schema::ProvisioningStep;
use async_trait::async_trait;
use sqlx::postgres::PgConnectOptions;
use sqlx::{Connection, Executor, PgConnection, Postgres, QueryBuilder};
use tracing::{debug, info, warn};

/// Bound parameters per inserted row: timestamp plus seven measurements
const BINDS_PER_ROW: usize = 1 + MeasurementColumn::ALL.len();

/// Rows per INSERT statement that keep the bind count under the server limit
const MAX_ROWS_PER_STATEMENT: usize = MAX_BIND_PARAMETERS / BINDS_PER_ROW;

pub struct PgStore {
    conn: PgConnection,
    target: String,
}

impl PgStore {
    /// Open the session used for the rest of the run
    pub async fn connect(config: &StoreConfig) -> Result<Self> {
        let target = config.target();
        let options = PgConnectOptions::new()
            .host(&config.host)
            .port(config.port)
            .database(&config.database)
            .username(&config.user)
            .password(&config.password);

        let conn = PgConnection::connect_with(&options)
            .await
            .map_err(|e| IngestError::connection(&target, StoreError::from(e)))?;

        info!("Connected to {}", target);
        Ok(Self { conn, target })
    }
}

/// `INSERT INTO <table> (date_time, global_active_power, ...) `
fn insert_prefix(table: &str) -> String {
    let columns: Vec<&str> = std::iter::once(TIMESTAMP_COLUMN)
        .chain(MeasurementColumn::ALL.iter().map(|c| c.name()))
        .collect();
    format!("INSERT INTO {} ({}) ", table, columns.join(", "))
}

#[async_trait]
impl MeasurementStore for PgStore {
    fn describe(&self) -> String {
        format!("postgres://{}", self.target)
    }

    async fn apply(&mut self, step: &ProvisioningStep) -> StoreResult<()> {
        let sql = step.sql();
        debug!("Executing: {}", sql);
        (&mut self.conn).execute(sql.as_str()).await?;
        Ok(())
    }

    async fn table_exists(&mut self, table: &str) -> StoreResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT FROM information_schema.tables WHERE table_name = $1)",
        )
        .bind(table)
        .fetch_one(&mut self.conn)
        .await?;
        Ok(exists)
    }

    async fn truncate(&mut self, table: &str) -> StoreResult<()> {
        let sql = format!("TRUNCATE TABLE {}", table);
        (&mut self.conn).execute(sql.as_str()).await?;
        Ok(())
    }

    async fn insert_batch(&mut self, table: &str, records: &[MeasurementRecord]) -> StoreResult<u64> {
        let prefix = insert_prefix(table);
        let mut tx = self.conn.begin().await?;
        let mut inserted = 0;

        for chunk in records.chunks(MAX_ROWS_PER_STATEMENT) {
            let mut builder = QueryBuilder::<Postgres>::new(&prefix);
            builder.push_values(chunk, |mut row, record| {
                row.push_bind(record.timestamp)
                    .push_bind(record.global_active_power)
                    .push_bind(record.global_reactive_power)
                    .push_bind(record.voltage)
                    .push_bind(record.global_intensity)
                    .push_bind(record.sub_metering_1)
                    .push_bind(record.sub_metering_2)
                    .push_bind(record.sub_metering_3);
            });

            match builder.build().execute(&mut *tx).await {
                Ok(result) => inserted += result.rows_affected(),
                Err(e) => {
                    if let Err(rollback_err) = tx.rollback().await {
                        warn!("Rollback after failed insert also failed: {}", rollback_err);
                    }
                    return Err(e.into());
                }
            }
        }

        tx.commit().await?;
        Ok(inserted)
    }

    async fn summarize(&mut self, table: &str) -> StoreResult<TableSummary> {
        let sql = format!(
            "SELECT COUNT(*), COALESCE(SUM(global_active_power), 0)::FLOAT8 FROM {}",
            table
        );
        let (row_count, global_active_power_sum) = sqlx::query_as::<_, (i64, f64)>(&sql)
            .fetch_one(&mut self.conn)
            .await?;

        Ok(TableSummary {
            row_count,
            global_active_power_sum,
        })
    }

    async fn close(self) -> StoreResult<()>
    where
        Self: Sized,
    {
        self.conn.close().await?;
        debug!("Closed connection to {}", self.target);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_prefix_lists_all_columns_in_order() {
        assert_eq!(
            insert_prefix("power_consumption"),
            "INSERT INTO power_consumption (date_time, global_active_power, global_reactive_power, \
             voltage, global_intensity, sub_metering_1, sub_metering_2, sub_metering_3) "
        );
    }

    #[test]
    fn test_statement_rows_respect_bind_limit() {
        assert_eq!(BINDS_PER_ROW, 8);
        assert!(MAX_ROWS_PER_STATEMENT * BINDS_PER_ROW <= MAX_BIND_PARAMETERS);
    }
}
