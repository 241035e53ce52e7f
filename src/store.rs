//! Access to the destination time-series store.
//!
//! The pipeline talks to the store only through `MeasurementStore`. The
//! PostgreSQL implementation holds one session for the whole run; the
//! in-memory implementation mirrors partition routing for dry runs and
//! tests.

pub mod memory;
pub mod postgres;

use crate::models::{MeasurementRecord, TableSummary};
use crate::schema::ProvisioningStep;
use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{0}")]
    Rejected(String),
}

impl StoreError {
    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected(message.into())
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Operations the pipeline needs from the store
///
/// Every call blocks the run until the store answers; there are no
/// timeouts or retries.
#[async_trait]
pub trait MeasurementStore: Send {
    /// Where this store lives, for log lines
    fn describe(&self) -> String;

    /// Execute one provisioning step
    async fn apply(&mut self, step: &ProvisioningStep) -> StoreResult<()>;

    async fn table_exists(&mut self, table: &str) -> StoreResult<bool>;

    /// Remove every row from `table`
    async fn truncate(&mut self, table: &str) -> StoreResult<()>;

    /// Insert all `records` in one transaction; nothing is kept on error
    async fn insert_batch(&mut self, table: &str, records: &[MeasurementRecord]) -> StoreResult<u64>;

    /// Row count and `global_active_power` total of `table`
    async fn summarize(&mut self, table: &str) -> StoreResult<TableSummary>;

    /// Release the session
    async fn close(self) -> StoreResult<()>
    where
        Self: Sized;
}
