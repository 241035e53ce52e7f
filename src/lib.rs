//! Household Power Ingestion Library
//!
//! Loads per-minute household electrical-power readings from a
//! semicolon-delimited file into a yearly-partitioned PostgreSQL/TimescaleDB
//! table.
//!
//! This library provides tools for:
//! - Parsing the delimited input into raw records with header-based column mapping
//! - Coercing fields, replacing missing-value sentinels and repairing gaps
//! - Enforcing domain invariants (hard rejection and soft voltage repair)
//! - Provisioning the partitioned table, its yearly partitions and indexes
//! - Idempotent loading in fixed-size transactional batches
//! - An in-memory store with the same partition routing, for dry runs and tests

pub mod cleaner;
pub mod cli;
pub mod config;
pub mod constants;
pub mod error;
pub mod loader;
pub mod models;
pub mod pipeline;
pub mod reader;
pub mod repair;
pub mod schema;
pub mod store;
pub mod validator;

// Re-export commonly used types
pub use config::{IngestConfig, PipelineConfig, SchemaConfig, StoreConfig};
pub use error::{IngestError, Result};
pub use models::{IngestionSummary, MeasurementColumn, MeasurementRecord, RawRecord};
pub use pipeline::IngestionPipeline;
pub use store::{MeasurementStore, MemoryStore, PgStore};
