//! Error handling for ingestion runs.
//!
//! Every stage of the pipeline returns one of these variants. Coercion
//! failures and out-of-range voltages are recovered inside the cleaner and
//! validator and never show up here.

use crate::store::StoreError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Failed to read input file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Unable to connect to store at {target}: {source}")]
    Connection {
        target: String,
        #[source]
        source: StoreError,
    },

    #[error("Malformed input at line {line}: {reason}")]
    Structural { line: u64, reason: String },

    #[error("Invalid timestamp at line {line}: '{value}' (expected DD/MM/YYYY HH:MM:SS)")]
    Format { line: u64, value: String },

    #[error("Domain validation failed: {reason}")]
    Domain { reason: String },

    #[error("Load failed: {message} ({committed_rows} rows already committed)")]
    Load {
        message: String,
        committed_rows: usize,
        #[source]
        source: StoreError,
    },

    #[error("Provisioning step '{step}' failed: {source}")]
    Provisioning {
        step: String,
        #[source]
        source: StoreError,
    },

    #[error("Configuration error: {message}")]
    Configuration { message: String },
}

impl IngestError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn connection(target: impl Into<String>, source: StoreError) -> Self {
        Self::Connection {
            target: target.into(),
            source,
        }
    }

    pub fn structural(line: u64, reason: impl Into<String>) -> Self {
        Self::Structural {
            line,
            reason: reason.into(),
        }
    }

    pub fn format(line: u64, value: impl Into<String>) -> Self {
        Self::Format {
            line,
            value: value.into(),
        }
    }

    pub fn domain(reason: impl Into<String>) -> Self {
        Self::Domain {
            reason: reason.into(),
        }
    }

    pub fn load(message: impl Into<String>, committed_rows: usize, source: StoreError) -> Self {
        Self::Load {
            message: message.into(),
            committed_rows,
            source,
        }
    }

    pub fn provisioning(step: impl Into<String>, source: StoreError) -> Self {
        Self::Provisioning {
            step: step.into(),
            source,
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Short name of the failure class, used when logging which stage halted the run
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io { .. } => "io",
            Self::Connection { .. } => "connection",
            Self::Structural { .. } => "structural",
            Self::Format { .. } => "format",
            Self::Domain { .. } => "domain",
            Self::Load { .. } => "load",
            Self::Provisioning { .. } => "provisioning",
            Self::Configuration { .. } => "configuration",
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
