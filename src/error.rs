use std::path::PathBuf;

use thiserror::Error;

/// Errors raised by the destination store.
#[derive(Error, Debug)]
pub enum WarehouseError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("ClickHouse returned {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Unexpected response: {0}")]
    Response(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Destination unreachable after {attempts} attempts: {last_error}")]
    ConnectivityFailed { attempts: u32, last_error: String },

    #[error("No usable text encoding for {}", path.display())]
    NoEncodingResolved { path: PathBuf },

    #[error("Schema inference failed: {0}")]
    SchemaInferenceFailed(String),

    #[error("Provisioning of table {table} failed: {source}")]
    ProvisioningFailed {
        table: String,
        #[source]
        source: WarehouseError,
    },

    #[error("Load into {table} failed after {inserted} rows: {source}")]
    LoadFailed {
        table: String,
        inserted: u64,
        #[source]
        source: WarehouseError,
    },

    #[error("Discovery error: {0}")]
    Discovery(String),

    #[error("Pipeline task aborted: {0}")]
    TaskAborted(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Warehouse error: {0}")]
    Warehouse(#[from] WarehouseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IngestError>;
