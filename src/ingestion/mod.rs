//! Ingestion Module - CSV directory to ClickHouse tables
//!
//! Each file runs through the same stages:
//! - Encoding resolution
//! - Schema inference
//! - Table provisioning (drop + create)
//! - Bulk load with row count verification

pub mod csv_connector;
pub mod encoding;
pub mod loader;
pub mod naming;
pub mod orchestrator;
pub mod schema_inference;
pub mod source;
pub mod table_builder;

pub use csv_connector::{CsvConnector, CsvGrid};
pub use encoding::{CandidateEncoding, EncodingResolver, ResolutionMethod, ResolvedEncoding};
pub use loader::{BulkLoader, LoadReport, VerificationMismatch};
pub use naming::{sanitize_identifier, table_name_for};
pub use orchestrator::IngestionOrchestrator;
pub use schema_inference::{classify_column, is_missing, FieldSpec, FieldType, SchemaInference, TableSpec};
pub use source::{discover, SourceFile};
pub use table_builder::TableBuilder;

use crate::error::IngestError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Pipeline stage a file was in when it stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Read,
    EncodingResolution,
    SchemaInference,
    Provisioning,
    Load,
}

/// Per-file state machine. `Loaded` and `Failed` are terminal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    Discovered,
    EncodingResolved,
    SchemaInferred,
    TableProvisioned,
    Loaded(u64),
    Failed { stage: Stage, reason: String },
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Loaded(_) | PipelineState::Failed { .. })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum IngestionStatus {
    Success,
    ReadFailed,
    EncodingFailed,
    SchemaInferenceFailed,
    ProvisioningFailed,
    LoadFailed,
}

impl IngestionStatus {
    fn for_failure(stage: Stage) -> Self {
        match stage {
            Stage::Read => IngestionStatus::ReadFailed,
            Stage::EncodingResolution => IngestionStatus::EncodingFailed,
            Stage::SchemaInference => IngestionStatus::SchemaInferenceFailed,
            Stage::Provisioning => IngestionStatus::ProvisioningFailed,
            Stage::Load => IngestionStatus::LoadFailed,
        }
    }
}

/// Ingestion result for one file
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestionResult {
    pub source: PathBuf,

    pub table_name: String,

    /// Rows inserted (for failed loads: rows inserted before the failure).
    pub row_count: u64,

    /// Malformed rows dropped while parsing.
    pub skipped_rows: u64,

    pub encoding: Option<ResolvedEncoding>,

    pub state: PipelineState,

    pub status: IngestionStatus,

    /// Error message (if failed)
    pub error: Option<String>,

    /// Set when the destination count disagreed with the rows sent.
    pub verification: Option<VerificationMismatch>,
}

impl IngestionResult {
    pub fn loaded(
        source: PathBuf,
        table_name: String,
        report: LoadReport,
        skipped_rows: u64,
        encoding: Option<ResolvedEncoding>,
    ) -> Self {
        Self {
            source,
            table_name,
            row_count: report.rows_loaded,
            skipped_rows,
            encoding,
            state: PipelineState::Loaded(report.rows_loaded),
            status: IngestionStatus::Success,
            error: None,
            verification: report.verification,
        }
    }

    pub fn failed(
        source: PathBuf,
        table_name: String,
        stage: Stage,
        error: &IngestError,
        encoding: Option<ResolvedEncoding>,
    ) -> Self {
        let row_count = match error {
            IngestError::LoadFailed { inserted, .. } => *inserted,
            _ => 0,
        };
        Self {
            source,
            table_name,
            row_count,
            skipped_rows: 0,
            encoding,
            state: PipelineState::Failed {
                stage,
                reason: error.to_string(),
            },
            status: IngestionStatus::for_failure(stage),
            error: Some(error.to_string()),
            verification: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == IngestionStatus::Success
    }
}

/// Live row count of a destination table, or why it could not be read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableCount {
    pub table: String,
    pub rows: Result<u64, String>,
}

/// Batch outcome, produced once every file has reached a terminal state.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Summary {
    pub run_id: String,
    pub database: String,
    pub total_files: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<IngestionResult>,
    /// Post-run listing of every table in the database.
    pub tables: Vec<TableCount>,
    /// Set when the table listing itself failed.
    pub listing_error: Option<String>,
}

impl Summary {
    pub fn failures(&self) -> impl Iterator<Item = &IngestionResult> {
        self.results.iter().filter(|r| !r.is_success())
    }

    pub fn anomalies(&self) -> impl Iterator<Item = &IngestionResult> {
        self.results.iter().filter(|r| r.verification.is_some())
    }

    pub fn table_rows(&self, table: &str) -> Option<u64> {
        self.tables
            .iter()
            .find(|t| t.table == table)
            .and_then(|t| t.rows.as_ref().ok().copied())
    }
}
