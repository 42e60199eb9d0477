//! Ingestion Orchestrator - Drives every input file through the pipeline
//!
//! Files are independent: a failure in one is recorded in its
//! [`IngestionResult`] and never stops the others. The post-run table listing
//! starts only after every file has reached a terminal state.

use crate::config::IngestConfig;
use crate::db::WarehouseSession;
use crate::error::IngestError;
use crate::ingestion::{
    naming::table_name_for, BulkLoader, CsvConnector, EncodingResolver, IngestionResult,
    PipelineState, SchemaInference, SourceFile, Stage, Summary, TableBuilder, TableCount,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Everything one file needs; shared by all concurrent pipelines.
struct FilePipeline {
    session: Arc<dyn WarehouseSession>,
    resolver: EncodingResolver,
    schema_inference: SchemaInference,
    table_builder: TableBuilder,
    loader: BulkLoader,
    table_prefix: String,
    staging_dir: Option<PathBuf>,
}

/// Ingestion Orchestrator - Coordinates the entire ingestion process
pub struct IngestionOrchestrator {
    pipeline: Arc<FilePipeline>,
    parallelism: usize,
}

impl IngestionOrchestrator {
    pub fn new(config: &IngestConfig, session: Arc<dyn WarehouseSession>) -> Self {
        Self::with_resolver(config, session, EncodingResolver::new())
    }

    /// Build an orchestrator that decodes files with `resolver`.
    pub fn with_resolver(
        config: &IngestConfig,
        session: Arc<dyn WarehouseSession>,
        resolver: EncodingResolver,
    ) -> Self {
        Self {
            pipeline: Arc::new(FilePipeline {
                session,
                resolver,
                schema_inference: SchemaInference::new(),
                table_builder: TableBuilder::new(),
                loader: BulkLoader::new(config.batch_size),
                table_prefix: config.table_prefix.clone(),
                staging_dir: config.staging_dir.clone(),
            }),
            parallelism: config.parallelism.max(1),
        }
    }

    /// Run a single file end to end.
    pub async fn ingest_file(&self, path: &Path) -> IngestionResult {
        self.pipeline.ingest_file(path).await
    }

    /// Ingest every file, then list the destination tables.
    pub async fn run(&self, files: Vec<PathBuf>) -> Summary {
        let run_id = Uuid::new_v4().to_string();
        info!(run_id = %run_id, files = files.len(), parallelism = self.parallelism, "starting ingestion run");

        let results = if self.parallelism == 1 {
            let mut results = Vec::with_capacity(files.len());
            for path in &files {
                results.push(self.pipeline.ingest_file(path).await);
            }
            results
        } else {
            self.run_parallel(files.clone()).await
        };

        let succeeded = results.iter().filter(|r| r.is_success()).count();
        let failed = results.len() - succeeded;
        let (tables, listing_error) = self.pipeline.list_tables().await;

        Summary {
            run_id,
            database: self.pipeline.session.database().to_string(),
            total_files: files.len(),
            succeeded,
            failed,
            results,
            tables,
            listing_error,
        }
    }

    /// Bounded fan-out. Files that map to the same table are serialized on a
    /// per-table lock; results come back in input order.
    async fn run_parallel(&self, files: Vec<PathBuf>) -> Vec<IngestionResult> {
        let permits = Arc::new(Semaphore::new(self.parallelism));

        let mut locks: HashMap<String, Arc<Mutex<()>>> = HashMap::new();
        let tables: Vec<String> = files
            .iter()
            .map(|p| table_name_for(p, &self.pipeline.table_prefix))
            .collect();
        for table in &tables {
            locks.entry(table.clone()).or_default();
        }

        let mut handles = Vec::with_capacity(files.len());
        for (path, table) in files.iter().zip(tables.iter()) {
            let pipeline = Arc::clone(&self.pipeline);
            let permits = Arc::clone(&permits);
            let lock = Arc::clone(&locks[table]);
            let path = path.clone();

            handles.push(tokio::spawn(async move {
                let _table_guard = lock.lock().await;
                let _permit = permits.acquire_owned().await;
                pipeline.ingest_file(&path).await
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for ((path, table), handle) in files.into_iter().zip(tables).zip(handles) {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    let err = IngestError::TaskAborted(e.to_string());
                    error!(file = %path.display(), error = %err, "pipeline task aborted");
                    results.push(IngestionResult::failed(path, table, Stage::Load, &err, None));
                }
            }
        }
        results
    }
}

impl FilePipeline {
    async fn ingest_file(&self, path: &Path) -> IngestionResult {
        let table_name = table_name_for(path, &self.table_prefix);
        let mut source = SourceFile::new(path);
        let file_name = source.file_name();
        let mut state = PipelineState::Discovered;

        info!(file = %file_name, table = %table_name, "processing file");

        let fail = |stage: Stage, err: IngestError, source: &SourceFile| {
            error!(file = %file_name, table = %table_name, ?stage, error = %err, "file failed");
            IngestionResult::failed(
                path.to_path_buf(),
                table_name.clone(),
                stage,
                &err,
                source.encoding().cloned(),
            )
        };

        let text = match source.decode(&self.resolver) {
            Ok(text) => text,
            Err(err @ IngestError::Io(_)) => return fail(Stage::Read, err, &source),
            Err(err) => return fail(Stage::EncodingResolution, err, &source),
        };
        advance(&mut state, PipelineState::EncodingResolved, &file_name);

        self.write_staging_copy(&file_name, &text);

        if table_name.is_empty() {
            let err = IngestError::SchemaInferenceFailed(format!(
                "{}: file name yields an empty table name",
                file_name
            ));
            return fail(Stage::SchemaInference, err, &source);
        }

        let grid = match CsvConnector::new(file_name.clone(), &text).parse() {
            Ok(grid) => grid,
            Err(err) => return fail(Stage::SchemaInference, err, &source),
        };
        if grid.skipped_rows > 0 {
            warn!(file = %file_name, skipped = grid.skipped_rows, "malformed rows skipped");
        }

        let spec = match self.schema_inference.infer_schema(&table_name, &grid) {
            Ok(spec) => spec,
            Err(err) => return fail(Stage::SchemaInference, err, &source),
        };
        advance(&mut state, PipelineState::SchemaInferred, &file_name);

        if let Err(err) = self.table_builder.provision(self.session.as_ref(), &spec).await {
            return fail(Stage::Provisioning, err, &source);
        }
        advance(&mut state, PipelineState::TableProvisioned, &file_name);

        let report = match self.loader.load(self.session.as_ref(), &spec, &grid).await {
            Ok(report) => report,
            Err(err) => return fail(Stage::Load, err, &source),
        };
        advance(&mut state, PipelineState::Loaded(report.rows_loaded), &file_name);

        let preview: Vec<&str> = spec.column_names().take(5).collect();
        info!(
            table = %table_name,
            columns = %preview.join(", "),
            more = spec.fields.len() > 5,
            "column preview"
        );

        IngestionResult::loaded(
            path.to_path_buf(),
            table_name.clone(),
            report,
            grid.skipped_rows as u64,
            source.encoding().cloned(),
        )
    }

    fn write_staging_copy(&self, file_name: &str, text: &str) {
        let Some(dir) = &self.staging_dir else {
            return;
        };

        let target = dir.join(file_name);
        let written = std::fs::create_dir_all(dir).and_then(|_| std::fs::write(&target, text));
        match written {
            Ok(()) => debug!(path = %target.display(), "wrote UTF-8 copy"),
            Err(e) => warn!(path = %target.display(), error = %e, "could not write UTF-8 copy"),
        }
    }

    async fn list_tables(&self) -> (Vec<TableCount>, Option<String>) {
        let names = match self.session.list_tables().await {
            Ok(names) => names,
            Err(e) => {
                error!(error = %e, "listing tables failed");
                return (Vec::new(), Some(e.to_string()));
            }
        };

        let mut tables = Vec::with_capacity(names.len());
        for table in names {
            let rows = self.session.count_rows(&table).await.map_err(|e| e.to_string());
            tables.push(TableCount { table, rows });
        }
        (tables, None)
    }
}

fn advance(state: &mut PipelineState, next: PipelineState, file_name: &str) {
    debug!(file = %file_name, from = ?state, to = ?next, "pipeline transition");
    *state = next;
}
