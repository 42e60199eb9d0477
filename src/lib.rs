pub mod config;
pub mod db;
pub mod error;
pub mod ingestion;
pub mod report;

use crate::config::IngestConfig;
use crate::db::WarehouseSession;
use crate::error::Result;
use crate::ingestion::{discover, IngestionOrchestrator, Summary};
use std::sync::Arc;
use tracing::warn;

/// Bootstrap the destination, discover inputs and ingest them.
///
/// Fails only when the configuration is invalid, the destination stays
/// unreachable for the whole retry budget, or the input directory cannot be
/// listed. Per-file failures are reported inside the [`Summary`].
pub async fn run(config: &IngestConfig, session: Arc<dyn WarehouseSession>) -> Result<Summary> {
    config.validate()?;
    db::bootstrap(session.as_ref(), &config.retry).await?;

    let files = discover(&config.input_dir, &config.file_pattern)?;
    if files.is_empty() {
        warn!(dir = %config.input_dir.display(), "no input files found");
    }

    let orchestrator = IngestionOrchestrator::new(config, session);
    Ok(orchestrator.run(files).await)
}
