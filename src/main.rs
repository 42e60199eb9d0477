use bronze_loader::config::{Args, IngestConfig};
use bronze_loader::db::ClickHouseClient;
use bronze_loader::report::render_summary;

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = IngestConfig::from(Args::parse());

    println!("{}", "=".repeat(60));
    println!("🚀 ClickHouse CSV Importer");
    println!("{}", "=".repeat(60));
    println!("\n📡 Connecting to ClickHouse at {}", config.connection.base_url());

    let client = ClickHouseClient::new(&config.connection)
        .context("Failed to build ClickHouse client")?;

    let summary = match bronze_loader::run(&config, Arc::new(client)).await {
        Ok(summary) => summary,
        Err(e) => {
            error!(error = %e, "run aborted");
            eprintln!("❌ {}", e);
            eprintln!("\n💡 Make sure ClickHouse is running and reachable.");
            return Err(e.into());
        }
    };

    if summary.total_files == 0 {
        println!("\n⚠️  No files matching '{}' in {}", config.file_pattern, config.input_dir.display());
        return Ok(());
    }

    print!("{}", render_summary(&summary));
    println!("\n✨ Done!");
    println!("🔗 Access ClickHouse at: {}", config.connection.base_url());

    Ok(())
}
