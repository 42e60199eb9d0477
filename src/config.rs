//! Run configuration
//!
//! Everything the loader needs is carried in an explicit [`IngestConfig`]
//! built once at startup; nothing is read from globals afterwards.

use crate::error::{IngestError, Result};
use crate::ingestion::naming::DEFAULT_TABLE_PREFIX;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// ClickHouse HTTP endpoint and credentials.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub database: String,
    pub secure: bool,
}

impl ConnectionConfig {
    pub fn base_url(&self) -> String {
        let scheme = if self.secure { "https" } else { "http" };
        format!("{}://{}:{}/", scheme, self.host, self.port)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8123,
            user: "default".to_string(),
            password: String::new(),
            database: "bronze".to_string(),
            secure: false,
        }
    }
}

/// Bounded retry applied to the initial connectivity check only.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            delay: Duration::from_secs(2),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IngestConfig {
    pub connection: ConnectionConfig,
    pub input_dir: PathBuf,
    /// Glob matched against file names inside `input_dir`.
    pub file_pattern: String,
    /// When set, decoded copies of every input are written here as UTF-8.
    pub staging_dir: Option<PathBuf>,
    pub table_prefix: String,
    pub retry: RetryPolicy,
    /// Number of files processed at once. 1 keeps the run strictly sequential.
    pub parallelism: usize,
    /// Rows per insert request.
    pub batch_size: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            input_dir: PathBuf::from("./csv_files"),
            file_pattern: "*.csv".to_string(),
            staging_dir: None,
            table_prefix: DEFAULT_TABLE_PREFIX.to_string(),
            retry: RetryPolicy::default(),
            parallelism: 1,
            batch_size: 10_000,
        }
    }
}

impl IngestConfig {
    pub fn validate(&self) -> Result<()> {
        if self.parallelism == 0 {
            return Err(IngestError::Config("parallelism must be at least 1".to_string()));
        }
        if self.batch_size == 0 {
            return Err(IngestError::Config("batch size must be at least 1".to_string()));
        }
        if self.retry.max_attempts == 0 {
            return Err(IngestError::Config("retry attempts must be at least 1".to_string()));
        }
        if self.connection.database.trim().is_empty() {
            return Err(IngestError::Config("database name is empty".to_string()));
        }
        Ok(())
    }
}

/// Command line, with environment fallbacks (a `.env` file is honoured).
#[derive(Parser, Debug)]
#[command(name = "bronze-loader")]
#[command(about = "Load a directory of CSV files into ClickHouse, one table per file")]
#[command(version)]
pub struct Args {
    /// ClickHouse host
    #[arg(long, env = "CLICKHOUSE_HOST", default_value = "localhost")]
    pub host: String,

    /// ClickHouse HTTP port
    #[arg(long, env = "CLICKHOUSE_PORT", default_value_t = 8123)]
    pub port: u16,

    /// ClickHouse user
    #[arg(long, env = "CLICKHOUSE_USER", default_value = "default")]
    pub user: String,

    /// ClickHouse password
    #[arg(long, env = "CLICKHOUSE_PASSWORD", default_value = "", hide_env_values = true)]
    pub password: String,

    /// Destination database
    #[arg(long, env = "CLICKHOUSE_DATABASE", default_value = "bronze")]
    pub database: String,

    /// Use HTTPS
    #[arg(long, env = "CLICKHOUSE_SECURE")]
    pub secure: bool,

    /// Directory holding the CSV files
    #[arg(short, long, env = "CSV_DIR", default_value = "./csv_files")]
    pub input_dir: PathBuf,

    /// Directory receiving UTF-8 copies of every decoded file
    #[arg(short, long, env = "OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// File name pattern
    #[arg(long, default_value = "*.csv")]
    pub pattern: String,

    /// Prefix stripped from file names before deriving table names
    #[arg(long, default_value = DEFAULT_TABLE_PREFIX)]
    pub table_prefix: String,

    /// Files processed concurrently
    #[arg(long, default_value_t = 1)]
    pub parallelism: usize,
}

impl From<Args> for IngestConfig {
    fn from(args: Args) -> Self {
        Self {
            connection: ConnectionConfig {
                host: args.host,
                port: args.port,
                user: args.user,
                password: args.password,
                database: args.database,
                secure: args.secure,
            },
            input_dir: args.input_dir,
            file_pattern: args.pattern,
            staging_dir: args.output_dir,
            table_prefix: args.table_prefix,
            parallelism: args.parallelism,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_into_config() {
        let args = Args::parse_from([
            "bronze-loader",
            "--host",
            "ch.internal",
            "--port",
            "8443",
            "--secure",
            "--database",
            "raw",
            "--input-dir",
            "/data/in",
            "--parallelism",
            "4",
        ]);
        let config = IngestConfig::from(args);
        assert_eq!(config.connection.base_url(), "https://ch.internal:8443/");
        assert_eq!(config.connection.database, "raw");
        assert_eq!(config.input_dir, PathBuf::from("/data/in"));
        assert_eq!(config.parallelism, 4);
        assert_eq!(config.retry.max_attempts, 30);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_parallelism() {
        let config = IngestConfig {
            parallelism: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(IngestError::Config(_))));
    }
}
