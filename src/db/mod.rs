//! Destination store access
//!
//! The pipeline talks to ClickHouse only through [`WarehouseSession`], so the
//! core logic can run against any implementation of it.

pub mod connection;

pub use connection::{bootstrap, wait_until_ready, ClickHouseClient};

use crate::error::WarehouseError;
use async_trait::async_trait;
use serde_json::{Map, Value};

pub type Row = Map<String, Value>;

/// An open, authenticated session against the destination database.
///
/// Table arguments are bare table names; implementations qualify them with
/// [`WarehouseSession::database`].
#[async_trait]
pub trait WarehouseSession: Send + Sync {
    /// Database all tables live in.
    fn database(&self) -> &str;

    /// Cheap round trip used by the connectivity check.
    async fn ping(&self) -> Result<(), WarehouseError>;

    /// Run a statement that returns no rows (DDL).
    async fn command(&self, sql: &str) -> Result<(), WarehouseError>;

    /// Insert rows keyed by column name. `null` values are SQL NULLs.
    async fn insert_rows(&self, table: &str, rows: &[Row]) -> Result<(), WarehouseError>;

    async fn count_rows(&self, table: &str) -> Result<u64, WarehouseError>;

    async fn list_tables(&self) -> Result<Vec<String>, WarehouseError>;
}

/// Quote an identifier for ClickHouse SQL.
pub fn quote_ident(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    out.push('`');
    for ch in name.chars() {
        match ch {
            '`' => out.push_str("\\`"),
            '\\' => out.push_str("\\\\"),
            other => out.push(other),
        }
    }
    out.push('`');
    out
}

/// `db`.`table`
pub fn qualified(database: &str, table: &str) -> String {
    format!("{}.{}", quote_ident(database), quote_ident(table))
}
