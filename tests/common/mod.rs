//! In-memory stand-in for ClickHouse used by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bronze_loader::db::{Row, WarehouseSession};
use bronze_loader::error::WarehouseError;
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

#[derive(Default)]
struct State {
    tables: BTreeMap<String, Vec<Row>>,
    commands: Vec<String>,
    pings: u32,
}

#[derive(Default)]
pub struct MemoryWarehouse {
    database: String,
    state: Mutex<State>,
    unreachable: bool,
    fail_create: HashSet<String>,
    fail_insert: HashSet<String>,
    /// Rows silently dropped from every insert into these tables.
    lossy: HashSet<String>,
}

impl MemoryWarehouse {
    pub fn new(database: &str) -> Self {
        Self {
            database: database.to_string(),
            ..Default::default()
        }
    }

    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn failing_create(mut self, table: &str) -> Self {
        self.fail_create.insert(table.to_string());
        self
    }

    pub fn failing_insert(mut self, table: &str) -> Self {
        self.fail_insert.insert(table.to_string());
        self
    }

    pub fn lossy(mut self, table: &str) -> Self {
        self.lossy.insert(table.to_string());
        self
    }

    pub fn rows(&self, table: &str) -> Option<Vec<Row>> {
        self.state.lock().unwrap().tables.get(table).cloned()
    }

    pub fn table_names(&self) -> Vec<String> {
        self.state.lock().unwrap().tables.keys().cloned().collect()
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.lock().unwrap().commands.clone()
    }

    pub fn pings(&self) -> u32 {
        self.state.lock().unwrap().pings
    }

    pub fn seed_table(&self, table: &str, rows: Vec<Row>) {
        self.state.lock().unwrap().tables.insert(table.to_string(), rows);
    }
}

/// Pull the table out of "<prefix> `db`.`table`...".
fn table_after(sql: &str, prefix: &str) -> Option<String> {
    let rest = sql.strip_prefix(prefix)?.trim_start();
    let (_, after_db) = rest.split_once("`.`")?;
    let end = after_db.find('`')?;
    Some(after_db[..end].to_string())
}

#[async_trait]
impl WarehouseSession for MemoryWarehouse {
    fn database(&self) -> &str {
        &self.database
    }

    async fn ping(&self) -> Result<(), WarehouseError> {
        self.state.lock().unwrap().pings += 1;
        if self.unreachable {
            return Err(WarehouseError::Response("connection refused".to_string()));
        }
        Ok(())
    }

    async fn command(&self, sql: &str) -> Result<(), WarehouseError> {
        let mut state = self.state.lock().unwrap();
        state.commands.push(sql.to_string());

        if let Some(table) = table_after(sql, "DROP TABLE IF EXISTS") {
            state.tables.remove(&table);
        } else if let Some(table) = table_after(sql, "CREATE TABLE") {
            if self.fail_create.contains(&table) {
                return Err(WarehouseError::Server {
                    status: 500,
                    message: format!("Code: 497. Not enough privileges to create {}", table),
                });
            }
            if state.tables.contains_key(&table) {
                return Err(WarehouseError::Server {
                    status: 500,
                    message: format!("Code: 57. Table {} already exists", table),
                });
            }
            state.tables.insert(table, Vec::new());
        }
        Ok(())
    }

    async fn insert_rows(&self, table: &str, rows: &[Row]) -> Result<(), WarehouseError> {
        if self.fail_insert.contains(table) {
            return Err(WarehouseError::Server {
                status: 500,
                message: "Code: 27. Cannot parse input".to_string(),
            });
        }

        let mut state = self.state.lock().unwrap();
        let stored = state
            .tables
            .get_mut(table)
            .ok_or_else(|| WarehouseError::Response(format!("no table {}", table)))?;
        let keep = if self.lossy.contains(table) {
            rows.len().saturating_sub(1)
        } else {
            rows.len()
        };
        stored.extend(rows[..keep].iter().cloned());
        Ok(())
    }

    async fn count_rows(&self, table: &str) -> Result<u64, WarehouseError> {
        let state = self.state.lock().unwrap();
        state
            .tables
            .get(table)
            .map(|rows| rows.len() as u64)
            .ok_or_else(|| WarehouseError::Response(format!("no table {}", table)))
    }

    async fn list_tables(&self) -> Result<Vec<String>, WarehouseError> {
        Ok(self.table_names())
    }
}
