//! ClickHouse connection over the HTTP interface

use super::{qualified, quote_ident, Row, WarehouseSession};
use crate::config::{ConnectionConfig, RetryPolicy};
use crate::error::{IngestError, WarehouseError};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, warn};

pub struct ClickHouseClient {
    http: reqwest::Client,
    base_url: String,
    user: String,
    password: String,
    database: String,
}

impl ClickHouseClient {
    pub fn new(config: &ConnectionConfig) -> Result<Self, WarehouseError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url(),
            user: config.user.clone(),
            password: config.password.clone(),
            database: config.database.clone(),
        })
    }

    async fn send(
        &self,
        params: &[(&str, &str)],
        body: String,
    ) -> Result<String, WarehouseError> {
        let response = self
            .http
            .post(&self.base_url)
            .basic_auth(&self.user, Some(&self.password))
            .query(params)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(WarehouseError::Server {
                status: status.as_u16(),
                message: text.trim().to_string(),
            });
        }

        Ok(text)
    }

    async fn query_text(&self, sql: &str) -> Result<String, WarehouseError> {
        self.send(&[], sql.to_string()).await
    }
}

#[async_trait]
impl WarehouseSession for ClickHouseClient {
    fn database(&self) -> &str {
        &self.database
    }

    async fn ping(&self) -> Result<(), WarehouseError> {
        let out = self.query_text("SELECT 1").await?;
        if out.trim() == "1" {
            Ok(())
        } else {
            Err(WarehouseError::Response(format!("unexpected ping reply: {}", out.trim())))
        }
    }

    async fn command(&self, sql: &str) -> Result<(), WarehouseError> {
        self.query_text(sql).await.map(|_| ())
    }

    async fn insert_rows(&self, table: &str, rows: &[Row]) -> Result<(), WarehouseError> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut body = String::new();
        for row in rows {
            body.push_str(&serde_json::to_string(row)?);
            body.push('\n');
        }

        let query = format!(
            "INSERT INTO {} FORMAT JSONEachRow",
            qualified(&self.database, table)
        );
        self.send(&[("query", query.as_str())], body).await.map(|_| ())
    }

    async fn count_rows(&self, table: &str) -> Result<u64, WarehouseError> {
        let out = self
            .query_text(&format!("SELECT count() FROM {}", qualified(&self.database, table)))
            .await?;
        out.trim()
            .parse::<u64>()
            .map_err(|e| WarehouseError::Response(format!("bad count {:?}: {}", out.trim(), e)))
    }

    async fn list_tables(&self) -> Result<Vec<String>, WarehouseError> {
        let out = self
            .query_text(&format!(
                "SHOW TABLES FROM {} FORMAT TabSeparatedRaw",
                quote_ident(&self.database)
            ))
            .await?;
        Ok(out
            .lines()
            .filter(|l| !l.is_empty())
            .map(|l| l.to_string())
            .collect())
    }
}

/// Block until the destination answers, retrying with a fixed delay.
pub async fn wait_until_ready(
    session: &dyn WarehouseSession,
    retry: &RetryPolicy,
) -> Result<(), IngestError> {
    let mut last_error = String::from("no attempt made");

    for attempt in 1..=retry.max_attempts {
        match session.ping().await {
            Ok(()) => {
                info!(attempt, "ClickHouse is ready");
                return Ok(());
            }
            Err(e) => {
                warn!(attempt, max = retry.max_attempts, error = %e, "waiting for ClickHouse");
                last_error = e.to_string();
                if attempt < retry.max_attempts {
                    tokio::time::sleep(retry.delay).await;
                }
            }
        }
    }

    Err(IngestError::ConnectivityFailed {
        attempts: retry.max_attempts,
        last_error,
    })
}

/// Connectivity check plus `CREATE DATABASE IF NOT EXISTS`.
pub async fn bootstrap(
    session: &dyn WarehouseSession,
    retry: &RetryPolicy,
) -> Result<(), IngestError> {
    wait_until_ready(session, retry).await?;

    let database = session.database().to_string();
    session
        .command(&format!("CREATE DATABASE IF NOT EXISTS {}", quote_ident(&database)))
        .await
        .map_err(|e| IngestError::ConnectivityFailed {
            attempts: 1,
            last_error: format!("creating database {}: {}", database, e),
        })?;
    info!(database = %database, "database created/verified");

    Ok(())
}
