//! Bulk Loader - Inserts a file's rows into its provisioned table and checks the count

use crate::db::{Row, WarehouseSession};
use crate::error::{IngestError, Result};
use crate::ingestion::csv_connector::CsvGrid;
use crate::ingestion::schema_inference::{
    is_missing, parse_bool, parse_float, parse_timestamp, FieldType, TableSpec,
};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use tracing::{debug, info, warn};

/// Destination count differs from the number of rows sent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationMismatch {
    pub expected: u64,
    pub actual: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadReport {
    pub rows_loaded: u64,
    pub verification: Option<VerificationMismatch>,
}

/// Convert one cell to its JSON representation for `field_type`.
///
/// Missing cells (blank or a marker such as `NULL`) are `null` for every
/// type. A typed cell that no longer parses (the classifier saw every value,
/// so this only happens for hand-built specs) is sent as a string and left to
/// the server to reject.
pub fn cell_value(field_type: FieldType, raw: &str) -> Value {
    if is_missing(raw) {
        return Value::Null;
    }
    let value = raw.trim();

    let typed = match field_type {
        FieldType::Integer32 | FieldType::Integer64 => {
            value.parse::<i64>().ok().map(|n| Value::Number(n.into()))
        }
        FieldType::Float64 => parse_float(value).and_then(Number::from_f64).map(Value::Number),
        FieldType::Boolean => parse_bool(value).map(Value::Bool),
        FieldType::Timestamp => parse_timestamp(value)
            .map(|ts| Value::String(ts.format("%Y-%m-%d %H:%M:%S%.3f").to_string())),
        FieldType::Text => return Value::String(raw.to_string()),
    };

    typed.unwrap_or_else(|| Value::String(raw.to_string()))
}

/// Build the insert payload for every row of the grid.
pub fn build_rows(spec: &TableSpec, grid: &CsvGrid) -> Vec<Row> {
    grid.rows
        .iter()
        .map(|cells| {
            spec.fields
                .iter()
                .zip(cells.iter())
                .map(|(field, cell)| (field.name.clone(), cell_value(field.field_type, cell)))
                .collect()
        })
        .collect()
}

pub struct BulkLoader {
    batch_size: usize,
}

impl BulkLoader {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }

    /// Insert all rows, then compare the destination count with what was sent.
    ///
    /// A failed batch aborts the load; rows from earlier batches stay in the
    /// table.
    pub async fn load(
        &self,
        session: &dyn WarehouseSession,
        spec: &TableSpec,
        grid: &CsvGrid,
    ) -> Result<LoadReport> {
        let rows = build_rows(spec, grid);
        let mut inserted: u64 = 0;

        info!(table = %spec.table_name, rows = rows.len(), "importing rows");
        for batch in rows.chunks(self.batch_size) {
            session
                .insert_rows(&spec.table_name, batch)
                .await
                .map_err(|source| IngestError::LoadFailed {
                    table: spec.table_name.clone(),
                    inserted,
                    source,
                })?;
            inserted += batch.len() as u64;
            debug!(table = %spec.table_name, inserted, "batch inserted");
        }

        let actual = session
            .count_rows(&spec.table_name)
            .await
            .map_err(|source| IngestError::LoadFailed {
                table: spec.table_name.clone(),
                inserted,
                source,
            })?;

        let verification = if actual != inserted {
            warn!(
                table = %spec.table_name,
                expected = inserted,
                actual,
                "row count mismatch after load"
            );
            Some(VerificationMismatch {
                expected: inserted,
                actual,
            })
        } else {
            info!(table = %spec.table_name, rows = actual, "imported rows successfully");
            None
        };

        Ok(LoadReport {
            rows_loaded: inserted,
            verification,
        })
    }
}

impl Default for BulkLoader {
    fn default() -> Self {
        Self::new(10_000)
    }
}
