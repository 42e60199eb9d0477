//! Table Builder - Drops and recreates destination tables from inferred schemas

use crate::db::{qualified, quote_ident, WarehouseSession};
use crate::error::{IngestError, Result};
use crate::ingestion::schema_inference::{FieldSpec, TableSpec};
use itertools::Itertools;
use tracing::info;

/// Table Builder - Turns a [`TableSpec`] into a fresh, empty MergeTree table.
pub struct TableBuilder {
    pub engine: String,
    pub order_by: String,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self {
            engine: "MergeTree()".to_string(),
            order_by: "tuple()".to_string(),
        }
    }

    pub fn drop_statement(&self, database: &str, spec: &TableSpec) -> String {
        format!("DROP TABLE IF EXISTS {}", qualified(database, &spec.table_name))
    }

    pub fn create_statement(&self, database: &str, spec: &TableSpec) -> String {
        let columns = spec.fields.iter().map(column_definition).join(",\n    ");
        format!(
            "CREATE TABLE {}\n(\n    {}\n)\nENGINE = {}\nORDER BY {}",
            qualified(database, &spec.table_name),
            columns,
            self.engine,
            self.order_by
        )
    }

    /// Drop-if-exists then create. Safe to repeat; always leaves an empty table.
    pub async fn provision(&self, session: &dyn WarehouseSession, spec: &TableSpec) -> Result<()> {
        let database = session.database();

        for statement in [
            self.drop_statement(database, spec),
            self.create_statement(database, spec),
        ] {
            session
                .command(&statement)
                .await
                .map_err(|source| IngestError::ProvisioningFailed {
                    table: spec.table_name.clone(),
                    source,
                })?;
        }

        info!(table = %spec.table_name, columns = spec.fields.len(), "table created");
        Ok(())
    }
}

impl Default for TableBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn column_definition(field: &FieldSpec) -> String {
    let ty = field.field_type.clickhouse_type();
    if field.nullable {
        format!("{} Nullable({})", quote_ident(&field.name), ty)
    } else {
        format!("{} {}", quote_ident(&field.name), ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::schema_inference::FieldType;

    fn spec() -> TableSpec {
        TableSpec {
            table_name: "Region_A_v2".to_string(),
            fields: vec![
                FieldSpec {
                    name: "id".to_string(),
                    field_type: FieldType::Integer32,
                    nullable: true,
                },
                FieldSpec {
                    name: "seen_at".to_string(),
                    field_type: FieldType::Timestamp,
                    nullable: true,
                },
            ],
        }
    }

    #[test]
    fn test_drop_statement() {
        assert_eq!(
            TableBuilder::new().drop_statement("bronze", &spec()),
            "DROP TABLE IF EXISTS `bronze`.`Region_A_v2`"
        );
    }

    #[test]
    fn test_create_statement() {
        let sql = TableBuilder::new().create_statement("bronze", &spec());
        assert_eq!(
            sql,
            "CREATE TABLE `bronze`.`Region_A_v2`\n(\n    `id` Nullable(Int32),\n    `seen_at` Nullable(DateTime64(3, 'UTC'))\n)\nENGINE = MergeTree()\nORDER BY tuple()"
        );
    }
}
