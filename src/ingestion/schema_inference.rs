//! Schema Inference - Deterministic column typing from parsed CSV rows
//!
//! Every value of every column is inspected; there is no sampling cut-off.

use crate::error::{IngestError, Result};
use crate::ingestion::csv_connector::CsvGrid;
use crate::ingestion::naming::sanitize_header;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic column type, narrowest first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Integer32,
    Integer64,
    Float64,
    Boolean,
    Timestamp,
    Text,
}

impl FieldType {
    /// ClickHouse type name (without the Nullable wrapper).
    pub fn clickhouse_type(&self) -> &'static str {
        match self {
            FieldType::Integer32 => "Int32",
            FieldType::Integer64 => "Int64",
            FieldType::Float64 => "Float64",
            FieldType::Boolean => "Bool",
            FieldType::Timestamp => "DateTime64(3, 'UTC')",
            FieldType::Text => "String",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    pub nullable: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    pub table_name: String,
    pub fields: Vec<FieldSpec>,
}

impl TableSpec {
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Markers that stand for a missing value in CSV exports. Matched exactly,
/// after trimming.
pub const MISSING_MARKERS: &[&str] = &[
    "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// True for blank cells and the usual missing-value markers.
pub fn is_missing(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || MISSING_MARKERS.contains(&value)
}

/// Parse a date or date-time literal. Offset-bearing values are converted to UTC.
pub fn parse_timestamp(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_utc());
    }

    for fmt in TIMESTAMP_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Some(dt);
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(value, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }

    None
}

/// Parse a boolean literal (`true` / `false`, any case).
pub fn parse_bool(value: &str) -> Option<bool> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("true") {
        Some(true)
    } else if value.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

/// Parse a finite decimal number.
pub fn parse_float(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|f| f.is_finite())
}

/// Classify one column from its raw values.
///
/// Missing values (see [`is_missing`]) are ignored. A column with no present
/// value is Text.
pub fn classify_column<'a, I>(values: I) -> FieldType
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = false;
    let mut all_i32 = true;
    let mut all_i64 = true;
    let mut all_f64 = true;
    let mut all_bool = true;
    let mut all_ts = true;

    for raw in values {
        if is_missing(raw) {
            continue;
        }
        let value = raw.trim();
        seen = true;

        if all_i64 {
            match value.parse::<i64>() {
                Ok(n) => all_i32 = all_i32 && i32::try_from(n).is_ok(),
                Err(_) => {
                    all_i64 = false;
                    all_i32 = false;
                }
            }
        }
        if all_f64 && !all_i64 {
            all_f64 = parse_float(value).is_some();
        }
        if all_bool {
            all_bool = parse_bool(value).is_some();
        }
        if all_ts {
            all_ts = parse_timestamp(value).is_some();
        }

        if !all_f64 && !all_bool && !all_ts {
            return FieldType::Text;
        }
    }

    if !seen {
        FieldType::Text
    } else if all_i32 {
        FieldType::Integer32
    } else if all_i64 {
        FieldType::Integer64
    } else if all_f64 {
        FieldType::Float64
    } else if all_bool {
        FieldType::Boolean
    } else if all_ts {
        FieldType::Timestamp
    } else {
        FieldType::Text
    }
}

/// Schema Inference Engine
pub struct SchemaInference;

impl SchemaInference {
    pub fn new() -> Self {
        Self
    }

    pub fn infer_schema(&self, table_name: &str, grid: &CsvGrid) -> Result<TableSpec> {
        if grid.column_count() == 0 {
            return Err(IngestError::SchemaInferenceFailed(format!(
                "{}: no columns",
                table_name
            )));
        }
        if grid.row_count() == 0 {
            return Err(IngestError::SchemaInferenceFailed(format!(
                "{}: no data rows",
                table_name
            )));
        }

        let names = sanitize_header(grid.headers.iter().map(|h| h.as_str()));
        let fields = names
            .into_iter()
            .enumerate()
            .map(|(idx, name)| FieldSpec {
                name,
                field_type: classify_column(grid.column(idx)),
                nullable: true,
            })
            .collect();

        Ok(TableSpec {
            table_name: table_name.to_string(),
            fields,
        })
    }
}

impl Default for SchemaInference {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingestion::csv_connector::CsvConnector;

    #[test]
    fn test_integer32_with_empty_value() {
        assert_eq!(classify_column(["1", "2", ""]), FieldType::Integer32);
        assert_eq!(classify_column(["-2147483648", "2147483647"]), FieldType::Integer32);
    }

    #[test]
    fn test_integer64_when_out_of_i32_range() {
        assert_eq!(classify_column(["1", "2147483648"]), FieldType::Integer64);
        assert_eq!(classify_column(["-9223372036854775808"]), FieldType::Integer64);
    }

    #[test]
    fn test_float_and_overflow() {
        assert_eq!(classify_column(["1", "2.5"]), FieldType::Float64);
        assert_eq!(classify_column(["1e3", "-0.25"]), FieldType::Float64);
        // Beyond i64 still parses as a number.
        assert_eq!(classify_column(["92233720368547758070"]), FieldType::Float64);
        assert_eq!(classify_column(["NaN", "1.0"]), FieldType::Float64);
        assert_eq!(classify_column(["inf", "1.0"]), FieldType::Text);
    }

    #[test]
    fn test_missing_markers() {
        for marker in ["", "  ", "NULL", "null", "NA", "N/A", "n/a", "NaN", "nan", "#N/A", "None", " NULL "] {
            assert!(is_missing(marker), "{:?} should be missing", marker);
        }
        for value in ["0", "none", "Null", "NULLABLE", "-", "na"] {
            assert!(!is_missing(value), "{:?} should be present", value);
        }
    }

    #[test]
    fn test_missing_markers_do_not_widen_columns() {
        assert_eq!(classify_column(["1", "NULL", "3"]), FieldType::Integer32);
        assert_eq!(classify_column(["1.5", "NA"]), FieldType::Float64);
        assert_eq!(classify_column(["true", "#N/A"]), FieldType::Boolean);
        assert_eq!(classify_column(["NULL", "None"]), FieldType::Text);
    }

    #[test]
    fn test_boolean() {
        assert_eq!(classify_column(["true", "false", "true"]), FieldType::Boolean);
        assert_eq!(classify_column(["TRUE", "", "False"]), FieldType::Boolean);
        assert_eq!(classify_column(["true", "0"]), FieldType::Text);
    }

    #[test]
    fn test_timestamp() {
        assert_eq!(
            classify_column(["2024-01-31", "2024-02-01 10:15:00", "2024-03-01T00:00:00Z"]),
            FieldType::Timestamp
        );
        assert_eq!(classify_column(["01/31/2024", "12/01/2023 08:30"]), FieldType::Timestamp);
        assert_eq!(classify_column(["2024-01-31", "soon"]), FieldType::Text);
    }

    #[test]
    fn test_empty_and_text_columns() {
        assert_eq!(classify_column(["", " "]), FieldType::Text);
        assert_eq!(classify_column(Vec::<&str>::new()), FieldType::Text);
        assert_eq!(classify_column(["1", "x"]), FieldType::Text);
    }

    #[test]
    fn test_parse_timestamp_converts_offsets_to_utc() {
        let ts = parse_timestamp("2024-01-01T02:00:00+02:00").unwrap();
        assert_eq!(ts.to_string(), "2024-01-01 00:00:00");
    }

    #[test]
    fn test_infer_schema_preserves_header_order() {
        let grid = CsvConnector::new(
            "t",
            "Order ID,Order Date,Amount (USD),Active,Note\n1,2024-01-01,9.5,true,x\n2,2024-01-02,10,false,\n",
        )
        .parse()
        .unwrap();

        let spec = SchemaInference::new().infer_schema("Orders", &grid).unwrap();
        assert_eq!(spec.table_name, "Orders");
        assert_eq!(
            spec.column_names().collect::<Vec<_>>(),
            vec!["Order_ID", "Order_Date", "Amount_USD", "Active", "Note"]
        );
        let types: Vec<FieldType> = spec.fields.iter().map(|f| f.field_type).collect();
        assert_eq!(
            types,
            vec![
                FieldType::Integer32,
                FieldType::Timestamp,
                FieldType::Float64,
                FieldType::Boolean,
                FieldType::Text,
            ]
        );
        assert!(spec.fields.iter().all(|f| f.nullable));
    }

    #[test]
    fn test_infer_schema_is_deterministic() {
        let text = "a,b\n1,x\n2,y\n";
        let grid = CsvConnector::new("t", text).parse().unwrap();
        let first = SchemaInference::new().infer_schema("t", &grid).unwrap();
        let second = SchemaInference::new().infer_schema("t", &grid).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_no_data_rows_fails() {
        let grid = CsvConnector::new("t", "a,b\n").parse().unwrap();
        let err = SchemaInference::new().infer_schema("t", &grid).unwrap_err();
        assert!(matches!(err, IngestError::SchemaInferenceFailed(_)));
    }
}
