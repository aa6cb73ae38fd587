//! Destination table schema and the projection of expanded records onto it.

use crate::core::extractors::{coerce_f64, coerce_i64, value_to_string};
use crate::domain::model::{CellValue, OrderRow, Record};
use crate::utils::error::{EtlError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ColumnType {
    Integer,
    Float,
    String,
    Timestamp,
    Boolean,
}

impl ColumnType {
    pub fn accepts(&self, cell: &CellValue) -> bool {
        matches!(
            (self, cell),
            (_, CellValue::Null)
                | (ColumnType::Integer, CellValue::Integer(_))
                | (ColumnType::Float, CellValue::Float(_))
                | (ColumnType::String, CellValue::String(_))
                | (ColumnType::Timestamp, CellValue::Timestamp(_))
                | (ColumnType::Boolean, CellValue::Boolean(_))
        )
    }

    /// Lenient conversion: values that do not fit the type become `Null`.
    pub fn coerce(&self, value: &Value) -> CellValue {
        if value.is_null() {
            return CellValue::Null;
        }
        let cell = match self {
            ColumnType::Integer => coerce_i64(value).map(CellValue::Integer),
            ColumnType::Float => coerce_f64(value).map(CellValue::Float),
            ColumnType::String => Some(CellValue::String(value_to_string(value))),
            ColumnType::Timestamp => value
                .as_str()
                .and_then(parse_timestamp)
                .map(CellValue::Timestamp),
            ColumnType::Boolean => value.as_bool().map(CellValue::Boolean),
        };
        cell.unwrap_or(CellValue::Null)
    }
}

/// RFC 3339 timestamps (with any offset) normalized to UTC.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text.trim())
        .ok()
        .map(|ts| ts.with_timezone(&Utc))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    /// Name in the destination table.
    pub name: &'static str,
    /// Name in the expanded record.
    pub source: &'static str,
    pub column_type: ColumnType,
}

const fn col(name: &'static str, column_type: ColumnType) -> ColumnSpec {
    ColumnSpec {
        name,
        source: name,
        column_type,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableSchema {
    pub columns: &'static [ColumnSpec],
}

pub const ID_COLUMN: &str = "_id_";
pub const CLOSED_AT_COLUMN: &str = "closed_at";

pub const ORDER_COLUMNS: &[ColumnSpec] = &[
    ColumnSpec {
        name: ID_COLUMN,
        source: "id",
        column_type: ColumnType::Integer,
    },
    col("created_at", ColumnType::Timestamp),
    col(CLOSED_AT_COLUMN, ColumnType::Timestamp),
    col("order_number", ColumnType::Integer),
    col("current_subtotal_price", ColumnType::Float),
    col("current_total_discounts", ColumnType::Float),
    col("current_total_price", ColumnType::Float),
    col("current_total_tax", ColumnType::Float),
    col("email", ColumnType::String),
    col("source_name", ColumnType::String),
    col("name", ColumnType::String),
    col("user_id", ColumnType::Float),
    col("subtotal_price", ColumnType::Float),
    col("total_price", ColumnType::Float),
    col("discount_code", ColumnType::String),
    col("discount_amount", ColumnType::Float),
    col("tags", ColumnType::String),
    col("shipping_amount", ColumnType::Float),
    col("shipping_address1", ColumnType::String),
    col("shipping_zip", ColumnType::String),
    col("shipping_country_code", ColumnType::String),
    col("quantity", ColumnType::Integer),
    col("price", ColumnType::Float),
    col("title", ColumnType::String),
    col("region", ColumnType::String),
    col("sizes", ColumnType::String),
    col("zip", ColumnType::Integer),
    col("buyer_accepts_marketing", ColumnType::Boolean),
];

pub const ORDER_SCHEMA: TableSchema = TableSchema {
    columns: ORDER_COLUMNS,
};

impl TableSchema {
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.columns.iter().map(|c| c.name).collect()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Keeps only the schema columns, in schema order, renaming `source` to
    /// `name`. A column absent from the record is a schema mismatch.
    pub fn project(&self, record: &Record) -> Result<OrderRow> {
        let values = self
            .columns
            .iter()
            .map(|spec| {
                record
                    .get(spec.source)
                    .map(|value| spec.column_type.coerce(value))
                    .ok_or_else(|| EtlError::SchemaMismatch {
                        column: spec.source.to_string(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(OrderRow { values })
    }

    pub fn validate_row(&self, row: &OrderRow) -> Result<()> {
        if row.values.len() != self.columns.len() {
            return Err(EtlError::ValidationError {
                message: format!(
                    "row has {} values, schema has {} columns",
                    row.values.len(),
                    self.columns.len()
                ),
            });
        }
        for (spec, cell) in self.columns.iter().zip(&row.values) {
            if !spec.column_type.accepts(cell) {
                return Err(EtlError::ValidationError {
                    message: format!(
                        "column '{}' expects {:?}, got {:?}",
                        spec.name, spec.column_type, cell
                    ),
                });
            }
        }
        Ok(())
    }

    pub fn validate_rows(&self, rows: &[OrderRow]) -> Result<()> {
        rows.iter().try_for_each(|row| self.validate_row(row))
    }
}
