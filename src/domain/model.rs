use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// 從 API 取回的原始訂單 JSON 物件
pub type RawOrder = serde_json::Map<String, serde_json::Value>;

/// 展開後的單列資料：一筆訂單合併一個 line item
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub data: HashMap<String, serde_json::Value>,
}

impl Record {
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    pub fn set(&mut self, key: &str, value: serde_json::Value) {
        self.data.insert(key.to_string(), value);
    }
}

impl From<RawOrder> for Record {
    fn from(order: RawOrder) -> Self {
        Self {
            data: order.into_iter().collect(),
        }
    }
}

/// One typed warehouse cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Null,
    Integer(i64),
    Float(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    Boolean(bool),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Float(f) => Some(*f),
            CellValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// 寫入 CSV 時使用的文字表示，NULL 為空字串
    pub fn to_csv_field(&self) -> String {
        match self {
            CellValue::Null => String::new(),
            CellValue::Integer(i) => i.to_string(),
            CellValue::Float(f) => f.to_string(),
            CellValue::String(s) => s.clone(),
            CellValue::Timestamp(ts) => ts.to_rfc3339_opts(SecondsFormat::Secs, true),
            CellValue::Boolean(b) => b.to_string(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CellValue::Null => serde_json::Value::Null,
            CellValue::Integer(i) => serde_json::Value::from(*i),
            CellValue::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            CellValue::String(s) => serde_json::Value::String(s.clone()),
            CellValue::Timestamp(ts) => {
                serde_json::Value::String(ts.to_rfc3339_opts(SecondsFormat::Secs, true))
            }
            CellValue::Boolean(b) => serde_json::Value::Bool(*b),
        }
    }
}

/// A transformed row. `values` follow the destination schema's column order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderRow {
    pub values: Vec<CellValue>,
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub rows: Vec<OrderRow>,
    pub order_count: usize,
}

impl TransformResult {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One product line: its API credentials and its destination table.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainConfig {
    pub name: String,
    pub table_id: String,
    pub api_url: String,
    pub api_key: String,
    pub api_password: String,
}

impl fmt::Debug for DomainConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainConfig")
            .field("name", &self.name)
            .field("table_id", &self.table_id)
            .field("api_url", &self.api_url)
            .field("api_key", &"***")
            .field("api_password", &"***")
            .finish()
    }
}

/// Outcome of one domain's run, reported by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainRunSummary {
    pub domain: String,
    pub watermark: Option<DateTime<Utc>>,
    pub orders_fetched: usize,
    pub rows_loaded: usize,
    pub skipped: bool,
}
