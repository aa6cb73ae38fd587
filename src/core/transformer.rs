use crate::core::extractors::{
    extract_field, extract_joined, extract_size, sanitize_title, sum_amounts, value_to_string,
    SizeTable,
};
use crate::core::line_items::{expand_line_items, VARIANT_TITLE_FIELD};
use crate::core::region::region_for;
use crate::core::schema::{parse_timestamp, TableSchema, ORDER_SCHEMA};
use crate::domain::model::{RawOrder, Record, TransformResult};
use crate::utils::error::Result;
use chrono::SecondsFormat;
use serde_json::Value;

const TIMESTAMP_FIELDS: [&str; 2] = ["created_at", "closed_at"];
const FRANCE: &str = "FR";

/// Flattens raw orders into rows of the destination schema.
#[derive(Debug, Clone)]
pub struct OrderTransformer {
    schema: TableSchema,
    sizes: SizeTable,
}

impl Default for OrderTransformer {
    fn default() -> Self {
        Self::new(ORDER_SCHEMA, SizeTable::predefined().clone())
    }
}

impl OrderTransformer {
    pub fn new(schema: TableSchema, sizes: SizeTable) -> Self {
        Self { schema, sizes }
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn transform(&self, orders: Vec<RawOrder>) -> Result<TransformResult> {
        let order_count = orders.len();
        tracing::debug!("🔧 Transforming {} orders", order_count);

        let orders: Vec<Record> = orders
            .into_iter()
            .map(Record::from)
            .map(normalize_timestamps)
            .collect();

        let expanded = expand_line_items(orders);
        tracing::debug!("📦 Expanded into {} line-item rows", expanded.len());

        let rows = expanded
            .into_iter()
            .map(|record| {
                let record = self.derive_fields(record)?;
                self.schema.project(&record)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(TransformResult { rows, order_count })
    }

    fn derive_fields(&self, mut row: Record) -> Result<Record> {
        let field = |row: &Record, key: &str| row.get(key).cloned().unwrap_or(Value::Null);

        let variant = field(&row, VARIANT_TITLE_FIELD);
        let sizes = extract_size(&variant, &self.sizes)
            .map(|s| Value::String(s.to_string()))
            .unwrap_or(Value::Null);
        row.set("sizes", sizes);

        let discount_codes = field(&row, "discount_codes");
        row.set("discount_amount", Value::from(sum_amounts(&discount_codes)?));
        row.set("discount_code", extract_joined(&discount_codes, "code", ", "));

        let shipping_price = field(&row, "total_shipping_price_set");
        let shop_money = extract_field(&shipping_price, "shop_money");
        row.set("shipping_amount", extract_field(&shop_money, "amount"));

        let address = field(&row, "shipping_address");
        let zip = match extract_field(&address, "zip") {
            Value::Null => Value::Null,
            other => Value::String(value_to_string(&other)),
        };
        let country_code = extract_field(&address, "country_code");
        row.set("shipping_address1", extract_field(&address, "address1"));

        // 只有法國地址才推導省區與 département 代碼
        let department = match (&zip, country_code.as_str()) {
            (Value::String(zip), Some(FRANCE)) => Some(zip.chars().take(2).collect::<String>()),
            _ => None,
        };
        let region = department
            .as_deref()
            .and_then(region_for)
            .map(|r| Value::String(r.to_string()))
            .unwrap_or(Value::Null);
        let zip_code = department
            .as_deref()
            .and_then(|d| d.parse::<i64>().ok())
            .unwrap_or(0);

        row.set("shipping_zip", zip);
        row.set("shipping_country_code", country_code);
        row.set("region", region);
        row.set("zip", Value::from(zip_code));

        if let Some(Value::String(title)) = row.get("title") {
            let clean = sanitize_title(title);
            row.set("title", Value::String(clean));
        }

        let billing = field(&row, "billing_address");
        row.set("name", extract_field(&billing, "name"));
        let customer = field(&row, "customer");
        row.set("user_id", extract_field(&customer, "id"));

        Ok(row)
    }
}

/// Rewrites `created_at`/`closed_at` as UTC RFC 3339, or null when unparseable.
fn normalize_timestamps(mut order: Record) -> Record {
    for key in TIMESTAMP_FIELDS {
        let Some(value) = order.get(key) else {
            continue;
        };
        let normalized = value
            .as_str()
            .and_then(parse_timestamp)
            .map(|ts| Value::String(ts.to_rfc3339_opts(SecondsFormat::Secs, true)))
            .unwrap_or(Value::Null);
        order.set(key, normalized);
    }
    order
}
