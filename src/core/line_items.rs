use crate::domain::model::Record;
use serde_json::Value;

pub const LINE_ITEMS_FIELD: &str = "line_items";
pub const VARIANT_TITLE_FIELD: &str = "variant_title";
/// Size source placeholder for orders without items or items without a variant.
pub const UNKNOWN_VARIANT: &str = "Unknown";

const ITEM_FIELDS: [&str; 3] = ["quantity", "price", "title"];

/// One output row per (order, line item). Orders whose `line_items` is
/// missing, null or empty still produce exactly one row with null item fields.
/// Item fields overwrite same-named order fields; every other order field is
/// copied as-is. Order and item sequence are preserved.
pub fn expand_line_items(orders: Vec<Record>) -> Vec<Record> {
    let mut rows = Vec::with_capacity(orders.len());

    for order in orders {
        let items: Vec<Value> = match order.get(LINE_ITEMS_FIELD) {
            Some(Value::Array(items)) => items.clone(),
            _ => Vec::new(),
        };

        if items.is_empty() {
            let mut row = order;
            for field in ITEM_FIELDS {
                row.set(field, Value::Null);
            }
            row.set(VARIANT_TITLE_FIELD, Value::String(UNKNOWN_VARIANT.to_string()));
            rows.push(row);
            continue;
        }

        for item in &items {
            let mut row = order.clone();
            for field in ITEM_FIELDS {
                row.set(field, item.get(field).cloned().unwrap_or(Value::Null));
            }
            // 欄位存在但為 null 時保留 null，只有缺欄位才補 Unknown
            let variant = item
                .get(VARIANT_TITLE_FIELD)
                .cloned()
                .unwrap_or_else(|| Value::String(UNKNOWN_VARIANT.to_string()));
            row.set(VARIANT_TITLE_FIELD, variant);
            rows.push(row);
        }
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn order(value: Value) -> Record {
        match value {
            Value::Object(obj) => Record::from(obj),
            _ => panic!("test order must be an object"),
        }
    }

    #[test]
    fn test_two_items_yield_two_rows_sharing_order_fields() {
        let orders = vec![order(json!({
            "id": 1,
            "email": "a@example.com",
            "line_items": [
                {"quantity": 1, "price": "50.00", "title": "Maillot", "variant_title": "M"},
                {"quantity": 2, "price": "10.00", "title": "Chaussettes", "variant_title": "L"}
            ]
        }))];

        let rows = expand_line_items(orders);

        assert_eq!(rows.len(), 2);
        for row in &rows {
            assert_eq!(row.get("id"), Some(&json!(1)));
            assert_eq!(row.get("email"), Some(&json!("a@example.com")));
        }
        assert_eq!(rows[0].get("title"), Some(&json!("Maillot")));
        assert_eq!(rows[1].get("title"), Some(&json!("Chaussettes")));
        assert_eq!(rows[1].get("quantity"), Some(&json!(2)));
    }

    #[test]
    fn test_empty_or_missing_items_yield_one_null_row() {
        let orders = vec![
            order(json!({"id": 1, "line_items": []})),
            order(json!({"id": 2, "line_items": null})),
            order(json!({"id": 3})),
        ];

        let rows = expand_line_items(orders);

        assert_eq!(rows.len(), 3);
        for row in &rows {
            assert_eq!(row.get("quantity"), Some(&Value::Null));
            assert_eq!(row.get("price"), Some(&Value::Null));
            assert_eq!(row.get("title"), Some(&Value::Null));
            assert_eq!(row.get("variant_title"), Some(&json!("Unknown")));
        }
        let ids: Vec<_> = rows.iter().map(|r| r.get("id").cloned()).collect();
        assert_eq!(ids, vec![Some(json!(1)), Some(json!(2)), Some(json!(3))]);
    }

    #[test]
    fn test_missing_variant_defaults_to_unknown_but_null_is_kept() {
        let orders = vec![order(json!({
            "id": 7,
            "line_items": [
                {"quantity": 1, "price": "5.00", "title": "Gourde"},
                {"quantity": 1, "price": "5.00", "title": "Gourde", "variant_title": null}
            ]
        }))];

        let rows = expand_line_items(orders);

        assert_eq!(rows[0].get("variant_title"), Some(&json!("Unknown")));
        assert_eq!(rows[1].get("variant_title"), Some(&Value::Null));
    }

    #[test]
    fn test_row_order_is_stable() {
        let orders = vec![
            order(json!({"id": 1, "line_items": [{"title": "a"}, {"title": "b"}]})),
            order(json!({"id": 2, "line_items": [{"title": "c"}]})),
        ];

        let titles: Vec<_> = expand_line_items(orders)
            .iter()
            .map(|r| r.get("title").cloned().unwrap_or(Value::Null))
            .collect();

        assert_eq!(titles, vec![json!("a"), json!("b"), json!("c")]);
    }
}
