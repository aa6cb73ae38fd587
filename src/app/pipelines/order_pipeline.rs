use crate::core::transformer::OrderTransformer;
use crate::domain::model::{DomainConfig, RawOrder, TransformResult};
use crate::domain::ports::{OrderSource, Pipeline, Warehouse};
use crate::utils::error::Result;
use chrono::{DateTime, Utc};

/// Order pipeline for one product line: shop API → flat rows → warehouse table.
pub struct OrderPipeline<S: OrderSource, W: Warehouse> {
    pub(crate) source: S,
    pub(crate) warehouse: W,
    pub(crate) transformer: OrderTransformer,
}

impl<S: OrderSource, W: Warehouse> OrderPipeline<S, W> {
    pub fn new(source: S, warehouse: W) -> Self {
        Self::with_transformer(source, warehouse, OrderTransformer::default())
    }

    pub fn with_transformer(source: S, warehouse: W, transformer: OrderTransformer) -> Self {
        Self {
            source,
            warehouse,
            transformer,
        }
    }

    pub fn warehouse(&self) -> &W {
        &self.warehouse
    }
}

#[async_trait::async_trait]
impl<S: OrderSource, W: Warehouse> Pipeline for OrderPipeline<S, W> {
    async fn watermark(&self, domain: &DomainConfig) -> Result<Option<DateTime<Utc>>> {
        self.warehouse.max_closed_at(&domain.table_id).await
    }

    async fn extract(
        &self,
        domain: &DomainConfig,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawOrder>> {
        tracing::info!("🚀 Fetching orders for {} from {}", domain.name, domain.api_url);
        self.source.fetch_new_orders(domain, since).await
    }

    async fn transform(&self, orders: Vec<RawOrder>) -> Result<TransformResult> {
        let result = self.transformer.transform(orders)?;
        tracing::info!(
            "✅ Transformed {} orders into {} rows",
            result.order_count,
            result.rows.len()
        );
        Ok(result)
    }

    async fn load(&self, domain: &DomainConfig, result: TransformResult) -> Result<usize> {
        let loaded = self
            .warehouse
            .append(&domain.table_id, self.transformer.schema(), &result.rows)
            .await?;
        tracing::info!("📦 Loaded {} rows into {}", loaded, domain.table_id);
        Ok(loaded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::warehouse::CsvWarehouse;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct StaticSource {
        orders: Vec<RawOrder>,
        seen_since: Mutex<Vec<Option<DateTime<Utc>>>>,
    }

    #[async_trait]
    impl OrderSource for StaticSource {
        async fn fetch_new_orders(
            &self,
            _domain: &DomainConfig,
            since: Option<DateTime<Utc>>,
        ) -> Result<Vec<RawOrder>> {
            self.seen_since.lock().unwrap().push(since);
            Ok(self.orders.clone())
        }
    }

    fn domain() -> DomainConfig {
        DomainConfig {
            name: "foot".to_string(),
            table_id: "foot_orders".to_string(),
            api_url: "https://foot.example.com/admin/orders.json".to_string(),
            api_key: "k".to_string(),
            api_password: "p".to_string(),
        }
    }

    fn minimal_order() -> RawOrder {
        let value = json!({
            "id": 10, "created_at": "2024-05-01T09:00:00Z", "closed_at": "2024-05-02T09:00:00Z",
            "order_number": 1, "current_subtotal_price": "10.00", "current_total_discounts": "0.00",
            "current_total_price": "10.00", "current_total_tax": "1.67", "email": null,
            "source_name": "web", "subtotal_price": "10.00", "total_price": "10.00",
            "tags": "", "buyer_accepts_marketing": false, "discount_codes": [],
            "line_items": [{"quantity": 1, "price": "10.00", "title": "Ballon", "variant_title": "5"}]
        });
        match value {
            serde_json::Value::Object(obj) => obj,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_extract_transform_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let source = StaticSource {
            orders: vec![minimal_order()],
            seen_since: Mutex::new(Vec::new()),
        };
        let pipeline = OrderPipeline::new(source, CsvWarehouse::new(dir.path()));
        let domain = domain();

        assert_eq!(pipeline.watermark(&domain).await.unwrap(), None);
        let orders = pipeline.extract(&domain, None).await.unwrap();
        let result = pipeline.transform(orders).await.unwrap();
        assert_eq!(pipeline.load(&domain, result).await.unwrap(), 1);

        let watermark = pipeline.watermark(&domain).await.unwrap();
        assert_eq!(
            watermark.map(|ts| ts.to_rfc3339()),
            Some("2024-05-02T09:00:00+00:00".to_string())
        );
        assert_eq!(pipeline.source.seen_since.lock().unwrap().len(), 1);
        assert_eq!(pipeline.warehouse().read_table("foot_orders").unwrap().len(), 1);
    }
}
