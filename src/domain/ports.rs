use crate::core::schema::TableSchema;
use crate::domain::model::{DomainConfig, OrderRow, RawOrder, TransformResult};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Paginated, authenticated access to a domain's order API.
#[async_trait]
pub trait OrderSource: Send + Sync {
    async fn fetch_new_orders(
        &self,
        domain: &DomainConfig,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawOrder>>;
}

/// Append-only analytical store.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// `MAX(closed_at)` of the table, `None` when the table is empty or absent.
    async fn max_closed_at(&self, table_id: &str) -> Result<Option<DateTime<Utc>>>;

    /// Appends every row or none of them. Returns the number of rows committed.
    async fn append(&self, table_id: &str, schema: &TableSchema, rows: &[OrderRow])
        -> Result<usize>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn watermark(&self, domain: &DomainConfig) -> Result<Option<DateTime<Utc>>>;
    async fn extract(
        &self,
        domain: &DomainConfig,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<RawOrder>>;
    async fn transform(&self, orders: Vec<RawOrder>) -> Result<TransformResult>;
    async fn load(&self, domain: &DomainConfig, result: TransformResult) -> Result<usize>;
}
