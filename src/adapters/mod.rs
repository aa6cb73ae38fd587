// Adapters layer: concrete implementations of the domain ports (shop API, warehouses).

pub mod http;
pub mod warehouse;

pub use http::{FetchOptions, RetryPolicy, ShopifyClient};
pub use warehouse::{BigQueryConfig, BigQueryWarehouse, CsvWarehouse};
