pub mod bigquery;
pub mod local;

pub use bigquery::{BigQueryConfig, BigQueryWarehouse};
pub use local::CsvWarehouse;
