pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliArgs;
pub use config::{EtlConfig, WarehouseKind};

pub use adapters::{BigQueryConfig, BigQueryWarehouse, CsvWarehouse, FetchOptions, ShopifyClient};
pub use app::pipelines::OrderPipeline;
pub use core::{etl::EtlEngine, transformer::OrderTransformer};
pub use domain::model::{DomainConfig, DomainRunSummary};
pub use utils::error::{EtlError, Result};
