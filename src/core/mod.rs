pub mod etl;
pub mod extractors;
pub mod line_items;
pub mod region;
pub mod schema;
pub mod transformer;

pub use crate::domain::model::{Record, TransformResult};
pub use crate::domain::ports::{OrderSource, Pipeline, Warehouse};
pub use crate::utils::error::Result;
