pub mod aggregation;
pub mod etl;
pub mod key;
pub mod pipeline;
pub mod presets;
pub mod processor;
pub mod report;
pub mod schema;

pub use crate::domain::model::{TransformResult, TypedRecord, Value};
pub use crate::domain::ports::{ConfigProvider, LineStream, Pipeline, Storage};
pub use crate::utils::error::Result;
