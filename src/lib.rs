pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use crate::config::CliConfig;
pub use crate::config::TomlConfig;

pub use crate::adapters::{source::LineSource, storage::LocalStorage};
pub use crate::core::{
    aggregation::AggregationState,
    etl::EtlEngine,
    key::{KeyPart, KeySpec},
    pipeline::RecordPipeline,
    presets::Preset,
    processor::{Flow, ProcessSummary, ProcessorState, RecordStreamProcessor, NO_KEY},
    schema::{Coercion, CoercionFailure, FieldType, Schema},
};
pub use crate::domain::model::{ErrorPolicy, TypedRecord, Value};
pub use crate::utils::error::{EtlError, RecordError, Result};
