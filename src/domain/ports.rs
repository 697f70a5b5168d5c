use crate::adapters::source::LineSource;
use crate::core::key::KeySpec;
use crate::core::report::RecordOrder;
use crate::core::schema::Schema;
use crate::domain::model::{ErrorPolicy, TransformResult};
use crate::utils::error::Result;
use async_trait::async_trait;

/// Lazily read lines; the underlying handle is released when the stream is dropped.
pub type LineStream = Box<dyn Iterator<Item = std::io::Result<String>> + Send>;

pub trait Storage: Send + Sync {
    fn read_file(&self, path: &str) -> impl std::future::Future<Output = Result<Vec<u8>>> + Send;
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn source(&self) -> Result<LineSource>;
    fn schema(&self) -> Result<Schema>;
    fn delimiter(&self) -> &str;
    fn has_header(&self) -> bool;
    fn quoted(&self) -> bool;
    fn key(&self) -> Option<KeySpec>;
    fn line_filter(&self) -> Option<&str>;
    fn invert_filter(&self) -> bool;
    fn error_policy(&self) -> ErrorPolicy;
    fn max_reported_errors(&self) -> usize;
    fn output_path(&self) -> &str;
    fn output_formats(&self) -> &[String];
    fn record_order(&self) -> Option<RecordOrder>;
    fn report_name(&self) -> &str;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<LineStream>;
    async fn transform(&self, lines: LineStream) -> Result<TransformResult>;
    async fn load(&self, result: TransformResult) -> Result<String>;
}
