use crate::adapters::filter::LineFilter;
use crate::adapters::source::ReadLines;
use crate::core::processor::{Flow, RecordStreamProcessor};
use crate::core::report;
use crate::domain::model::{ErrorPolicy, TransformResult, TypedRecord};
use crate::domain::ports::{ConfigProvider, LineStream, Pipeline, Storage};
use crate::utils::error::{EtlError, RecordError, Result};

pub const OUTPUT_FORMATS: [&str; 4] = ["json", "csv", "tsv", "records"];

/// Reads lines from the configured source, runs them through the record
/// processor and writes the requested reports.
pub struct RecordPipeline<S: Storage, C: ConfigProvider> {
    pub(crate) storage: S,
    pub(crate) config: C,
}

impl<S: Storage, C: ConfigProvider> RecordPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        Self { storage, config }
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    fn build_processor(&self) -> Result<RecordStreamProcessor> {
        let processor = RecordStreamProcessor::new(self.config.schema()?, self.config.delimiter())?
            .with_header(self.config.has_header());

        if self.config.quoted() {
            processor.quoted()
        } else {
            Ok(processor)
        }
    }

    fn keeps_records(&self) -> bool {
        self.config.output_formats().iter().any(|f| f == "records")
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for RecordPipeline<S, C> {
    async fn extract(&self) -> Result<LineStream> {
        let source = self.config.source()?;
        tracing::info!("📥 Reading from {}", source.describe());
        source.open().await
    }

    async fn transform(&self, lines: LineStream) -> Result<TransformResult> {
        let mut processor = self.build_processor()?;

        let key = self.config.key();
        if let Some(key) = &key {
            key.validate_against(processor.schema())?;
        }
        let key_fn = key.as_ref().map(|key| move |record: &TypedRecord| key.derive(record));
        if let Some(order) = self.config.record_order() {
            order.validate_against(processor.schema())?;
        }

        let filter = match self.config.line_filter() {
            Some(pattern) => Some(LineFilter::new(pattern)?.inverted(self.config.invert_filter())),
            None => None,
        };

        let policy = self.config.error_policy();
        let max_errors = self.config.max_reported_errors();
        let keep_records = self.keeps_records();

        let mut errors: Vec<RecordError> = Vec::new();
        let mut abort_error: Option<RecordError> = None;
        let mut records = Vec::new();

        let on_record = |record: &TypedRecord| -> std::result::Result<(), RecordError> {
            if keep_records {
                records.push(record.clone());
            }
            Ok(())
        };
        let on_error = |err: &RecordError| {
            if errors.len() < max_errors {
                errors.push(err.clone());
            }
            match policy {
                ErrorPolicy::Skip => Flow::Continue,
                ErrorPolicy::Abort => {
                    abort_error = Some(err.clone());
                    Flow::Abort
                }
            }
        };

        let mut lines = ReadLines::new(lines);
        let (summary, filtered_lines) = match &filter {
            Some(filter) => {
                let mut filtered = filter.apply(&mut lines).with_header(self.config.has_header());
                let summary = processor.process_with(&mut filtered, on_record, key_fn, on_error);
                (summary, filtered.dropped())
            }
            None => (
                processor.process_with(&mut lines, on_record, key_fn, on_error),
                0,
            ),
        };

        if let Some(err) = lines.take_error() {
            return Err(EtlError::IoError(err));
        }
        if let Some(err) = abort_error {
            return Err(EtlError::RecordError(err));
        }

        if summary.failed > 0 {
            tracing::warn!(
                "⚠️ {} of {} records rejected",
                summary.failed,
                summary.total()
            );
        }

        Ok(TransformResult {
            summary,
            filtered_lines,
            errors,
            records,
        })
    }

    async fn load(&self, result: TransformResult) -> Result<String> {
        let name = self.config.report_name();

        for format in self.config.output_formats() {
            let (file_name, data) = match format.as_str() {
                "json" => (format!("{}.json", name), report::render_json(&result)?.into_bytes()),
                "csv" => (
                    format!("{}_counts.csv", name),
                    report::render_counts(&result.summary.aggregation, b',')?,
                ),
                "tsv" => (
                    format!("{}_counts.tsv", name),
                    report::render_counts(&result.summary.aggregation, b'\t')?,
                ),
                "records" => {
                    let rendered = match self.config.record_order() {
                        Some(order) => report::render_records(order.apply(&result.records))?,
                        None => report::render_records(&result.records)?,
                    };
                    (format!("{}_records.jsonl", name), rendered.into_bytes())
                }
                other => {
                    return Err(EtlError::InvalidConfigValueError {
                        field: "output_formats".to_string(),
                        value: other.to_string(),
                        reason: format!("Valid formats: {}", OUTPUT_FORMATS.join(", ")),
                    })
                }
            };

            tracing::debug!("Writing {} ({} bytes) to storage", file_name, data.len());
            self.storage.write_file(&file_name, &data).await?;
        }

        Ok(self.config.output_path().to_string())
    }
}
