//! Delimited-record stream processing.
//!
//! A [`RecordStreamProcessor`] pulls lines from any iterator, splits them on a
//! delimiter, coerces the fields through a [`Schema`] and hands each
//! [`TypedRecord`] to a callback. Errors are reported per line; whether a bad
//! line stops the run is decided by the caller's error hook.

use crate::core::aggregation::AggregationState;
use crate::core::schema::{CoercionFailure, Schema};
use crate::domain::model::TypedRecord;
use crate::utils::error::{EtlError, RecordError, Result};
use crate::utils::validation::{validate_delimiter, Validate};
use serde::Serialize;
use std::borrow::Cow;

/// Delimiter for single-field schemas: the whole line is the field.
pub const WHOLE_LINE: &str = "\n";

/// Passed as `key_fn` when no aggregation is wanted.
pub const NO_KEY: Option<fn(&TypedRecord) -> String> = None;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorState {
    Idle,
    Processing,
    Done,
}

/// Returned by the error hook after each failed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Abort,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProcessSummary<K: Ord = String> {
    pub aggregation: AggregationState<K>,
    pub succeeded: usize,
    pub failed: usize,
    pub aborted: bool,
}

impl<K: Ord> ProcessSummary<K> {
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}

impl<K: Ord> Default for ProcessSummary<K> {
    fn default() -> Self {
        Self {
            aggregation: AggregationState::new(),
            succeeded: 0,
            failed: 0,
            aborted: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordStreamProcessor {
    schema: Schema,
    delimiter: String,
    has_header: bool,
    quoted: bool,
    state: ProcessorState,
}

impl RecordStreamProcessor {
    pub fn new(schema: Schema, delimiter: impl Into<String>) -> Result<Self> {
        let delimiter = delimiter.into();
        schema.validate()?;
        check_delimiter(&schema, &delimiter)?;

        Ok(Self {
            schema,
            delimiter,
            has_header: false,
            quoted: false,
            state: ProcessorState::Idle,
        })
    }

    /// The first line of every run is a header: it is skipped and not counted,
    /// but still numbered as line 1.
    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    /// Honour double-quoted fields. Needs a single-byte delimiter.
    pub fn quoted(mut self) -> Result<Self> {
        if self.delimiter.len() != 1 || self.delimiter == WHOLE_LINE {
            return Err(EtlError::InvalidConfigValueError {
                field: "delimiter".to_string(),
                value: self.delimiter.clone(),
                reason: "quoted fields require a single-byte delimiter".to_string(),
            });
        }
        self.quoted = true;
        Ok(self)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    pub fn state(&self) -> ProcessorState {
        self.state
    }

    /// Turns one raw line into a typed record.
    pub fn parse_line(
        &self,
        line_number: usize,
        raw: &str,
    ) -> std::result::Result<TypedRecord, RecordError> {
        let line = strip_terminator(raw);
        let expected = self.schema.len();

        let fields = self
            .split(line)
            .map_err(|reason| RecordError::MalformedRecord {
                line_number,
                line: line.to_string(),
                expected,
                found: 0,
                reason,
            })?;

        if fields.len() != expected {
            return Err(RecordError::MalformedRecord {
                line_number,
                line: line.to_string(),
                expected,
                found: fields.len(),
                reason: format!("expected {} fields, found {}", expected, fields.len()),
            });
        }

        let mut values = Vec::with_capacity(expected);
        for (position, (spec, raw_value)) in self.schema.fields().iter().zip(&fields).enumerate() {
            match spec.coercion().apply(raw_value) {
                Ok(value) => values.push((spec.name().to_string(), value)),
                Err(CoercionFailure::Invalid(reason)) => {
                    return Err(RecordError::FieldCoercion {
                        line_number,
                        field: spec.name().to_string(),
                        position,
                        raw: raw_value.to_string(),
                        reason,
                    })
                }
                Err(CoercionFailure::MissingDelimiter(reason)) => {
                    return Err(RecordError::MalformedRecord {
                        line_number,
                        line: line.to_string(),
                        expected,
                        found: fields.len(),
                        reason,
                    })
                }
            }
        }

        Ok(TypedRecord::new(line_number, line.to_string(), values))
    }

    /// Lazily parses `lines`, one result per line (header excluded).
    pub fn records<I>(&self, lines: I) -> Records<'_, I::IntoIter>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        Records {
            processor: self,
            lines: lines.into_iter(),
            line_number: 0,
            header_pending: self.has_header,
        }
    }

    /// Processes every line and keeps going past failed records.
    pub fn process<I, F, G, K>(
        &mut self,
        lines: I,
        on_record: F,
        key_fn: Option<G>,
    ) -> ProcessSummary<K>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        F: FnMut(&TypedRecord) -> std::result::Result<(), RecordError>,
        G: Fn(&TypedRecord) -> K,
        K: Ord,
    {
        self.process_with(lines, on_record, key_fn, |_| Flow::Continue)
    }

    /// Like [`process`](Self::process), but `on_error` sees every failed line
    /// and may stop the run.
    pub fn process_with<I, F, G, K, E>(
        &mut self,
        lines: I,
        mut on_record: F,
        key_fn: Option<G>,
        mut on_error: E,
    ) -> ProcessSummary<K>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
        F: FnMut(&TypedRecord) -> std::result::Result<(), RecordError>,
        G: Fn(&TypedRecord) -> K,
        K: Ord,
        E: FnMut(&RecordError) -> Flow,
    {
        self.transition(ProcessorState::Processing);
        let mut summary = ProcessSummary::default();

        for result in self.records(lines) {
            let outcome = result.and_then(|record| on_record(&record).map(|_| record));

            match outcome {
                Ok(record) => {
                    summary.succeeded += 1;
                    if let Some(key_fn) = &key_fn {
                        summary.aggregation.increment(key_fn(&record));
                    }
                }
                Err(err) => {
                    summary.failed += 1;
                    tracing::debug!("Rejected line {}: {}", err.line_number(), err);
                    if on_error(&err) == Flow::Abort {
                        summary.aborted = true;
                        break;
                    }
                }
            }
        }

        self.transition(ProcessorState::Done);
        tracing::info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            keys = summary.aggregation.len(),
            aborted = summary.aborted,
            "Record stream processed"
        );
        summary
    }

    fn transition(&mut self, next: ProcessorState) {
        tracing::debug!("Processor state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn split<'l>(&self, line: &'l str) -> std::result::Result<Vec<Cow<'l, str>>, String> {
        if self.delimiter == WHOLE_LINE {
            return Ok(vec![Cow::Borrowed(line)]);
        }
        if !self.quoted {
            return Ok(line.split(self.delimiter.as_str()).map(Cow::Borrowed).collect());
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter.as_bytes()[0])
            .from_reader(line.as_bytes());
        let mut record = csv::StringRecord::new();

        match reader.read_record(&mut record) {
            Ok(true) => Ok(record.iter().map(|f| Cow::Owned(f.to_string())).collect()),
            // csv 會跳過空行，照一般規則視為單一空欄位
            Ok(false) => Ok(vec![Cow::Borrowed("")]),
            Err(e) => Err(format!("unparseable quoted record: {}", e)),
        }
    }
}

/// Accepts any usable delimiter for `schema`; [`WHOLE_LINE`] only when the
/// schema has exactly one field.
pub fn check_delimiter(schema: &Schema, delimiter: &str) -> Result<()> {
    if delimiter != WHOLE_LINE {
        return validate_delimiter("delimiter", delimiter);
    }
    if schema.len() != 1 {
        return Err(EtlError::InvalidConfigValueError {
            field: "delimiter".to_string(),
            value: delimiter.escape_default().to_string(),
            reason: format!(
                "whole-line splitting needs a single-field schema, got {} fields",
                schema.len()
            ),
        });
    }
    Ok(())
}

fn strip_terminator(line: &str) -> &str {
    let line = line.strip_suffix('\n').unwrap_or(line);
    line.strip_suffix('\r').unwrap_or(line)
}

/// Iterator returned by [`RecordStreamProcessor::records`].
pub struct Records<'p, I> {
    processor: &'p RecordStreamProcessor,
    lines: I,
    line_number: usize,
    header_pending: bool,
}

impl<I> Iterator for Records<'_, I>
where
    I: Iterator,
    I::Item: AsRef<str>,
{
    type Item = std::result::Result<TypedRecord, RecordError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.header_pending {
            self.header_pending = false;
            self.lines.next()?;
            self.line_number += 1;
        }

        let line = self.lines.next()?;
        self.line_number += 1;
        Some(self.processor.parse_line(self.line_number, line.as_ref()))
    }
}
