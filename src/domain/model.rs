use crate::core::processor::ProcessSummary;
use crate::utils::error::RecordError;
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// A field value after schema coercion.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Integers widen to floats.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            Value::Date(d) => Some(*d),
            Value::DateTime(dt) => Some(dt.date_naive()),
            _ => None,
        }
    }

    /// Numbers compare numerically and dates chronologically; values of
    /// different kinds fall back to their text form.
    pub fn compare(&self, other: &Value) -> Ordering {
        if let (Some(a), Some(b)) = (self.as_f64(), other.as_f64()) {
            return a.total_cmp(&b);
        }
        match (self, other) {
            (Value::Str(a), Value::Str(b)) => a.cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::DateTime(a), Value::DateTime(b)) => a.cmp(b),
            (Value::Date(a), Value::Date(b)) => a.cmp(b),
            _ => self.to_string().cmp(&other.to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(v) => write!(f, "{}", v),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Date(d) => write!(f, "{}", d),
            Value::DateTime(dt) => write!(f, "{}", dt.to_rfc3339()),
        }
    }
}

/// One input line after every field was coerced, in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct TypedRecord {
    line_number: usize,
    line: String,
    fields: Vec<(String, Value)>,
}

impl TypedRecord {
    pub fn new(line_number: usize, line: String, fields: Vec<(String, Value)>) -> Self {
        Self {
            line_number,
            line,
            fields,
        }
    }

    /// 1-based position of the line in the sequence handed to the processor.
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    pub fn line(&self) -> &str {
        &self.line
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Builds a `FieldCoercion` error for this record, for callbacks that
    /// reject a value after coercion succeeded.
    pub fn field_error(&self, name: &str, reason: impl Into<String>) -> RecordError {
        let position = self
            .fields
            .iter()
            .position(|(field, _)| field == name)
            .unwrap_or(self.fields.len());
        let raw = self.get(name).map(|v| v.to_string()).unwrap_or_default();

        RecordError::FieldCoercion {
            line_number: self.line_number,
            field: name.to_string(),
            position,
            raw,
            reason: reason.into(),
        }
    }
}

impl Serialize for TypedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// What the caller loop does with a failed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    #[default]
    Skip,
    Abort,
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub summary: ProcessSummary,
    pub filtered_lines: usize,
    pub errors: Vec<RecordError>,
    pub records: Vec<TypedRecord>,
}

#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub output_path: String,
    pub summary: ProcessSummary,
    pub filtered_lines: usize,
}
