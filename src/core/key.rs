use crate::core::schema::Schema;
use crate::domain::model::TypedRecord;
use crate::utils::error::{EtlError, Result};
use chrono::Datelike;
use serde::{Deserialize, Serialize};

/// Which part of a field value becomes the aggregation key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPart {
    #[default]
    Value,
    Year,
    Month,
    Weekday,
}

/// Derives a grouping key from one field of a typed record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySpec {
    pub field: String,
    #[serde(default)]
    pub part: KeyPart,
}

impl KeySpec {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            part: KeyPart::Value,
        }
    }

    pub fn with_part(mut self, part: KeyPart) -> Self {
        self.part = part;
        self
    }

    pub fn validate_against(&self, schema: &Schema) -> Result<()> {
        if schema.position(&self.field).is_none() {
            return Err(EtlError::InvalidConfigValueError {
                field: "aggregate.field".to_string(),
                value: self.field.clone(),
                reason: format!(
                    "not a schema field (known: {})",
                    schema.names().collect::<Vec<_>>().join(", ")
                ),
            });
        }
        Ok(())
    }

    /// Date parts of a non-date value fall back to the value itself.
    pub fn derive(&self, record: &TypedRecord) -> String {
        let Some(value) = record.get(&self.field) else {
            return String::new();
        };

        match (self.part, value.as_date()) {
            (KeyPart::Year, Some(date)) => date.year().to_string(),
            (KeyPart::Month, Some(date)) => format!("{:02}", date.month()),
            (KeyPart::Weekday, Some(date)) => date.weekday().to_string(),
            _ => value.to_string(),
        }
    }
}
