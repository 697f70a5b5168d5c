use crate::domain::model::Value;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{validate_non_empty_string, Validate};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";

/// Why a raw field value was rejected by its coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum CoercionFailure {
    /// The value does not convert to the declared type.
    Invalid(String),
    /// A delimiter the field must contain is absent; reported as a malformed record.
    MissingDelimiter(String),
}

type CoercionFn = dyn Fn(&str) -> std::result::Result<Value, CoercionFailure> + Send + Sync;

/// A named conversion from a raw field to a [`Value`].
#[derive(Clone)]
pub struct Coercion {
    label: String,
    func: Arc<CoercionFn>,
}

impl Coercion {
    pub fn new<F>(label: impl Into<String>, func: F) -> Self
    where
        F: Fn(&str) -> std::result::Result<Value, CoercionFailure> + Send + Sync + 'static,
    {
        Self {
            label: label.into(),
            func: Arc::new(func),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn apply(&self, raw: &str) -> std::result::Result<Value, CoercionFailure> {
        (self.func)(raw)
    }

    pub fn identity() -> Self {
        Self::new("string", |raw| Ok(Value::Str(raw.to_string())))
    }

    pub fn lowercase() -> Self {
        Self::new("lowercase", |raw| Ok(Value::Str(raw.to_lowercase())))
    }

    pub fn trimmed() -> Self {
        Self::new("trimmed", |raw| Ok(Value::Str(raw.trim().to_string())))
    }

    pub fn integer() -> Self {
        Self::new("integer", |raw| {
            raw.trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|e| CoercionFailure::Invalid(format!("not an integer: {}", e)))
        })
    }

    pub fn float() -> Self {
        Self::new("float", |raw| parse_float(raw).map(Value::Float))
    }

    /// Rejects zero, negatives and NaN.
    pub fn positive_float() -> Self {
        Self::new("positive_float", |raw| {
            let value = parse_float(raw)?;
            if value > 0.0 {
                Ok(Value::Float(value))
            } else {
                Err(CoercionFailure::Invalid(format!(
                    "must be greater than 0, got {}",
                    value
                )))
            }
        })
    }

    pub fn boolean() -> Self {
        Self::new("boolean", |raw| {
            match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "yes" | "y" | "1" => Ok(Value::Bool(true)),
                "false" | "no" | "n" | "0" => Ok(Value::Bool(false)),
                other => Err(CoercionFailure::Invalid(format!(
                    "not a boolean: {:?}",
                    other
                ))),
            }
        })
    }

    /// Calendar date in a chrono `strftime` format.
    pub fn date(format: impl Into<String>) -> Self {
        let format = format.into();
        Self::new(format!("date({})", format), move |raw| {
            NaiveDate::parse_from_str(raw.trim(), &format)
                .map(Value::Date)
                .map_err(|e| CoercionFailure::Invalid(format!("not a date in {}: {}", format, e)))
        })
    }

    /// RFC 3339 timestamp, e.g. `2014-06-20T16:00:00Z`.
    pub fn datetime() -> Self {
        Self::new("datetime", |raw| {
            DateTime::parse_from_rfc3339(raw.trim())
                .map(Value::DateTime)
                .map_err(|e| CoercionFailure::Invalid(format!("not an RFC 3339 timestamp: {}", e)))
        })
    }

    /// Lowercases an address and keeps what follows the last `@`.
    pub fn email_domain() -> Self {
        Self::new("email_domain", |raw| {
            let address = raw.trim().to_lowercase();
            match address.rsplit_once('@') {
                Some((_, domain)) => Ok(Value::Str(domain.to_string())),
                None => Err(CoercionFailure::MissingDelimiter(
                    "missing '@' in email address".to_string(),
                )),
            }
        })
    }
}

fn parse_float(raw: &str) -> std::result::Result<f64, CoercionFailure> {
    raw.trim()
        .parse::<f64>()
        .map_err(|e| CoercionFailure::Invalid(format!("not a number: {}", e)))
}

impl fmt::Debug for Coercion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Coercion").field(&self.label).finish()
    }
}

/// Coercions that can be named in a configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Lowercase,
    Trimmed,
    Integer,
    Float,
    PositiveFloat,
    Boolean,
    Date,
    Datetime,
    EmailDomain,
}

impl FieldType {
    pub fn coercion(self, format: Option<&str>) -> Coercion {
        match self {
            FieldType::String => Coercion::identity(),
            FieldType::Lowercase => Coercion::lowercase(),
            FieldType::Trimmed => Coercion::trimmed(),
            FieldType::Integer => Coercion::integer(),
            FieldType::Float => Coercion::float(),
            FieldType::PositiveFloat => Coercion::positive_float(),
            FieldType::Boolean => Coercion::boolean(),
            FieldType::Date => Coercion::date(format.unwrap_or(DEFAULT_DATE_FORMAT)),
            FieldType::Datetime => Coercion::datetime(),
            FieldType::EmailDomain => Coercion::email_domain(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldSpec {
    name: String,
    coercion: Coercion,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, coercion: Coercion) -> Self {
        Self {
            name: name.into(),
            coercion,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn coercion(&self) -> &Coercion {
        &self.coercion
    }
}

/// Ordered field names and coercions describing one record format.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    fields: Vec<FieldSpec>,
}

impl Schema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::default()
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }
}

impl Validate for Schema {
    fn validate(&self) -> Result<()> {
        if self.fields.is_empty() {
            return Err(EtlError::ConfigValidationError {
                field: "schema.fields".to_string(),
                message: "schema must declare at least one field".to_string(),
            });
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            validate_non_empty_string("schema.fields.name", &field.name)?;
            if !seen.insert(field.name.as_str()) {
                return Err(EtlError::InvalidConfigValueError {
                    field: "schema.fields.name".to_string(),
                    value: field.name.clone(),
                    reason: "duplicate field name".to_string(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct SchemaBuilder {
    fields: Vec<FieldSpec>,
}

impl SchemaBuilder {
    pub fn field(mut self, name: impl Into<String>, coercion: Coercion) -> Self {
        self.fields.push(FieldSpec::new(name, coercion));
        self
    }

    pub fn build(self) -> Schema {
        Schema::new(self.fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positive_float() {
        let c = Coercion::positive_float();
        assert_eq!(c.apply("90.91"), Ok(Value::Float(90.91)));
        assert_eq!(c.apply(" 41.68 "), Ok(Value::Float(41.68)));
        assert!(matches!(c.apply("0"), Err(CoercionFailure::Invalid(_))));
        assert!(matches!(c.apply("-3.5"), Err(CoercionFailure::Invalid(_))));
        assert!(matches!(c.apply("NaN"), Err(CoercionFailure::Invalid(_))));
        assert!(matches!(c.apply("abc"), Err(CoercionFailure::Invalid(_))));
    }

    #[test]
    fn test_email_domain() {
        let c = Coercion::email_domain();
        assert_eq!(
            c.apply("joelgrus@gmail.com"),
            Ok(Value::Str("gmail.com".to_string()))
        );
        assert_eq!(
            c.apply("Joel@M.DataSciencester.com"),
            Ok(Value::Str("m.datasciencester.com".to_string()))
        );
        assert_eq!(
            c.apply("odd@name@example.org"),
            Ok(Value::Str("example.org".to_string()))
        );
        assert!(matches!(
            c.apply("not-an-address"),
            Err(CoercionFailure::MissingDelimiter(_))
        ));
    }

    #[test]
    fn test_date_and_datetime() {
        let us = Coercion::date("%m/%d/%Y");
        assert_eq!(
            us.apply("6/20/2014"),
            Ok(Value::Date(NaiveDate::from_ymd_opt(2014, 6, 20).unwrap()))
        );
        assert!(us.apply("2014-06-20").is_err());

        let ts = Coercion::datetime().apply("2014-06-20T16:00:00Z").unwrap();
        assert_eq!(ts.as_date(), NaiveDate::from_ymd_opt(2014, 6, 20));
    }

    #[test]
    fn test_boolean_and_integer() {
        assert_eq!(Coercion::boolean().apply("Yes"), Ok(Value::Bool(true)));
        assert_eq!(Coercion::boolean().apply("0"), Ok(Value::Bool(false)));
        assert!(Coercion::boolean().apply("maybe").is_err());
        assert_eq!(Coercion::integer().apply("2019"), Ok(Value::Int(2019)));
        assert!(Coercion::integer().apply("20.19").is_err());
    }

    #[test]
    fn test_schema_validation() {
        let schema = Schema::builder()
            .field("date", Coercion::identity())
            .field("symbol", Coercion::identity())
            .build();
        assert!(schema.validate().is_ok());
        assert_eq!(schema.position("symbol"), Some(1));

        let duplicated = Schema::builder()
            .field("symbol", Coercion::identity())
            .field("symbol", Coercion::lowercase())
            .build();
        assert!(duplicated.validate().is_err());

        assert!(Schema::default().validate().is_err());
    }

    #[test]
    fn test_field_type_deserializes_snake_case() {
        #[derive(Deserialize)]
        struct Wrapper {
            r#type: FieldType,
        }
        let parsed: Wrapper = toml::from_str(r#"type = "positive_float""#).unwrap();
        assert_eq!(parsed.r#type, FieldType::PositiveFloat);
        assert_eq!(parsed.r#type.coercion(None).label(), "positive_float");
    }
}
