//! Built-in record formats: tab-delimited stock prices and one-address-per-line email lists.

use crate::core::key::KeySpec;
use crate::core::processor::{RecordStreamProcessor, WHOLE_LINE};
use crate::core::schema::{Coercion, Schema};
use crate::domain::model::TypedRecord;
use crate::utils::error::Result;
use serde::{Deserialize, Serialize};

pub const STOCK_DELIMITER: &str = "\t";
// 整行就是一個欄位
pub const EMAIL_DELIMITER: &str = WHOLE_LINE;

/// `date`, `symbol`, `closing_price`; the price must be a positive number.
pub fn stock_price_schema() -> Schema {
    Schema::builder()
        .field("date", Coercion::identity())
        .field("symbol", Coercion::identity())
        .field("closing_price", Coercion::positive_float())
        .build()
}

/// A single `address` field coerced to its lowercased domain.
pub fn email_schema() -> Schema {
    Schema::builder()
        .field("address", Coercion::email_domain())
        .build()
}

pub fn email_domain_key(record: &TypedRecord) -> String {
    record
        .get("address")
        .map(|domain| domain.to_string())
        .unwrap_or_default()
}

pub fn stock_processor() -> Result<RecordStreamProcessor> {
    RecordStreamProcessor::new(stock_price_schema(), STOCK_DELIMITER)
}

pub fn email_processor() -> Result<RecordStreamProcessor> {
    RecordStreamProcessor::new(email_schema(), EMAIL_DELIMITER)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    Stock,
    Email,
}

impl Preset {
    pub fn schema(self) -> Schema {
        match self {
            Preset::Stock => stock_price_schema(),
            Preset::Email => email_schema(),
        }
    }

    pub fn delimiter(self) -> &'static str {
        match self {
            Preset::Stock => STOCK_DELIMITER,
            Preset::Email => EMAIL_DELIMITER,
        }
    }

    /// Email lists are counted per domain; stock prices are not grouped.
    pub fn default_key(self) -> Option<KeySpec> {
        match self {
            Preset::Stock => None,
            Preset::Email => Some(KeySpec::new("address")),
        }
    }
}
