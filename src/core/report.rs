use crate::core::aggregation::AggregationState;
use crate::core::schema::Schema;
use crate::domain::model::{TransformResult, TypedRecord};
use crate::utils::error::{EtlError, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Serialize)]
struct KeyCount<'a> {
    key: &'a str,
    count: usize,
}

#[derive(Debug, Serialize)]
struct RunReport<'a> {
    succeeded: usize,
    failed: usize,
    aborted: bool,
    filtered_lines: usize,
    counts: &'a AggregationState,
    most_common: Vec<KeyCount<'a>>,
    errors: Vec<String>,
}

pub const MOST_COMMON_LIMIT: usize = 10;

/// Summary, counts and the first reported errors as pretty JSON.
pub fn render_json(result: &TransformResult) -> Result<String> {
    let summary = &result.summary;
    let report = RunReport {
        succeeded: summary.succeeded,
        failed: summary.failed,
        aborted: summary.aborted,
        filtered_lines: result.filtered_lines,
        counts: &summary.aggregation,
        most_common: summary
            .aggregation
            .most_common(MOST_COMMON_LIMIT)
            .into_iter()
            .map(|(key, count)| KeyCount { key, count })
            .collect(),
        errors: result.errors.iter().map(|e| e.to_string()).collect(),
    };
    Ok(serde_json::to_string_pretty(&report)?)
}

/// `key,count` rows, header first, keys in sorted order.
pub fn render_counts(aggregation: &AggregationState, delimiter: u8) -> Result<Vec<u8>> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_writer(Vec::new());

    writer.write_record(["key", "count"])?;
    for (key, count) in aggregation.iter() {
        writer.write_record([key.as_str(), count.to_string().as_str()])?;
    }

    writer
        .into_inner()
        .map_err(|e| EtlError::IoError(e.into_error()))
}

/// Orders the `records` output by one field, optionally keeping only the first `limit`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordOrder {
    pub field: String,
    #[serde(default)]
    pub descending: bool,
    pub limit: Option<usize>,
}

impl RecordOrder {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
            limit: None,
        }
    }

    pub fn descending(mut self, descending: bool) -> Self {
        self.descending = descending;
        self
    }

    pub fn limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn validate_against(&self, schema: &Schema) -> Result<()> {
        if schema.position(&self.field).is_none() {
            return Err(EtlError::InvalidConfigValueError {
                field: "sort_records.field".to_string(),
                value: self.field.clone(),
                reason: format!(
                    "not a schema field (known: {})",
                    schema.names().collect::<Vec<_>>().join(", ")
                ),
            });
        }
        Ok(())
    }

    /// Stable sort; records without the field go last.
    pub fn apply<'r>(&self, records: &'r [TypedRecord]) -> Vec<&'r TypedRecord> {
        let mut sorted: Vec<&TypedRecord> = records.iter().collect();
        sorted.sort_by(|a, b| match (a.get(&self.field), b.get(&self.field)) {
            (Some(x), Some(y)) if self.descending => y.compare(x),
            (Some(x), Some(y)) => x.compare(y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        if let Some(limit) = self.limit {
            sorted.truncate(limit);
        }
        sorted
    }
}

/// One JSON object per accepted record.
pub fn render_records<'r, I>(records: I) -> Result<String>
where
    I: IntoIterator<Item = &'r TypedRecord>,
{
    let mut out = String::new();
    for record in records {
        out.push_str(&serde_json::to_string(record)?);
        out.push('\n');
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::processor::ProcessSummary;
    use crate::core::schema::Coercion;
    use crate::domain::model::Value;
    use crate::utils::error::RecordError;

    fn domain_result() -> TransformResult {
        let mut summary = ProcessSummary::default();
        for domain in ["gmail.com", "m.datasciencester.com", "m.datasciencester.com"] {
            summary.aggregation.increment(domain.to_string());
        }
        summary.succeeded = 3;
        summary.failed = 1;

        TransformResult {
            summary,
            filtered_lines: 2,
            errors: vec![RecordError::MalformedRecord {
                line_number: 4,
                line: "nobody".to_string(),
                expected: 1,
                found: 1,
                reason: "missing '@' in email address".to_string(),
            }],
            records: Vec::new(),
        }
    }

    #[test]
    fn test_render_json() {
        let json = render_json(&domain_result()).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed["succeeded"], 3);
        assert_eq!(parsed["filtered_lines"], 2);
        assert_eq!(parsed["counts"]["m.datasciencester.com"], 2);
        assert_eq!(parsed["most_common"][0]["key"], "m.datasciencester.com");
        assert!(parsed["errors"][0]
            .as_str()
            .unwrap()
            .contains("missing '@'"));
    }

    #[test]
    fn test_render_counts_tsv() {
        let bytes = render_counts(&domain_result().summary.aggregation, b'\t').unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            "key\tcount\ngmail.com\t1\nm.datasciencester.com\t2\n"
        );
    }

    #[test]
    fn test_render_records() {
        let record = TypedRecord::new(
            1,
            "x".to_string(),
            vec![("symbol".to_string(), Value::Str("FB".to_string()))],
        );
        assert_eq!(render_records(&[record]).unwrap(), "{\"symbol\":\"FB\"}\n");
    }

    fn repo(line_number: usize, pushed_at: &str, language: &str) -> TypedRecord {
        TypedRecord::new(
            line_number,
            String::new(),
            vec![
                (
                    "pushed_at".to_string(),
                    Value::DateTime(chrono::DateTime::parse_from_rfc3339(pushed_at).unwrap()),
                ),
                ("language".to_string(), Value::Str(language.to_string())),
            ],
        )
    }

    #[test]
    fn test_record_order_latest_first_with_limit() {
        let records = vec![
            repo(1, "2014-06-20T10:00:00Z", "Python"),
            repo(2, "2019-03-14T10:00:00Z", "Rust"),
            repo(3, "2017-01-05T10:00:00Z", "R"),
            repo(4, "2019-03-14T10:00:00Z", "Go"),
        ];

        let order = RecordOrder::new("pushed_at").descending(true).limit(Some(3));
        let languages: Vec<String> = order
            .apply(&records)
            .iter()
            .map(|r| r.get("language").unwrap().to_string())
            .collect();

        assert_eq!(languages, vec!["Rust", "Go", "R"]);

        let schema = Schema::builder()
            .field("pushed_at", Coercion::datetime())
            .field("language", Coercion::identity())
            .build();
        assert!(order.validate_against(&schema).is_ok());
        assert!(RecordOrder::new("stars").validate_against(&schema).is_err());
    }
}
