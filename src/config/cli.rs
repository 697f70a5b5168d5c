use crate::adapters::source::{HttpSource, LineSource};
use crate::core::key::KeySpec;
use crate::core::pipeline::OUTPUT_FORMATS;
use crate::core::presets::Preset;
use crate::core::processor::check_delimiter;
use crate::core::report::RecordOrder;
use crate::core::schema::Schema;
use crate::domain::model::ErrorPolicy;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{validate_one_of, validate_path, validate_url, Validate};
use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "record-etl")]
#[command(about = "Split, type-check and count delimited records")]
pub struct CliConfig {
    /// Input file; `-` reads standard input
    #[arg(default_value = "-")]
    pub input: String,

    /// Fetch the input from this URL instead of a file
    #[arg(long)]
    pub url: Option<String>,

    #[arg(long, value_enum, default_value = "stock")]
    pub preset: Preset,

    /// Override the preset delimiter (`\t` is accepted for tab)
    #[arg(long)]
    pub delimiter: Option<String>,

    /// Count records per value of this field
    #[arg(long)]
    pub group_by: Option<String>,

    #[arg(long, help = "Skip the first line")]
    pub has_header: bool,

    #[arg(long, help = "Honour double-quoted fields")]
    pub quoted: bool,

    /// Only process lines matching this regular expression
    #[arg(long)]
    pub grep: Option<String>,

    #[arg(long, help = "Process the lines that do NOT match --grep")]
    pub invert_match: bool,

    #[arg(long, value_enum, default_value = "skip")]
    pub on_error: ErrorPolicy,

    #[arg(long, default_value = "20")]
    pub max_errors: usize,

    #[arg(long, default_value = "./output")]
    pub output_path: String,

    #[arg(long, value_delimiter = ',', default_value = "json")]
    pub output_formats: Vec<String>,

    #[arg(long, default_value = "report")]
    pub report_name: String,

    /// Order the `records` output by this field
    #[arg(long)]
    pub sort_by: Option<String>,

    #[arg(long, requires = "sort_by", help = "Sort records largest first")]
    pub descending: bool,

    /// Keep only the first N sorted records
    #[arg(long, requires = "sort_by")]
    pub limit: Option<usize>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log memory use and throughput")]
    pub monitor: bool,
}

impl CliConfig {
    fn resolved_delimiter(&self) -> &str {
        match self.delimiter.as_deref() {
            Some("\\t") => "\t",
            Some(d) => d,
            None => self.preset.delimiter(),
        }
    }
}

impl ConfigProvider for CliConfig {
    fn source(&self) -> Result<LineSource> {
        Ok(match &self.url {
            Some(url) => LineSource::Http(HttpSource {
                url: url.clone(),
                timeout_seconds: None,
                json_fields: None,
                delimiter: self.resolved_delimiter().to_string(),
            }),
            None => LineSource::from_path(&self.input),
        })
    }

    fn schema(&self) -> Result<Schema> {
        Ok(self.preset.schema())
    }

    fn delimiter(&self) -> &str {
        self.resolved_delimiter()
    }

    fn has_header(&self) -> bool {
        self.has_header
    }

    fn quoted(&self) -> bool {
        self.quoted
    }

    fn key(&self) -> Option<KeySpec> {
        self.group_by
            .as_ref()
            .map(|field| KeySpec::new(field.as_str()))
            .or_else(|| self.preset.default_key())
    }

    fn line_filter(&self) -> Option<&str> {
        self.grep.as_deref()
    }

    fn invert_filter(&self) -> bool {
        self.invert_match
    }

    fn error_policy(&self) -> ErrorPolicy {
        self.on_error
    }

    fn max_reported_errors(&self) -> usize {
        self.max_errors
    }

    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn output_formats(&self) -> &[String] {
        &self.output_formats
    }

    fn record_order(&self) -> Option<RecordOrder> {
        self.sort_by.as_ref().map(|field| {
            RecordOrder::new(field.as_str())
                .descending(self.descending)
                .limit(self.limit)
        })
    }

    fn report_name(&self) -> &str {
        &self.report_name
    }
}

impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        match &self.url {
            Some(url) => validate_url("url", url)?,
            None => validate_path("input", &self.input)?,
        }
        check_delimiter(&self.preset.schema(), self.resolved_delimiter())?;
        validate_path("output_path", &self.output_path)?;
        for format in &self.output_formats {
            validate_one_of("output_formats", format, &OUTPUT_FORMATS)?;
        }
        if let Some(key) = self.key() {
            key.validate_against(&self.preset.schema())?;
        }
        if let Some(order) = self.record_order() {
            order.validate_against(&self.preset.schema())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CliConfig::parse_from(["record-etl", "prices.txt"]);
        assert_eq!(config.preset, Preset::Stock);
        assert_eq!(config.delimiter(), "\t");
        assert_eq!(config.error_policy(), ErrorPolicy::Skip);
        assert_eq!(config.output_formats().to_vec(), vec!["json".to_string()]);
        assert!(config.key().is_none());
        assert!(config.validate().is_ok());
        assert_eq!(
            config.source().unwrap(),
            LineSource::File("prices.txt".into())
        );
    }

    #[test]
    fn test_email_preset_with_grep() {
        let config = CliConfig::parse_from([
            "record-etl",
            "-",
            "--preset",
            "email",
            "--grep",
            "@",
            "--output-formats",
            "json,csv",
        ]);
        assert_eq!(config.source().unwrap(), LineSource::Stdin);
        assert_eq!(config.key(), Some(KeySpec::new("address")));
        assert_eq!(config.line_filter(), Some("@"));
        assert_eq!(config.output_formats().len(), 2);
    }

    #[test]
    fn test_escaped_tab_and_bad_group_by() {
        let config = CliConfig::parse_from([
            "record-etl",
            "prices.csv",
            "--delimiter",
            "\\t",
            "--group-by",
            "volume",
        ]);
        assert_eq!(config.delimiter(), "\t");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_email_preset_is_whole_line() {
        let config = CliConfig::parse_from(["record-etl", "emails.txt", "--preset", "email"]);
        assert!(config.validate().is_ok());

        let split = CliConfig::parse_from([
            "record-etl",
            "prices.txt",
            "--delimiter",
            "\n",
        ]);
        assert!(split.validate().is_err());
    }

    #[test]
    fn test_sort_by_closing_price() {
        let config = CliConfig::parse_from([
            "record-etl",
            "prices.txt",
            "--output-formats",
            "records",
            "--sort-by",
            "closing_price",
            "--descending",
            "--limit",
            "5",
        ]);
        assert!(config.validate().is_ok());
        assert_eq!(
            config.record_order(),
            Some(RecordOrder::new("closing_price").descending(true).limit(Some(5)))
        );

        let unknown = CliConfig::parse_from(["record-etl", "--sort-by", "volume"]);
        assert!(unknown.validate().is_err());
    }

    #[test]
    fn test_unknown_output_format() {
        let config = CliConfig::parse_from(["record-etl", "--output-formats", "xml"]);
        assert!(config.validate().is_err());
    }
}
