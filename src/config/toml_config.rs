use crate::adapters::source::{HttpSource, LineSource};
use crate::core::key::KeySpec;
use crate::core::pipeline::OUTPUT_FORMATS;
use crate::core::presets::Preset;
use crate::core::processor::{check_delimiter, WHOLE_LINE};
use crate::core::report::RecordOrder;
use crate::core::schema::{FieldSpec, FieldType, Schema};
use crate::domain::model::ErrorPolicy;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{validate_one_of, validate_path, validate_url, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

const DEFAULT_DELIMITER: &str = ",";
const DEFAULT_MAX_REPORTED_ERRORS: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub pipeline: PipelineConfig,
    pub source: SourceConfig,
    pub schema: SchemaConfig,
    pub filter: Option<FilterConfig>,
    pub aggregate: Option<KeySpec>,
    pub error_handling: Option<ErrorHandlingConfig>,
    pub load: LoadConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    pub description: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceConfig {
    File {
        path: String,
    },
    Stdin,
    Memory {
        text: String,
    },
    Http {
        endpoint: String,
        timeout_seconds: Option<u64>,
        json_fields: Option<Vec<String>>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaConfig {
    pub preset: Option<Preset>,
    pub delimiter: Option<String>,
    pub has_header: Option<bool>,
    pub quoted: Option<bool>,
    pub fields: Option<Vec<FieldConfig>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    pub r#type: FieldType,
    /// chrono format for `date` fields
    pub format: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterConfig {
    pub pattern: String,
    pub invert: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorHandlingConfig {
    pub on_record_error: Option<ErrorPolicy>,
    pub max_reported_errors: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    pub output_path: String,
    pub output_formats: Vec<String>,
    pub report_name: Option<String>,
    pub sort_records: Option<RecordOrder>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub log_format: Option<String>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${INPUT_DIR})，未設定的保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = Regex::new(r"\$\{([^}]+)\}")?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        match &self.source {
            SourceConfig::File { path } => validate_path("source.path", path)?,
            SourceConfig::Http { endpoint, .. } => validate_url("source.endpoint", endpoint)?,
            SourceConfig::Stdin | SourceConfig::Memory { .. } => {}
        }

        if self.schema.preset.is_some() && self.schema.fields.is_some() {
            return Err(EtlError::ConfigValidationError {
                field: "schema".to_string(),
                message: "use either `preset` or `fields`, not both".to_string(),
            });
        }
        let schema = self.build_schema()?;
        schema.validate()?;

        check_delimiter(&schema, self.delimiter())?;
        if self.quoted() && (self.delimiter().len() != 1 || self.delimiter() == WHOLE_LINE) {
            return Err(EtlError::InvalidConfigValueError {
                field: "schema.delimiter".to_string(),
                value: self.delimiter().to_string(),
                reason: "quoted fields require a single-byte delimiter".to_string(),
            });
        }

        if let Some(key) = self.key() {
            key.validate_against(&schema)?;
        }

        if let Some(order) = &self.load.sort_records {
            order.validate_against(&schema)?;
        }

        if let Some(filter) = &self.filter {
            Regex::new(&filter.pattern)?;
        }

        validate_path("load.output_path", &self.load.output_path)?;
        for format in &self.load.output_formats {
            validate_one_of("load.output_formats", format, &OUTPUT_FORMATS)?;
        }

        Ok(())
    }

    fn build_schema(&self) -> Result<Schema> {
        if let Some(preset) = self.schema.preset {
            return Ok(preset.schema());
        }

        let fields = self
            .schema
            .fields
            .as_ref()
            .ok_or_else(|| EtlError::MissingConfigError {
                field: "schema.fields".to_string(),
            })?;

        Ok(Schema::new(
            fields
                .iter()
                .map(|f| FieldSpec::new(f.name.clone(), f.r#type.coercion(f.format.as_deref())))
                .collect(),
        ))
    }

    /// 取得監控設定
    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    pub fn json_logs(&self) -> bool {
        self.monitoring
            .as_ref()
            .and_then(|m| m.log_format.as_deref())
            == Some("json")
    }
}

impl ConfigProvider for TomlConfig {
    fn source(&self) -> Result<LineSource> {
        Ok(match &self.source {
            SourceConfig::File { path } => LineSource::File(PathBuf::from(path)),
            SourceConfig::Stdin => LineSource::Stdin,
            SourceConfig::Memory { text } => LineSource::Memory(text.clone()),
            SourceConfig::Http {
                endpoint,
                timeout_seconds,
                json_fields,
            } => LineSource::Http(HttpSource {
                url: endpoint.clone(),
                timeout_seconds: *timeout_seconds,
                json_fields: json_fields.clone(),
                delimiter: self.delimiter().to_string(),
            }),
        })
    }

    fn schema(&self) -> Result<Schema> {
        self.build_schema()
    }

    fn delimiter(&self) -> &str {
        match (&self.schema.delimiter, self.schema.preset) {
            (Some(delimiter), _) => delimiter.as_str(),
            (None, Some(preset)) => preset.delimiter(),
            (None, None) => DEFAULT_DELIMITER,
        }
    }

    fn has_header(&self) -> bool {
        self.schema.has_header.unwrap_or(false)
    }

    /// JSON sources are rendered as CSV rows, so they default to quoted parsing.
    fn quoted(&self) -> bool {
        self.schema.quoted.unwrap_or_else(|| {
            let delimiter = self.delimiter();
            matches!(
                self.source,
                SourceConfig::Http {
                    json_fields: Some(_),
                    ..
                }
            ) && delimiter.len() == 1
                && delimiter != WHOLE_LINE
        })
    }

    fn key(&self) -> Option<KeySpec> {
        self.aggregate
            .clone()
            .or_else(|| self.schema.preset.and_then(Preset::default_key))
    }

    fn line_filter(&self) -> Option<&str> {
        self.filter.as_ref().map(|f| f.pattern.as_str())
    }

    fn invert_filter(&self) -> bool {
        self.filter
            .as_ref()
            .and_then(|f| f.invert)
            .unwrap_or(false)
    }

    fn error_policy(&self) -> ErrorPolicy {
        self.error_handling
            .as_ref()
            .and_then(|e| e.on_record_error)
            .unwrap_or_default()
    }

    fn max_reported_errors(&self) -> usize {
        self.error_handling
            .as_ref()
            .and_then(|e| e.max_reported_errors)
            .unwrap_or(DEFAULT_MAX_REPORTED_ERRORS)
    }

    fn output_path(&self) -> &str {
        &self.load.output_path
    }

    fn output_formats(&self) -> &[String] {
        &self.load.output_formats
    }

    fn record_order(&self) -> Option<RecordOrder> {
        self.load.sort_records.clone()
    }

    fn report_name(&self) -> &str {
        self.load
            .report_name
            .as_deref()
            .unwrap_or(self.pipeline.name.as_str())
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
