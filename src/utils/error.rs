use thiserror::Error;

/// 單筆記錄的錯誤。處理器只回報，是否中止由呼叫端決定。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("Malformed record at line {line_number} ({reason}): {line:?}")]
    MalformedRecord {
        line_number: usize,
        line: String,
        expected: usize,
        found: usize,
        reason: String,
    },

    #[error(
        "Field '{field}' (position {position}) at line {line_number} cannot be coerced from {raw:?}: {reason}"
    )]
    FieldCoercion {
        line_number: usize,
        field: String,
        position: usize,
        raw: String,
        reason: String,
    },
}

impl RecordError {
    pub fn line_number(&self) -> usize {
        match self {
            RecordError::MalformedRecord { line_number, .. } => *line_number,
            RecordError::FieldCoercion { line_number, .. } => *line_number,
        }
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, RecordError::MalformedRecord { .. })
    }
}

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("HTTP {status} returned by {url}")]
    HttpStatusError { url: String, status: u16 },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid regular expression: {0}")]
    RegexError(#[from] regex::Error),

    #[error("Run aborted: {0}")]
    RecordError(#[from] RecordError),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value {value:?} for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration '{field}'")]
    MissingConfigError { field: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Io,
    Data,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ApiError(_) | EtlError::HttpStatusError { .. } => ErrorCategory::Network,
            EtlError::IoError(_) => ErrorCategory::Io,
            EtlError::CsvError(_)
            | EtlError::SerializationError(_)
            | EtlError::RecordError(_)
            | EtlError::ProcessingError { .. } => ErrorCategory::Data,
            EtlError::RegexError(_)
            | EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            // 網路錯誤通常可以重試
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Data | ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Io => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            EtlError::ApiError(_) | EtlError::HttpStatusError { .. } => {
                "Check the source URL and network connectivity, then retry".to_string()
            }
            EtlError::IoError(_) => {
                "Check that the input file exists and the output directory is writable".to_string()
            }
            EtlError::RecordError(e) => format!(
                "Fix line {} of the input or rerun with the skip policy",
                e.line_number()
            ),
            EtlError::CsvError(_) | EtlError::SerializationError(_) => {
                "Check the input encoding and the delimiter setting".to_string()
            }
            EtlError::ProcessingError { .. } => "Inspect the input data".to_string(),
            EtlError::RegexError(_) => "Fix the filter pattern".to_string(),
            EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => {
                "Review the configuration file or command-line flags".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Could not fetch the input: {}", self),
            ErrorCategory::Io => format!("File system problem: {}", self),
            ErrorCategory::Data => format!("Input data problem: {}", self),
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
