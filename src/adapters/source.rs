use crate::core::processor::WHOLE_LINE;
use crate::domain::ports::LineStream;
use crate::utils::error::{EtlError, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{self, BufRead, BufReader, Cursor};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpSource {
    pub url: String,
    pub timeout_seconds: Option<u64>,
    /// When set, the body is a JSON array and each object becomes one line
    /// made of these fields (dotted paths reach into nested objects).
    pub json_fields: Option<Vec<String>>,
    /// Joins `json_fields` values.
    pub delimiter: String,
}

/// Where the raw lines come from.
#[derive(Debug, Clone, PartialEq)]
pub enum LineSource {
    File(PathBuf),
    Stdin,
    Memory(String),
    Http(HttpSource),
}

impl LineSource {
    /// `-` means standard input.
    pub fn from_path(path: &str) -> Self {
        if path == "-" {
            LineSource::Stdin
        } else {
            LineSource::File(PathBuf::from(path))
        }
    }

    pub fn describe(&self) -> String {
        match self {
            LineSource::File(path) => format!("file {}", path.display()),
            LineSource::Stdin => "standard input".to_string(),
            LineSource::Memory(text) => format!("in-memory buffer ({} bytes)", text.len()),
            LineSource::Http(http) => format!("GET {}", http.url),
        }
    }

    pub async fn open(&self) -> Result<LineStream> {
        tracing::debug!("Opening {}", self.describe());
        match self {
            LineSource::File(path) => {
                let file = File::open(path)?;
                Ok(Box::new(BufReader::new(file).lines()))
            }
            LineSource::Stdin => Ok(Box::new(BufReader::new(io::stdin()).lines())),
            LineSource::Memory(text) => Ok(memory_lines(text.clone())),
            LineSource::Http(http) => fetch(http).await,
        }
    }
}

fn memory_lines(text: String) -> LineStream {
    Box::new(Cursor::new(text.into_bytes()).lines())
}

async fn fetch(source: &HttpSource) -> Result<LineStream> {
    let mut builder = Client::builder();
    if let Some(secs) = source.timeout_seconds {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    let client = builder.build()?;

    tracing::debug!("Making API request to: {}", source.url);
    let response = client.get(&source.url).send().await?;
    tracing::debug!("API response status: {}", response.status());

    if !response.status().is_success() {
        return Err(EtlError::HttpStatusError {
            url: source.url.clone(),
            status: response.status().as_u16(),
        });
    }

    let body = response.text().await?;
    match &source.json_fields {
        Some(fields) => {
            let lines = render_json_lines(&body, fields, &source.delimiter)?;
            Ok(Box::new(lines.into_iter().map(Ok::<String, io::Error>)))
        }
        None => Ok(memory_lines(body)),
    }
}

/// Flattens a JSON array of objects into delimited lines.
///
/// With a single-byte delimiter the rows are written as CSV, so values holding
/// the delimiter, quotes or line breaks come out quoted and need quoted
/// parsing. Other delimiters cannot be escaped; a value containing one is an
/// error.
pub fn render_json_lines(body: &str, fields: &[String], delimiter: &str) -> Result<Vec<String>> {
    let json: serde_json::Value = serde_json::from_str(body)?;

    let items = match json {
        serde_json::Value::Array(items) => items,
        // 單一物件當作只有一筆
        object @ serde_json::Value::Object(_) => vec![object],
        other => {
            return Err(EtlError::ProcessingError {
                message: format!("expected a JSON array of objects, got {}", other),
            })
        }
    };

    let pointers: Vec<String> = fields
        .iter()
        .map(|f| format!("/{}", f.replace('.', "/")))
        .collect();

    items
        .iter()
        .map(|item| {
            let values: Vec<String> = pointers
                .iter()
                .map(|pointer| match item.pointer(pointer) {
                    None | Some(serde_json::Value::Null) => String::new(),
                    Some(serde_json::Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                })
                .collect();
            render_row(&values, delimiter)
        })
        .collect()
}

fn render_row(values: &[String], delimiter: &str) -> Result<String> {
    match delimiter.as_bytes() {
        [byte] if delimiter != WHOLE_LINE => {
            let mut writer = csv::WriterBuilder::new()
                .delimiter(*byte)
                .terminator(csv::Terminator::Any(b'\n'))
                .from_writer(Vec::new());
            writer.write_record(values)?;

            let mut bytes = writer
                .into_inner()
                .map_err(|e| EtlError::IoError(e.into_error()))?;
            if bytes.last() == Some(&b'\n') {
                bytes.pop();
            }
            String::from_utf8(bytes).map_err(|e| EtlError::ProcessingError {
                message: format!("rendered row is not UTF-8: {}", e),
            })
        }
        _ => {
            if let Some(value) = values.iter().find(|v| v.contains(delimiter)) {
                return Err(EtlError::ProcessingError {
                    message: format!(
                        "value {:?} contains the delimiter {:?}",
                        value, delimiter
                    ),
                });
            }
            Ok(values.join(delimiter))
        }
    }
}

/// Yields lines until the first read error, which is kept for the caller.
pub struct ReadLines<I> {
    inner: I,
    error: Option<io::Error>,
}

impl<I> ReadLines<I>
where
    I: Iterator<Item = io::Result<String>>,
{
    pub fn new(inner: I) -> Self {
        Self { inner, error: None }
    }

    pub fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }
}

impl<I> Iterator for ReadLines<I>
where
    I: Iterator<Item = io::Result<String>>,
{
    type Item = String;

    fn next(&mut self) -> Option<String> {
        if self.error.is_some() {
            return None;
        }
        match self.inner.next()? {
            Ok(line) => Some(line),
            Err(e) => {
                self.error = Some(e);
                None
            }
        }
    }
}
