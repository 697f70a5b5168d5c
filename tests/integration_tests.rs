use anyhow::Result;
use clap::Parser;
use httpmock::prelude::*;
use record_etl::{CliConfig, EtlEngine, EtlError, LocalStorage, RecordError, RecordPipeline, TomlConfig};
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

fn read_output(dir: &TempDir, name: &str) -> String {
    std::fs::read_to_string(dir.path().join(name)).unwrap()
}

fn toml_path(path: &std::path::Path) -> String {
    path.to_str().unwrap().replace('\\', "/")
}

#[tokio::test]
async fn test_end_to_end_stock_prices_from_file() {
    let temp_dir = TempDir::new().unwrap();
    let mut input = NamedTempFile::new().unwrap();
    write!(
        input,
        "6/20/2014\tAAPL\t90.91\n6/20/2014\tMSFT\t41.68\n6/20/2014\tFB\t64.5\n\
         6/19/2014\tAAPL\t91.86\n6/19/2014\tMSFT\tn/a\n6/19/2014\tFB\t64.34\n"
    )
    .unwrap();

    // 建立 TOML 配置
    let config_content = format!(
        r#"
[pipeline]
name = "stock-prices"

[source]
type = "file"
path = '{}'

[schema]
preset = "stock"

[aggregate]
field = "symbol"

[load]
output_path = '{}'
output_formats = ["json", "csv", "records"]
"#,
        toml_path(input.path()),
        toml_path(temp_dir.path())
    );
    let config = TomlConfig::from_toml_str(&config_content).unwrap();

    let storage = LocalStorage::new(temp_dir.path().to_str().unwrap().to_string());
    let pipeline = RecordPipeline::new(storage, config);
    let engine = EtlEngine::new_with_monitoring(pipeline, false);

    let outcome = engine.run().await.unwrap();
    assert_eq!(outcome.summary.succeeded, 5);
    assert_eq!(outcome.summary.failed, 1);
    assert!(!outcome.summary.aborted);

    let counts = read_output(&temp_dir, "stock-prices_counts.csv");
    assert_eq!(counts, "key,count\nAAPL,2\nFB,2\nMSFT,1\n");

    let report: serde_json::Value =
        serde_json::from_str(&read_output(&temp_dir, "stock-prices.json")).unwrap();
    assert_eq!(report["succeeded"], 5);
    assert_eq!(report["failed"], 1);
    assert_eq!(report["counts"]["AAPL"], 2);
    let errors = report["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].as_str().unwrap().contains("closing_price"));

    let records = read_output(&temp_dir, "stock-prices_records.jsonl");
    let first: serde_json::Value = serde_json::from_str(records.lines().next().unwrap()).unwrap();
    assert_eq!(first["symbol"], "AAPL");
    assert_eq!(first["closing_price"], 90.91);
    assert_eq!(records.lines().count(), 5);
}

#[tokio::test]
async fn test_email_domains_with_grep_filter() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let mut input = NamedTempFile::new()?;
    writeln!(input, "joelgrus@gmail.com")?;
    writeln!(input, "# exported contacts")?;
    writeln!(input, "joel@m.datasciencester.com")?;
    writeln!(input, "JoelGrus@M.DataSciencester.com")?;
    writeln!(input, "nobody")?;

    let output_path = temp_dir.path().to_string_lossy().into_owned();
    let input_path = input.path().to_string_lossy().into_owned();
    let config = CliConfig::parse_from([
        "record-etl",
        input_path.as_str(),
        "--preset",
        "email",
        "--grep",
        "@",
        "--output-path",
        output_path.as_str(),
        "--output-formats",
        "tsv",
        "--report-name",
        "domains",
    ]);

    let storage = LocalStorage::new(output_path.clone());
    let engine = EtlEngine::new(RecordPipeline::new(storage, config));

    let outcome = engine.run().await?;
    assert_eq!(outcome.output_path, output_path);
    assert_eq!(outcome.summary.succeeded, 3);
    assert_eq!(outcome.summary.failed, 0);
    assert_eq!(outcome.filtered_lines, 2);
    assert_eq!(
        outcome.summary.aggregation.most_common(1),
        vec![(&"m.datasciencester.com".to_string(), 2)]
    );

    assert_eq!(
        std::fs::read_to_string(temp_dir.path().join("domains_counts.tsv"))?,
        "key\tcount\ngmail.com\t1\nm.datasciencester.com\t2\n"
    );
    Ok(())
}

#[tokio::test]
async fn test_abort_policy_fails_without_writing_reports() {
    let temp_dir = TempDir::new().unwrap();

    let config_content = format!(
        r#"
[pipeline]
name = "strict"

[source]
type = "memory"
text = "a@example.com\nbroken\nb@example.com\n"

[schema]
preset = "email"

[error_handling]
on_record_error = "abort"

[load]
output_path = '{}'
output_formats = ["json"]
"#,
        toml_path(temp_dir.path())
    );
    let config = TomlConfig::from_toml_str(&config_content).unwrap();

    let storage = LocalStorage::new(temp_dir.path().to_str().unwrap().to_string());
    let engine = EtlEngine::new(RecordPipeline::new(storage, config));

    let err = engine.run().await.unwrap_err();
    assert!(matches!(
        err,
        EtlError::RecordError(RecordError::MalformedRecord { line_number: 2, .. })
    ));
    assert!(!temp_dir.path().join("strict.json").exists());
}

#[tokio::test]
async fn test_http_json_source_grouped_by_month() {
    let temp_dir = TempDir::new().unwrap();

    let server = MockServer::start_async().await;
    let repos = serde_json::json!([
        {"name": "data-science-from-scratch", "created_at": "2019-03-14T10:00:00Z", "language": "Python"},
        {"name": "fizzbuzz", "created_at": "2019-03-02T08:30:00Z", "language": "Rust"},
        {"name": "dotfiles", "created_at": "2018-11-20T21:15:00Z", "language": null}
    ]);
    let api_mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/users/joelgrus/repos");
            then.status(200)
                .header("Content-Type", "application/json")
                .json_body(repos);
        })
        .await;

    let config_content = format!(
        r#"
[pipeline]
name = "repo-months"

[source]
type = "http"
endpoint = "{}"
timeout_seconds = 5
json_fields = ["created_at", "language"]

[schema]
delimiter = "\t"

[[schema.fields]]
name = "created_at"
type = "datetime"

[[schema.fields]]
name = "language"
type = "string"

[aggregate]
field = "created_at"
part = "month"

[load]
output_path = '{}'
output_formats = ["json", "tsv"]
"#,
        server.url("/users/joelgrus/repos"),
        toml_path(temp_dir.path())
    );
    let config = TomlConfig::from_toml_str(&config_content).unwrap();

    let storage = LocalStorage::new(temp_dir.path().to_str().unwrap().to_string());
    let engine = EtlEngine::new(RecordPipeline::new(storage, config));

    let outcome = engine.run().await.unwrap();
    api_mock.assert_async().await;

    assert_eq!(outcome.summary.succeeded, 3);
    assert_eq!(outcome.summary.aggregation.get("03"), 2);
    assert_eq!(outcome.summary.aggregation.get("11"), 1);
    assert_eq!(
        read_output(&temp_dir, "repo-months_counts.tsv"),
        "key\tcount\n03\t2\n11\t1\n"
    );

    let report: serde_json::Value =
        serde_json::from_str(&read_output(&temp_dir, "repo-months.json")).unwrap();
    assert_eq!(report["most_common"][0]["key"], "03");
    assert_eq!(report["most_common"][0]["count"], 2);
}

#[tokio::test]
async fn test_http_error_status() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start_async().await;
    let api_mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/emails.txt");
            then.status(500);
        })
        .await;

    let output_path = temp_dir.path().to_str().unwrap().to_string();
    let url = server.url("/emails.txt");
    let config = CliConfig::parse_from([
        "record-etl",
        "--url",
        url.as_str(),
        "--preset",
        "email",
        "--output-path",
        output_path.as_str(),
    ]);

    let engine = EtlEngine::new(RecordPipeline::new(LocalStorage::new(output_path.clone()), config));
    let err = engine.run().await.unwrap_err();

    api_mock.assert_async().await;
    assert!(matches!(err, EtlError::HttpStatusError { status: 500, .. }));
}

#[tokio::test]
async fn test_recently_pushed_languages_with_commas_in_values() {
    let temp_dir = TempDir::new().unwrap();

    let server = MockServer::start_async().await;
    let repos = serde_json::json!([
        {"name": "dsfs", "pushed_at": "2019-03-14T10:00:00Z", "language": "Python", "description": "Data, science, from scratch"},
        {"name": "old", "pushed_at": "2014-06-20T10:00:00Z", "language": "R", "description": "plain"},
        {"name": "fizzbuzz", "pushed_at": "2019-05-01T08:30:00Z", "language": "Rust", "description": "Fizz, buzz"}
    ]);
    let api_mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/users/joelgrus/repos");
            then.status(200).json_body(repos);
        })
        .await;

    let config_content = format!(
        r#"
[pipeline]
name = "recent"

[source]
type = "http"
endpoint = "{}"
json_fields = ["pushed_at", "language", "description"]

[[schema.fields]]
name = "pushed_at"
type = "datetime"

[[schema.fields]]
name = "language"
type = "string"

[[schema.fields]]
name = "description"
type = "string"

[load]
output_path = '{}'
output_formats = ["records"]

[load.sort_records]
field = "pushed_at"
descending = true
limit = 2
"#,
        server.url("/users/joelgrus/repos"),
        toml_path(temp_dir.path())
    );
    let config = TomlConfig::from_toml_str(&config_content).unwrap();

    let storage = LocalStorage::new(temp_dir.path().to_str().unwrap().to_string());
    let engine = EtlEngine::new(RecordPipeline::new(storage, config));

    let outcome = engine.run().await.unwrap();
    api_mock.assert_async().await;
    assert_eq!(outcome.summary.succeeded, 3);
    assert_eq!(outcome.summary.failed, 0);

    let records: Vec<serde_json::Value> = read_output(&temp_dir, "recent_records.jsonl")
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["language"], "Rust");
    assert_eq!(records[1]["language"], "Python");
    assert_eq!(records[1]["description"], "Data, science, from scratch");
}
