use anyhow::Context;
use clap::Parser;
use record_etl::config::toml_config::{SourceConfig, TomlConfig};
use record_etl::core::ConfigProvider;
use record_etl::utils::error::ErrorSeverity;
use record_etl::utils::{logger, validation::Validate};
use record_etl::{EtlEngine, ErrorPolicy, LocalStorage, RecordPipeline};

#[derive(Parser)]
#[command(name = "toml-etl")]
#[command(about = "Record processing driven by a TOML pipeline definition")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "etl-config.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Override the error policy from config
    #[arg(long, value_enum)]
    on_error: Option<ErrorPolicy>,

    /// Validate and describe the pipeline without reading any input
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = TomlConfig::from_file(&args.config)
        .with_context(|| format!("failed to load config file '{}'", args.config))?;

    // 初始化日誌
    if config.json_logs() {
        logger::init_json_logger(args.verbose);
    } else {
        logger::init_cli_logger(args.verbose);
    }

    tracing::info!("🚀 Starting TOML-based record ETL");
    tracing::info!("📁 Loaded configuration from: {}", args.config);

    // 應用命令列覆蓋設定
    if let Some(policy) = args.on_error {
        config
            .error_handling
            .get_or_insert(record_etl::config::toml_config::ErrorHandlingConfig {
                on_record_error: None,
                max_reported_errors: None,
            })
            .on_record_error = Some(policy);
        tracing::info!("🔧 Error policy overridden to: {:?}", policy);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    tracing::info!("✅ Configuration loaded and validated successfully");
    display_config_summary(&config, &args)?;

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No input will be read");
        return Ok(());
    }

    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let storage = LocalStorage::new(config.output_path().to_string());
    let pipeline = RecordPipeline::new(storage, config);
    let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run().await {
        Ok(outcome) => {
            println!("✅ ETL process completed successfully!");
            println!(
                "   {} accepted, {} rejected, {} filtered out",
                outcome.summary.succeeded, outcome.summary.failed, outcome.filtered_lines
            );
            println!("📁 Output saved to: {}", outcome.output_path);
        }
        Err(e) => {
            tracing::error!(
                "❌ ETL process failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 {}", e.recovery_suggestion());

            let exit_code = match e.severity() {
                ErrorSeverity::Medium => 2,
                ErrorSeverity::High => 1,
                ErrorSeverity::Critical => 3,
            };
            std::process::exit(exit_code);
        }
    }

    Ok(())
}

fn display_config_summary(config: &TomlConfig, args: &Args) -> anyhow::Result<()> {
    println!("📋 Configuration Summary:");
    println!(
        "  Pipeline: {} v{}",
        config.pipeline.name,
        config.pipeline.version.as_deref().unwrap_or("-")
    );

    match &config.source {
        SourceConfig::File { path } => println!("  Source: file {}", path),
        SourceConfig::Stdin => println!("  Source: standard input"),
        SourceConfig::Memory { text } => println!("  Source: inline text ({} bytes)", text.len()),
        SourceConfig::Http {
            endpoint,
            json_fields,
            ..
        } => {
            println!("  Source: GET {}", endpoint);
            if let Some(fields) = json_fields {
                println!("  JSON fields: {}", fields.join(", "));
            }
        }
    }

    let schema = config.schema().context("schema could not be built")?;
    println!(
        "  Delimiter: {:?}{}",
        config.delimiter(),
        if config.has_header() { " (header skipped)" } else { "" }
    );
    println!("  Fields:");
    for field in schema.fields() {
        println!("    {} -> {}", field.name(), field.coercion().label());
    }

    if let Some(key) = config.key() {
        println!("  Group by: {} ({:?})", key.field, key.part);
    }
    if let Some(pattern) = config.line_filter() {
        let mode = if config.invert_filter() { "excluding" } else { "matching" };
        println!("  Filter: lines {} /{}/", mode, pattern);
    }
    println!("  On record error: {:?}", config.error_policy());
    println!("  Output: {}", config.output_path());
    println!("  Formats: {}", config.output_formats().join(", "));
    if let Some(order) = config.record_order() {
        println!(
            "  Records sorted by: {}{}{}",
            order.field,
            if order.descending { " (descending)" } else { "" },
            order.limit.map(|n| format!(", first {}", n)).unwrap_or_default()
        );
    }

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
    Ok(())
}
