//! CLI entry point for the Brush Wear Rater tool.
//!
//! Provides subcommands for rating a set of measurement sheets and for
//! inspecting the reference baselines the outlier bounds come from.

use anyhow::{Result, bail};
use brush_wear_rater::analyzers::analyzer::WearRateEngine;
use brush_wear_rater::analyzers::types::Group;
use brush_wear_rater::config::EngineConfig;
use brush_wear_rater::fetch::{BasicClient, SheetSource, load_sheets, spreadsheet_sources};
use brush_wear_rater::output::{
    print_pretty, render_baseline, render_table, write_report_json, write_table_csv,
};
use clap::{Parser, Subcommand};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "brush_wear_rater")]
#[command(about = "Computes per-brush wear rates from measurement sheets", long_about = None)]
struct Cli {
    /// JSON engine config (falls back to BRUSH_WEAR_CONFIG, then built-in defaults)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rate a set of sheets and print the upper and lower tables
    Rate {
        /// CSV files, directories of CSV files, URLs, or NAME=LOCATION
        #[arg(value_name = "SOURCE")]
        sources: Vec<String>,

        /// Published spreadsheet URL or id to export sheets from
        #[arg(long)]
        spreadsheet: Option<String>,

        /// Sheet name to export from --spreadsheet (repeatable)
        #[arg(long = "sheet", requires = "spreadsheet")]
        sheets: Vec<String>,

        /// Maximum number of sheets loaded concurrently
        #[arg(long, default_value_t = 4)]
        concurrency: usize,

        /// Directory to write upper.csv and lower.csv to
        #[arg(long)]
        csv_dir: Option<PathBuf>,

        /// File to write the full JSON report to
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Print reference stats and the filtered baseline for both groups
    Baseline,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/brush_wear_rater.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("brush_wear_rater.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config)?;
    let engine = WearRateEngine::new(config);

    match cli.command {
        Commands::Rate {
            sources,
            spreadsheet,
            sheets,
            concurrency,
            csv_dir,
            json,
        } => {
            let mut resolved = Vec::new();
            for source in &sources {
                resolved.extend(SheetSource::parse(source)?);
            }
            if let Some(spreadsheet) = spreadsheet {
                if sheets.is_empty() {
                    bail!("--spreadsheet needs at least one --sheet name");
                }
                resolved.extend(spreadsheet_sources(&spreadsheet, &sheets)?);
            }
            if resolved.is_empty() {
                bail!("no sheet sources given");
            }

            info!(sources = resolved.len(), concurrency, "Loading sheets");
            let raw = load_sheets(Arc::new(BasicClient::new()), resolved, concurrency).await;

            let report = engine.run(&raw, chrono::Utc::now());
            print_pretty(&report);

            for group in Group::ALL {
                println!("{}", render_table(report.table(group)));
            }
            for skipped in &report.skipped {
                warn!(sheet = %skipped.sheet, reason = %skipped.error, "Sheet was skipped");
            }

            if let Some(dir) = csv_dir {
                std::fs::create_dir_all(&dir)?;
                write_table_csv(&dir.join("upper.csv"), &report.upper)?;
                write_table_csv(&dir.join("lower.csv"), &report.lower)?;
                info!(dir = %dir.display(), "CSV tables written");
            }
            if let Some(path) = json {
                write_report_json(&path, &report)?;
                info!(path = %path.display(), "JSON report written");
            }
        }
        Commands::Baseline => {
            let threshold = engine.config().threshold;
            for group in Group::ALL {
                println!("{}", render_baseline(group, engine.baseline(group), threshold));
            }
        }
    }

    Ok(())
}

/// Resolves the engine config from the flag, the environment, or defaults.
fn load_config(flag: Option<String>) -> Result<EngineConfig> {
    match flag.or_else(|| std::env::var("BRUSH_WEAR_CONFIG").ok()) {
        Some(path) => {
            info!(path = %path, "Loading engine config");
            EngineConfig::load(&path)
        }
        None => {
            info!("No config given, using built-in baselines");
            Ok(EngineConfig::default())
        }
    }
}
