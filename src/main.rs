use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, warn};

use vendor_summary::analysis::{self, TargetCriteria};
use vendor_summary::config::Config;
use vendor_summary::pipeline::{BuildResult, IngestReport, Pipeline};
use vendor_summary::{logging, metrics, SummaryError};

#[derive(Parser)]
#[command(name = "vendor_summary")]
#[command(about = "Vendor and brand sales summary builder")]
#[command(version = "0.1.0")]
struct Cli {
    /// Configuration file (default: vendor_summary.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite store holding the fact tables
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Summary artifact to write
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the vendor summary from the store and export it (default)
    Build,
    /// Load the raw CSV files into the store, replacing existing tables
    Ingest {
        /// Directory holding the raw CSV files
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Run ingest and build sequentially
    Run {
        /// Directory holding the raw CSV files
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// List low-sales, high-margin brands from an exported summary
    Targets {
        /// Summary artifact to read (default: the configured output)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Sales quantile at or below which a brand qualifies
        #[arg(long, default_value_t = 0.15)]
        sales_quantile: f64,
        /// Margin quantile at or above which a brand qualifies
        #[arg(long, default_value_t = 0.85)]
        margin_quantile: f64,
    },
}

fn print_ingest(report: &IngestReport) {
    println!("\n📥 Ingestion results:");
    for table in &report.tables {
        println!("   {} ← {} ({} rows)", table.table, table.source, table.rows);
    }
    println!(
        "   Total: {} tables, {} rows in {:.2}s",
        report.tables.len(),
        report.total_rows(),
        report.elapsed.as_secs_f64()
    );
}

fn print_build(result: &BuildResult) {
    println!("\n📊 Summary results:");
    println!("   Rows: {}", result.rows);
    println!("   Output file: {}", result.output_file.display());
    println!("   SHA-256: {}", result.sha256);

    let integrity = &result.integrity;
    if !integrity.is_clean() {
        println!("\n⚠️  Integrity warnings:");
        println!("   Purchases without sales: {}", integrity.purchase_only);
        println!("   Sales without purchases: {}", integrity.sales_only);
        println!("   Rows dropped for null keys: {}", integrity.null_key_rows);
        println!("   Total warnings: {}", integrity.warnings.len());
    }
    if integrity.sentinels.total() > 0 {
        println!(
            "   Undefined ratios set to 0: margin {}, turnover {}, sales/purchase {}",
            integrity.sentinels.profit_margin,
            integrity.sentinels.stock_turnover,
            integrity.sentinels.sales_to_purchase_ratio
        );
    }
}

fn execute(command: Commands, config: &mut Config) -> anyhow::Result<()> {
    match command {
        Commands::Build => {
            println!("🔨 Building vendor summary...");
            let result = Pipeline::build(config).with_context(|| {
                format!("Summary build from {} failed", config.store.path.display())
            })?;
            print_build(&result);
        }
        Commands::Ingest { data_dir } => {
            if let Some(dir) = data_dir {
                config.ingest.data_dir = dir;
            }
            println!("🔄 Ingesting raw data...");
            let report = Pipeline::ingest(config).with_context(|| {
                format!("Ingest from {} failed", config.ingest.data_dir.display())
            })?;
            print_ingest(&report);
        }
        Commands::Run { data_dir } => {
            if let Some(dir) = data_dir {
                config.ingest.data_dir = dir;
            }
            println!("🚀 Running full pipeline (ingest + build)...");
            let (ingest, build) = Pipeline::run(config).context("Pipeline run failed")?;
            print_ingest(&ingest);
            print_build(&build);
        }
        Commands::Targets {
            input,
            sales_quantile,
            margin_quantile,
        } => {
            let path = input.unwrap_or_else(|| config.export.path.clone());
            let rows = analysis::read_summary_file(&path)
                .with_context(|| format!("Reading summary {}", path.display()))?;
            let targets = analysis::target_brands(
                &rows,
                TargetCriteria {
                    sales_quantile,
                    margin_quantile,
                },
            )?;
            println!(
                "🎯 {} brands with sales <= {:.2} and margin >= {:.4}:",
                targets.brands.len(),
                targets.sales_threshold,
                targets.margin_threshold
            );
            for brand in &targets.brands {
                println!(
                    "   {:<40} sales {:>12.2}  margin {:>8.4}",
                    brand.description, brand.total_sales_dollars, brand.profit_margin
                );
            }
        }
    }
    Ok(())
}

/// Exit code of the underlying `SummaryError`, looking through any added context.
fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<SummaryError>()
        .map(SummaryError::exit_code)
        .unwrap_or(1)
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {}", e);
            return ExitCode::from(e.exit_code());
        }
    };
    if let Some(store) = cli.store {
        config.store.path = store;
    }
    if let Some(output) = cli.output {
        config.export.path = output;
    }

    // Keep the guard alive so file logs are flushed on exit
    let _log_guard = logging::init_logging(&config.logging);
    metrics::init_metrics();

    let result = execute(cli.command.unwrap_or(Commands::Build), &mut config);

    if let Some(path) = &config.metrics.textfile {
        if let Err(e) = metrics::write_textfile(path) {
            warn!("Failed to write metrics to {}: {}", path.display(), e);
        }
    }

    match result {
        Ok(()) => {
            println!("✅ Completed");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            println!("❌ Run failed: {:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}
