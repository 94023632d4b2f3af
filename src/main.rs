use anyhow::Result;
use chrono::Datelike;
use clap::Parser;
use std::path::Path;

use psp_extractor::cli::Cli;
use psp_extractor::config::{self, AppConfig};
use psp_extractor::export::{self, OutputFormat};
use psp_extractor::period::{financial_year_labels, Period, ALL_MONTHS, FINANCIAL_MONTHS};
use psp_extractor::{ChromeLauncher, DiagnosticsLog, Extraction, Pipeline, PipelineError, VerbosityLevel};

/// Exit code when the run completed but extracted nothing.
const EXIT_NOTHING_EXTRACTED: i32 = 2;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose >= 2 { "psp_extractor=debug" } else { "psp_extractor=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Handle --init flag first (before any other processing)
    if cli.init {
        match AppConfig::create_default_config() {
            Ok(path) => {
                println!("✅ Created default configuration file at: {}", path.display());
                println!("   Edit this file to customize settings, then run psp-extractor again.");
                std::process::exit(0);
            }
            Err(e) => {
                eprintln!("❌ Failed to create configuration file: {}", e);
                std::process::exit(1);
            }
        }
    }

    if cli.list_periods {
        let today = chrono::Local::now().date_naive();
        // financial year starts in April
        let current_start = if today.month() >= 4 { today.year() } else { today.year() - 1 };
        println!("Financial years:");
        for label in financial_year_labels(current_start) {
            println!("  {}", label);
        }
        println!("Months:");
        println!("  {}", ALL_MONTHS);
        for month in FINANCIAL_MONTHS {
            println!("  {}", month);
        }
        return Ok(());
    }

    let app_config = load_config(cli.config.as_deref());

    let Some(year) = cli.year.as_deref() else {
        eprintln!("❌ --year is required (e.g. --year 2024-25). Use --list-periods to see choices.");
        std::process::exit(1);
    };
    let period = match Period::parse(year, &cli.month) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("❌ Invalid period: {}", e);
            std::process::exit(1);
        }
    };
    let Some(format) = OutputFormat::parse(&cli.format) else {
        eprintln!("❌ Unknown output format '{}' (expected xlsx, csv or json)", cli.format);
        std::process::exit(1);
    };
    let output_path = cli.output_path(&app_config.output.file_name, format.extension());

    let verbosity = VerbosityLevel::from_verbose_count(cli.verbose);
    let log = match &cli.log_file {
        Some(path) => DiagnosticsLog::with_log_file(verbosity, path.clone()),
        None => DiagnosticsLog::new(verbosity),
    };

    let launcher = ChromeLauncher::new(app_config.browser.clone());
    let pipeline = Pipeline::new(app_config, launcher, log.clone());

    eprintln!("🔍 Loading and scraping data for {}...", period);
    let outcome = pipeline.run(&period).await;

    let exit_code = match outcome {
        Err(e) => {
            log.error(&e.to_string());
            if matches!(e, PipelineError::SessionAcquisition(_)) {
                eprintln!("⚠️  Could not open the report listing. Check that Chrome is installed (or set CHROME_PATH).");
            }
            eprintln!("❌ {}", e);
            print_log(&log);
            1
        }
        Ok(report) => {
            export::print_run_summary(&report);
            match &report.extraction {
                Extraction::Data(dataset) => {
                    let mut stderr = std::io::stderr().lock();
                    if export::save_dataset(dataset, format, &output_path, &log, cli.show_log, &mut stderr) {
                        0
                    } else {
                        1
                    }
                }
                Extraction::NothingExtracted(_) => {
                    print_log(&log);
                    EXIT_NOTHING_EXTRACTED
                }
            }
        }
    };

    if let Err(e) = log.export_logs() {
        eprintln!("⚠️  Failed to export log file: {}", e);
    }

    std::process::exit(exit_code);
}

fn load_config(explicit: Option<&Path>) -> AppConfig {
    let loaded = match explicit {
        Some(path) => AppConfig::load_from_path(path),
        None => AppConfig::load(),
    };

    match loaded {
        Ok(cfg) => cfg,
        Err(config::ConfigError::FileNotFound(path)) => {
            // Config not found - prompt to create if interactive
            match AppConfig::prompt_create_config() {
                Ok(Some(created_path)) => {
                    println!("✅ Created default configuration file at: {}", created_path.display());
                    println!("   Edit this file to customize settings, then run psp-extractor again.");
                    std::process::exit(0);
                }
                Ok(None) => {
                    eprintln!("❌ Configuration file not found at: {}", path.display());
                    eprintln!("   Run with --init to create a default configuration file.");
                    std::process::exit(1);
                }
                Err(e) => {
                    eprintln!("❌ Failed to create configuration file: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Err(e) => {
            eprintln!("❌ Configuration error: {}", e);
            std::process::exit(1);
        }
    }
}

fn print_log(log: &DiagnosticsLog) {
    let stderr = std::io::stderr();
    let mut out = stderr.lock();
    if let Err(e) = log.print_to(&mut out) {
        eprintln!("⚠️  Failed to print browser log: {}", e);
    }
}
