//! Record Watch CLI Application
//!
//! Command-line front end for the record-watch-core library. It replays a
//! scripted scenario (record deliveries, change events, clock advances)
//! against a notifier and reports the toasts and refreshes it emits:
//! - Scenario loading from TOML
//! - Deterministic replay on a virtual clock
//! - Text or JSON-lines reports

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;

mod config;
mod replay;
mod report;

/// Record Watch - Replay field-change notification scenarios
#[derive(Parser, Debug)]
#[command(name = "record-watch")]
#[command(
    about = "Replay record field-change scenarios and show the resulting toasts",
    long_about = None
)]
#[command(version)]
struct Args {
    /// Path to the scenario file (TOML with [watch] and [[steps]])
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output file for the report (default: stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Emit JSON lines instead of a text report
    #[arg(long)]
    json: bool,

    /// Force the watch's debug logging on (shown with -v)
    #[arg(long)]
    debug: bool,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("Record Watch CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using record-watch-core v{}", record_watch_core::VERSION);

    let Some(config_path) = &args.config else {
        println!("Record Watch - No scenario specified");
        println!("\nQuick Start:");
        println!("  record-watch --config scenario.toml");
        println!("  record-watch --config scenario.toml --json -o events.jsonl");
        println!("\nUse --help for more options");
        return Ok(());
    };

    log::info!("Loading scenario from: {:?}", config_path);
    let mut app_config = config::load_config(config_path)?;
    if args.debug {
        app_config.watch.debug = true;
    }
    log::debug!("Scenario loaded: {} steps", app_config.steps.len());

    let report = replay::run(&app_config).await?;

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(
            File::create(path)
                .with_context(|| format!("Failed to create output file: {:?}", path))?,
        ),
        None => Box::new(io::stdout().lock()),
    };

    if args.json {
        report::write_json(&mut out, &report)?;
    } else {
        report::write_text(&mut out, &app_config.watch, &report)?;
    }
    out.flush()?;

    if let Some(path) = &args.output {
        log::info!("Report written to {:?}", path);
    }

    Ok(())
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
