use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use loggerfill_core::batch::{self, BatchSummary};
use loggerfill_core::Config;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG: &str = "loggerfill.toml";

const SUCCESS: u8 = 0;
/// A configuration or setup error stopped the run before any file was written.
const FATAL: u8 = 1;
/// The run finished but skipped at least one file.
const PARTIAL_FAILURE: u8 = 2;

#[derive(Parser, Debug)]
#[command(author, version, about = "Trim and gap-fill data logger exports onto a common time axis", long_about = None)]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Gap-fill every logger file in the input directory
    Run(RunArgs),
    /// Build the study time axis and print its bounds
    Axis(WindowArgs),
}

#[derive(Args, Debug, Default)]
struct WindowArgs {
    /// Config file (falls back to LOGGERFILL_CONFIG, then ./loggerfill.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Override the study window start
    #[arg(long)]
    start: Option<String>,
    /// Override the study window end
    #[arg(long)]
    end: Option<String>,
    /// Override the sampling frequency (e.g. H, 15min, D)
    #[arg(long)]
    frequency: Option<String>,
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    #[command(flatten)]
    window: WindowArgs,
    /// Override the input directory
    #[arg(long)]
    input_dir: Option<PathBuf>,
    /// Override the output directory
    #[arg(long)]
    output_dir: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let result = match cli.command {
        Command::Run(args) => handle_run(args),
        Command::Axis(args) => handle_axis(args),
    };
    match result {
        Ok(status) => ExitCode::from(status),
        Err(err) => {
            error!(error = %format!("{err:#}"), "run aborted");
            eprintln!("Error: {err:?}");
            ExitCode::from(FATAL)
        }
    }
}

fn run_status(summary: &BatchSummary) -> u8 {
    if summary.is_success() {
        SUCCESS
    } else {
        PARTIAL_FAILURE
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn load_config(args: &WindowArgs) -> Result<Config> {
    dotenvy::dotenv().ok();

    let path = match &args.config {
        Some(path) => path.clone(),
        None => env::var("LOGGERFILL_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG)),
    };
    info!(path = %path.display(), "loading config");

    let mut config = Config::from_path(&path)
        .with_context(|| format!("failed to load config from '{}'", path.display()))?;

    if let Some(start) = &args.start {
        config.start = start.clone();
    }
    if let Some(end) = &args.end {
        config.end = end.clone();
    }
    if let Some(frequency) = &args.frequency {
        config.frequency = frequency.clone();
    }
    Ok(config)
}

fn handle_axis(args: WindowArgs) -> Result<u8> {
    let config = load_config(&args)?;
    let axis = batch::build_axis(&config)?;

    println!("records:  {}", axis.len());
    if let (Some(first), Some(last)) = (axis.first(), axis.last()) {
        println!("first:    {first}");
        println!("last:     {last}");
    }
    println!("interval: {}s", axis.interval().num_seconds());
    Ok(SUCCESS)
}

fn handle_run(args: RunArgs) -> Result<u8> {
    let mut config = load_config(&args.window)?;
    if let Some(dir) = args.input_dir {
        config.input_directory = dir;
    }
    if let Some(dir) = args.output_dir {
        config.output_directory = dir;
    }

    let summary = batch::run(&config)?;

    println!(
        "Processed {} files: {} written, {} duplicate, {} failed.",
        summary.reports.len(),
        summary.written(),
        summary.duplicates(),
        summary.failed()
    );
    for report in summary.failures() {
        let reason = report.error.as_deref().unwrap_or("unknown error");
        error!(path = %report.path.display(), error = reason, "file failed");
        println!("  FAILED {}: {}", report.path.display(), reason);
    }

    Ok(run_status(&summary))
}
