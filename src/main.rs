// External crates
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

// Local modules
use trend_window::pipeline::orchestrator::run_pipeline;
use trend_window::util::config::PipelineConfig;
use trend_window::util::exploration::{ExplorationReporter, SummaryReporter};

/// Prepare labeled, scaled sliding windows from an OHLCV price file
#[derive(Debug, Parser)]
#[command(name = "trend-window", version, about)]
struct Args {
    /// Path to the JSON pipeline configuration
    #[arg(short, long)]
    config: PathBuf,

    /// Skip writing the exploration summary
    #[arg(long)]
    no_report: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = PipelineConfig::from_file(&args.config)
        .with_context(|| format!("Loading configuration {}", args.config.display()))?;

    let summary = SummaryReporter::new(&config.paths.exploration);
    let reporter: Option<&dyn ExplorationReporter> = if args.no_report {
        None
    } else {
        Some(&summary)
    };

    let output = run_pipeline(&config, reporter).context("Data preparation failed")?;

    println!("Train windows: {:?}", output.train.features.dim());
    println!("Test windows: {:?}", output.test.features.dim());
    println!(
        "Scaler ({}) saved at: {}",
        output.artifact.method.name(),
        output.artifact_path.display()
    );
    println!("Labeled data saved at: {}", output.preprocessed_path.display());

    Ok(())
}
