//! Sarcasm CLI
//!
//! Train, evaluate and query the BERT + BiLSTM headline sarcasm classifier.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusHandle;
use sarcasm_classifier::DeviceSpec;
use std::path::PathBuf;
use tracing::info;

mod commands;
mod config;

#[derive(Parser, Debug)]
#[command(name = "sarcasm")]
#[command(about = "Headline sarcasm classifier", long_about = None)]
pub struct Cli {
    /// Training configuration file (YAML)
    #[arg(short, long, global = true, env = "SARCASM_CONFIG")]
    config: Option<PathBuf>,

    /// Compute device: auto, cpu, cuda[:N], metal[:N]
    #[arg(short, long, global = true)]
    device: Option<DeviceSpec>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fine-tune on a labeled dataset, keeping the best checkpoint
    Train(TrainArgs),

    /// Score a checkpoint on the validation split of a dataset
    Evaluate(EvaluateArgs),

    /// Label a single headline
    Predict(PredictArgs),
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Dataset with `headline` and `label` columns (.csv or .jsonl)
    #[arg(long)]
    data: PathBuf,

    /// Number of epochs
    #[arg(long)]
    epochs: Option<usize>,

    /// Where to write the best checkpoint
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Write Prometheus-format training metrics to this file when done
    #[arg(long)]
    metrics_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct EvaluateArgs {
    /// Dataset with `headline` and `label` columns (.csv or .jsonl)
    #[arg(long)]
    data: PathBuf,

    /// Checkpoint to evaluate
    #[arg(long)]
    checkpoint: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct PredictArgs {
    /// Checkpoint to load
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Headline to classify
    headline: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    init_tracing(cli.verbose);

    match &cli.command {
        Command::Train(args) => {
            let config = config::load(&cli, args.epochs, args.checkpoint.as_deref())?;
            let metrics_handle = match &args.metrics_file {
                Some(_) => Some(init_metrics()?),
                None => None,
            };

            info!("Starting training run");
            let data = args.data.clone();
            let report = tokio::task::spawn_blocking(move || commands::train(&config, &data))
                .await??;
            println!("{}", report);

            if let (Some(path), Some(handle)) = (&args.metrics_file, metrics_handle) {
                std::fs::write(path, handle.render())?;
                info!("Training metrics written to {}", path.display());
            }
        }
        Command::Evaluate(args) => {
            let config = config::load(&cli, None, args.checkpoint.as_deref())?;
            let data = args.data.clone();
            let report = tokio::task::spawn_blocking(move || commands::evaluate(&config, &data))
                .await??;
            println!("{}", report);
        }
        Command::Predict(args) => {
            let config = config::load(&cli, None, args.checkpoint.as_deref())?;
            let prediction = commands::predict(&config, &args.headline).await?;
            println!("{}", serde_json::to_string(&prediction)?);
        }
    }

    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(verbose: bool) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("sarcasm_classifier=debug,sarcasm_cli=debug")
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("sarcasm_classifier=info,sarcasm_cli=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Install the Prometheus recorder so training gauges are captured
fn init_metrics() -> Result<PrometheusHandle> {
    use metrics_exporter_prometheus::PrometheusBuilder;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| anyhow::anyhow!("Failed to install metrics: {}", e))?;

    sarcasm_classifier::orchestrator::describe_metrics();

    info!("Metrics recorder initialized");
    Ok(handle)
}
