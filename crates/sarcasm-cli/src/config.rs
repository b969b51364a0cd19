//! Configuration loading with command-line overrides

use crate::Cli;
use sarcasm_classifier::TrainingConfig;
use std::path::Path;

/// Load the YAML config named on the command line (defaults when absent),
/// then apply flag overrides and validate the result.
pub fn load(
    cli: &Cli,
    epochs: Option<usize>,
    checkpoint: Option<&Path>,
) -> anyhow::Result<TrainingConfig> {
    let mut config = match &cli.config {
        Some(path) => TrainingConfig::from_file(path)?,
        None => TrainingConfig::default(),
    };

    if let Some(epochs) = epochs {
        config.epochs = epochs;
    }
    if let Some(checkpoint) = checkpoint {
        config.checkpoint_path = checkpoint.to_path_buf();
    }
    if let Some(device) = cli.device {
        config.device = device;
    }

    config.validate()?;
    Ok(config)
}
