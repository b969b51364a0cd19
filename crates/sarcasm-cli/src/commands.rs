//! Subcommand implementations

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use sarcasm_classifier::{
    build_from_checkpoint, build_pretrained_bundle, evaluate as evaluate_model, load_examples,
    stratified_split, BatchLoader, CheckpointStore, Classifier, CrossEntropyLoss, Evaluation,
    Predictor, TracingProgress, TrainingConfig, TrainingOrchestrator,
};
use sarcasm_core::{Example, PredictionResult};
use std::fmt::Write;
use std::path::Path;
use tracing::info;

fn split(config: &TrainingConfig, data: &Path) -> Result<(Vec<Example>, Vec<Example>)> {
    let examples =
        load_examples(data).with_context(|| format!("loading dataset {}", data.display()))?;
    let mut rng = StdRng::seed_from_u64(config.split_seed);
    Ok(stratified_split(
        examples,
        config.validation_fraction,
        &mut rng,
    )?)
}

fn render(evaluation: &Evaluation) -> String {
    format!(
        "{}\nConfusion matrix (rows = true, cols = predicted):\n{}",
        evaluation.report, evaluation.confusion
    )
}

/// Full training run; returns the printable final-epoch report
pub fn train(config: &TrainingConfig, data: &Path) -> Result<String> {
    let (train, validation) = split(config, data)?;

    let bundle = build_pretrained_bundle(config).context("loading pretrained encoder")?;
    let orchestrator =
        TrainingOrchestrator::new(bundle, config, StdRng::seed_from_u64(config.seed))?;
    let outcome = orchestrator.fit(&train, &validation)?;

    let mut out = String::new();
    writeln!(out, "epoch  train_loss  train_acc  val_loss  val_acc")?;
    for epoch in &outcome.history {
        writeln!(
            out,
            "{:>5}  {:>10.4}  {:>9.4}  {:>8.4}  {:>7.4}{}",
            epoch.epoch,
            epoch.train.loss,
            epoch.train.accuracy,
            epoch.val_loss,
            epoch.val_accuracy,
            if epoch.improved { "  *" } else { "" }
        )?;
    }
    match outcome.best_epoch {
        Some(best) => writeln!(
            out,
            "\nBest validation loss {:.4} at epoch {}, saved to {}",
            outcome.best_val_loss,
            best,
            config.checkpoint_path.display()
        )?,
        None => writeln!(out, "\nNo epoch produced a finite validation loss")?,
    }

    if let Some(evaluation) = &outcome.last_evaluation {
        writeln!(out, "\nFinal epoch evaluation:\n{}", render(evaluation))?;
    }
    Ok(out)
}

/// Score the configured checkpoint on the validation split
pub fn evaluate(config: &TrainingConfig, data: &Path) -> Result<String> {
    let (_, validation) = split(config, data)?;

    let store = CheckpointStore::new(&config.checkpoint_path);
    let bundle = build_from_checkpoint(config, &store)?;

    let encoded = bundle.example_encoder.encode_all(&validation)?;
    let loader = BatchLoader::new(encoded, config.batch_size, bundle.device.clone())?;
    let evaluation = evaluate_model(
        &bundle.model,
        &loader,
        &CrossEntropyLoss,
        &mut TracingProgress,
    )?;

    info!(
        "Validation loss {:.4}, accuracy {:.4}",
        evaluation.mean_loss,
        evaluation.accuracy()
    );
    Ok(render(&evaluation))
}

/// Label one headline with the configured checkpoint
pub async fn predict(config: &TrainingConfig, headline: &str) -> Result<PredictionResult> {
    let store = CheckpointStore::new(&config.checkpoint_path);
    let loader_config = config.clone();
    let bundle =
        tokio::task::spawn_blocking(move || build_from_checkpoint(&loader_config, &store))
            .await??;

    let predictor = Predictor::from_bundle(bundle, config.checkpoint_path.display().to_string());
    let result = predictor.classify(headline).await?;
    info!("Classified in {}us", result.latency_us);

    Ok(result.prediction())
}
