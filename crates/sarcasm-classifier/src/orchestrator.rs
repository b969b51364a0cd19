//! Multi-epoch training with best-by-validation-loss checkpointing

use crate::backbone::ContextEncoder;
use crate::checkpoint::CheckpointStore;
use crate::config::TrainingConfig;
use crate::dataset::BatchLoader;
use crate::evaluator::{evaluate, Evaluation};
use crate::model::seed_parameters;
use crate::model_loader::ModelBundle;
use crate::progress::{ProgressSink, TracingProgress};
use crate::result_ext::ModelResultExt;
use crate::trainer::{train_epoch, CrossEntropyLoss, Loss, TrainMetrics};
use candle_nn::{AdamW, Optimizer, ParamsAdamW};
use rand::rngs::StdRng;
use sarcasm_core::{Example, Result};
use std::time::Instant;

/// Register descriptions for the gauges and counters emitted during training
pub fn describe_metrics() {
    metrics::describe_gauge!("sarcasm_train_loss", "Mean training loss of the last epoch");
    metrics::describe_gauge!("sarcasm_train_accuracy", "Training accuracy of the last epoch");
    metrics::describe_gauge!("sarcasm_val_loss", "Mean validation loss of the last epoch");
    metrics::describe_gauge!("sarcasm_val_accuracy", "Validation accuracy of the last epoch");
    metrics::describe_counter!(
        "sarcasm_checkpoints_saved_total",
        "Number of times the best checkpoint was overwritten"
    );
}

/// Results of one epoch
#[derive(Debug, Clone, PartialEq)]
pub struct EpochSummary {
    /// 1-based
    pub epoch: usize,
    pub train: TrainMetrics,
    pub val_loss: f32,
    pub val_accuracy: f64,
    /// Whether this epoch's parameters were written to the checkpoint
    pub improved: bool,
}

/// What a finished run hands back
pub struct TrainingOutcome<E> {
    /// Final-epoch model, variable store, tokenizer and device
    pub bundle: ModelBundle<E>,
    pub history: Vec<EpochSummary>,
    /// Lowest validation loss seen; `+inf` if no epoch improved
    pub best_val_loss: f32,
    pub best_epoch: Option<usize>,
    /// Evaluation of the final epoch
    pub last_evaluation: Option<Evaluation>,
}

/// Owns the model, optimizer, loss and RNG for the length of a run.
///
/// Each epoch trains on a fresh shuffle, evaluates on the validation set and
/// overwrites the checkpoint only when validation loss strictly improves.
pub struct TrainingOrchestrator<E> {
    bundle: ModelBundle<E>,
    optimizer: AdamW,
    loss: Box<dyn Loss>,
    rng: StdRng,
    checkpoint: CheckpointStore,
    progress: Box<dyn ProgressSink>,
    epochs: usize,
    batch_size: usize,
}

impl<E: ContextEncoder> TrainingOrchestrator<E> {
    /// Initialize every non-pretrained parameter from `rng`, then build the
    /// optimizer over all parameters. The same `rng` later drives shuffling.
    pub fn new(bundle: ModelBundle<E>, config: &TrainingConfig, mut rng: StdRng) -> Result<Self> {
        config.validate()?;

        let reset = seed_parameters(&bundle.varmap, &mut rng, bundle.pretrained_prefix.as_deref())
            .model_context("Failed to initialize parameters")?;
        tracing::debug!("Initialized {} non-pretrained parameter tensors", reset);

        let optimizer = AdamW::new(
            bundle.varmap.all_vars(),
            ParamsAdamW {
                lr: config.learning_rate,
                weight_decay: config.weight_decay,
                ..Default::default()
            },
        )
        .model_context("Failed to build optimizer")?;

        Ok(Self {
            bundle,
            optimizer,
            loss: Box::new(CrossEntropyLoss),
            rng,
            checkpoint: CheckpointStore::new(&config.checkpoint_path),
            progress: Box::new(TracingProgress),
            epochs: config.epochs,
            batch_size: config.batch_size,
        })
    }

    /// Replace the default `debug!` progress sink
    pub fn with_progress(mut self, progress: Box<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    /// Replace the default cross-entropy loss, used for both training and
    /// validation
    pub fn with_loss(mut self, loss: Box<dyn Loss>) -> Self {
        self.loss = loss;
        self
    }

    pub fn checkpoint(&self) -> &CheckpointStore {
        &self.checkpoint
    }

    /// Encode both splits and run every epoch
    pub fn fit(self, train: &[Example], validation: &[Example]) -> Result<TrainingOutcome<E>> {
        let encoder = &self.bundle.example_encoder;
        let train_loader = BatchLoader::new(
            encoder.encode_all(train)?,
            self.batch_size,
            self.bundle.device.clone(),
        )?;
        let val_loader = BatchLoader::new(
            encoder.encode_all(validation)?,
            self.batch_size,
            self.bundle.device.clone(),
        )?;
        self.fit_loaders(&train_loader, &val_loader)
    }

    /// Run every epoch over already-encoded loaders
    pub fn fit_loaders(
        mut self,
        train: &BatchLoader,
        validation: &BatchLoader,
    ) -> Result<TrainingOutcome<E>> {
        tracing::info!(
            "Training for {} epochs: {} training / {} validation examples, {} batches per epoch",
            self.epochs,
            train.len(),
            validation.len(),
            train.num_batches()
        );

        let mut best_val_loss = f32::INFINITY;
        let mut best_epoch = None;
        let mut history = Vec::with_capacity(self.epochs);
        let mut last_evaluation = None;

        for epoch in 1..=self.epochs {
            let started = Instant::now();

            let train_metrics = train_epoch(
                &self.bundle.model,
                train,
                self.loss.as_ref(),
                &mut self.optimizer,
                &mut self.rng,
                self.progress.as_mut(),
            )?;
            let evaluation = evaluate(
                &self.bundle.model,
                validation,
                self.loss.as_ref(),
                self.progress.as_mut(),
            )?;

            // NaN compares false, so it never replaces the best checkpoint
            let improved = evaluation.mean_loss < best_val_loss;
            if improved {
                self.checkpoint.save(&self.bundle.varmap)?;
                best_val_loss = evaluation.mean_loss;
                best_epoch = Some(epoch);
                metrics::counter!("sarcasm_checkpoints_saved_total").increment(1);
            }

            metrics::gauge!("sarcasm_train_loss").set(train_metrics.loss as f64);
            metrics::gauge!("sarcasm_train_accuracy").set(train_metrics.accuracy as f64);
            metrics::gauge!("sarcasm_val_loss").set(evaluation.mean_loss as f64);
            metrics::gauge!("sarcasm_val_accuracy").set(evaluation.accuracy());

            tracing::info!(
                epoch,
                train_loss = train_metrics.loss,
                train_accuracy = train_metrics.accuracy,
                val_loss = evaluation.mean_loss,
                val_accuracy = evaluation.accuracy(),
                improved,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Epoch {}/{} complete",
                epoch,
                self.epochs
            );
            if improved {
                tracing::info!("Saved best model to {}", self.checkpoint.path().display());
            }

            history.push(EpochSummary {
                epoch,
                train: train_metrics,
                val_loss: evaluation.mean_loss,
                val_accuracy: evaluation.accuracy(),
                improved,
            });
            last_evaluation = Some(evaluation);
        }

        Ok(TrainingOutcome {
            bundle: self.bundle,
            history,
            best_val_loss,
            best_epoch,
            last_evaluation,
        })
    }
}
