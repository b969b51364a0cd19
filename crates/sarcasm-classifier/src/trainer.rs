//! One training epoch over a shuffled batch loader

use crate::backbone::ContextEncoder;
use crate::dataset::BatchLoader;
use crate::model::SarcasmModel;
use crate::progress::{BatchProgress, Phase, ProgressSink};
use crate::result_ext::ModelResultExt;
use candle_core::{Tensor, D};
use candle_nn::Optimizer;
use rand::Rng;
use sarcasm_core::Result;

/// Scalar loss over class scores and integer targets
pub trait Loss: Send + Sync {
    /// `scores`: `[B, C]` f32, `targets`: `[B]` u32 → scalar
    fn compute(&self, scores: &Tensor, targets: &Tensor) -> candle_core::Result<Tensor>;
}

/// Mean softmax cross-entropy
#[derive(Debug, Default, Clone, Copy)]
pub struct CrossEntropyLoss;

impl Loss for CrossEntropyLoss {
    fn compute(&self, scores: &Tensor, targets: &Tensor) -> candle_core::Result<Tensor> {
        candle_nn::loss::cross_entropy(scores, targets)
    }
}

/// Mean loss and accuracy of one pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainMetrics {
    /// Arithmetic mean of the per-batch losses (NaN when there were no batches)
    pub loss: f32,
    /// Correct predictions over examples seen
    pub accuracy: f32,
}

/// Number of rows whose argmax matches the target
pub(crate) fn count_correct(scores: &Tensor, targets: &Tensor) -> candle_core::Result<usize> {
    let predicted = scores.argmax(D::Minus1)?;
    let hits = predicted
        .eq(targets)?
        .to_dtype(candle_core::DType::U32)?
        .sum_all()?
        .to_scalar::<u32>()?;
    Ok(hits as usize)
}

/// Run one pass over `loader` in a fresh random order, applying one optimizer
/// step per batch. Non-finite losses are reported, never fatal.
pub fn train_epoch<E, O, R>(
    model: &SarcasmModel<E>,
    loader: &BatchLoader,
    loss_fn: &dyn Loss,
    optimizer: &mut O,
    rng: &mut R,
    progress: &mut dyn ProgressSink,
) -> Result<TrainMetrics>
where
    E: ContextEncoder,
    O: Optimizer,
    R: Rng,
{
    let total = loader.num_batches();
    let mut loss_sum = 0.0f32;
    let mut batches = 0usize;
    let mut correct = 0usize;
    let mut seen = 0usize;

    for batch in loader.shuffled(rng) {
        let batch = batch?;

        let scores = model
            .forward_t(&batch.token_ids, &batch.attention_mask, true)
            .model_context("Training forward pass failed")?;
        let loss = loss_fn
            .compute(&scores, &batch.labels)
            .model_context("Loss computation failed")?;

        // Gradients are rebuilt from scratch by every backward pass
        optimizer
            .backward_step(&loss)
            .model_context("Optimizer step failed")?;

        let loss_value = loss
            .to_scalar::<f32>()
            .model_context("Failed to read loss")?;
        if !loss_value.is_finite() {
            tracing::warn!("Non-finite training loss at batch {}: {}", batches + 1, loss_value);
        }

        loss_sum += loss_value;
        batches += 1;
        correct += count_correct(&scores, &batch.labels)
            .model_context("Failed to score predictions")?;
        seen += batch.size();

        progress.on_batch(&BatchProgress {
            phase: Phase::Train,
            batch: batches,
            total,
            loss: loss_value,
        });
    }

    Ok(TrainMetrics {
        loss: if batches == 0 {
            f32::NAN
        } else {
            loss_sum / batches as f32
        },
        accuracy: if seen == 0 {
            0.0
        } else {
            correct as f32 / seen as f32
        },
    })
}
