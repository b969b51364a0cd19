//! Validation pass: mean loss, classification report and confusion matrix

use crate::backbone::ContextEncoder;
use crate::dataset::BatchLoader;
use crate::model::SarcasmModel;
use crate::progress::{BatchProgress, Phase, ProgressSink};
use crate::report::{ClassificationReport, ConfusionMatrix};
use crate::result_ext::ModelResultExt;
use crate::trainer::Loss;
use candle_core::D;
use sarcasm_core::Result;

/// Outcome of one evaluation pass
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Mean of the per-batch losses (NaN when there were no batches)
    pub mean_loss: f32,
    pub report: ClassificationReport,
    pub confusion: ConfusionMatrix,
}

impl Evaluation {
    pub fn accuracy(&self) -> f64 {
        self.report.accuracy
    }
}

/// Score every batch in stored order without dropout or parameter updates
pub fn evaluate<E: ContextEncoder>(
    model: &SarcasmModel<E>,
    loader: &BatchLoader,
    loss_fn: &dyn Loss,
    progress: &mut dyn ProgressSink,
) -> Result<Evaluation> {
    let total = loader.num_batches();
    let mut loss_sum = 0.0f32;
    let mut batches = 0usize;
    let mut truth: Vec<u32> = Vec::with_capacity(loader.len());
    let mut predicted: Vec<u32> = Vec::with_capacity(loader.len());

    for batch in loader.sequential() {
        let batch = batch?;

        let scores = model
            .forward(&batch.token_ids, &batch.attention_mask)
            .model_context("Evaluation forward pass failed")?;
        let loss_value = loss_fn
            .compute(&scores, &batch.labels)
            .and_then(|loss| loss.to_scalar::<f32>())
            .model_context("Loss computation failed")?;

        predicted.extend(
            scores
                .argmax(D::Minus1)
                .and_then(|p| p.to_vec1::<u32>())
                .model_context("Failed to read predictions")?,
        );
        truth.extend(
            batch
                .labels
                .to_vec1::<u32>()
                .model_context("Failed to read labels")?,
        );

        loss_sum += loss_value;
        batches += 1;

        progress.on_batch(&BatchProgress {
            phase: Phase::Eval,
            batch: batches,
            total,
            loss: loss_value,
        });
    }

    let confusion = ConfusionMatrix::from_labels(&truth, &predicted);
    Ok(Evaluation {
        mean_loss: if batches == 0 {
            f32::NAN
        } else {
            loss_sum / batches as f32
        },
        report: ClassificationReport::from_confusion(&confusion),
        confusion,
    })
}
