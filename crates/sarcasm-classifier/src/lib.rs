//! Sarcasm Classifier
//!
//! Headline sarcasm detection with a fine-tuned BERT encoder, a bidirectional
//! LSTM over its token states and a max-pooled linear head.
//!
//! The crate covers the whole lifecycle:
//! - Dataset loading, stratified splitting and batching
//! - Pretrained encoder resolution (local directory or Hugging Face Hub)
//! - Epoch training, evaluation reports and best-model checkpointing
//! - Single-headline inference behind an async [`Classifier`] seam
//!
//! Everything runs on CPU by default; enable the `cuda` or `metal` feature
//! for GPU execution.

pub mod backbone;
pub mod bert;
pub mod checkpoint;
pub mod classifier;
pub mod config;
pub mod dataset;
pub mod encoder;
pub mod evaluator;
pub mod model;
pub mod model_loader;
pub mod orchestrator;
pub mod predictor;
pub mod progress;
pub mod recurrent;
pub mod report;
pub mod trainer;

mod result_ext;

#[cfg(test)]
mod test_support;

pub use backbone::{BertBackbone, ContextEncoder, LookupEncoder};
pub use checkpoint::CheckpointStore;
pub use classifier::{ClassificationMetadata, ClassificationResult, Classifier};
pub use config::{DeviceSpec, PretrainedSource, TrainingConfig};
pub use dataset::{load_examples, stratified_split, Batch, BatchLoader};
pub use encoder::ExampleEncoder;
pub use evaluator::{evaluate, Evaluation};
pub use model::{HeadConfig, SarcasmModel};
pub use model_loader::{
    build_from_checkpoint, build_lookup_bundle, build_pretrained_bundle, DeviceType, ModelBundle,
};
pub use orchestrator::{EpochSummary, TrainingOrchestrator, TrainingOutcome};
pub use predictor::Predictor;
pub use progress::{BatchProgress, NoProgress, Phase, ProgressSink, TracingProgress};
pub use report::{ClassMetrics, ClassificationReport, ConfusionMatrix};
pub use trainer::{train_epoch, CrossEntropyLoss, Loss, TrainMetrics};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::classifier::{ClassificationResult, Classifier};
    pub use crate::config::TrainingConfig;
    pub use crate::model_loader::{DeviceType, ModelBundle};
    pub use crate::orchestrator::TrainingOrchestrator;
    pub use crate::predictor::Predictor;
    pub use sarcasm_core::prelude::*;
}
