//! Async classifier seam and its result types

use async_trait::async_trait;
use sarcasm_core::{Label, PredictionResult, Result};

/// Anything that can label a headline from an async context
#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify the given text
    async fn classify(&self, text: &str) -> Result<ClassificationResult>;

    /// Get the classifier name
    fn name(&self) -> &str;
}

/// Result of classification
#[derive(Debug, Clone)]
pub struct ClassificationResult {
    /// Predicted class
    pub label: Label,

    /// Probability of the predicted class (0.0-1.0)
    pub score: f32,

    /// Additional metadata
    pub metadata: ClassificationMetadata,

    /// Latency in microseconds
    pub latency_us: u64,
}

impl ClassificationResult {
    /// The label and confidence alone, as printed by the CLI
    pub fn prediction(&self) -> PredictionResult {
        PredictionResult {
            label: self.label,
            confidence: self.score,
        }
    }
}

/// Metadata about classification
#[derive(Debug, Clone, Default)]
pub struct ClassificationMetadata {
    /// Model name or checkpoint
    pub model: Option<String>,

    /// Probability of every class, in class-index order
    pub all_scores: Option<Vec<(Label, f32)>>,
}
