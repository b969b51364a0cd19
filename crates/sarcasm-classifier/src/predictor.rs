//! Single-headline inference

use crate::backbone::ContextEncoder;
use crate::classifier::{ClassificationMetadata, ClassificationResult, Classifier};
use crate::encoder::ExampleEncoder;
use crate::model::{SarcasmModel, NUM_CLASSES};
use crate::model_loader::ModelBundle;
use crate::result_ext::ModelResultExt;
use async_trait::async_trait;
use candle_core::{Device, Tensor};
use sarcasm_core::{Error, Label, PredictionResult, Result};
use std::fmt::Display;
use std::time::Instant;

/// A trained model plus its tokenizer, ready to label single headlines.
/// Prediction never mutates the model.
pub struct Predictor<E> {
    model: SarcasmModel<E>,
    encoder: ExampleEncoder,
    device: Device,
    name: String,
}

impl<E: ContextEncoder> Predictor<E> {
    pub fn new(
        model: SarcasmModel<E>,
        encoder: ExampleEncoder,
        device: Device,
        name: impl Into<String>,
    ) -> Self {
        Self {
            model,
            encoder,
            device,
            name: name.into(),
        }
    }

    pub fn from_bundle(bundle: ModelBundle<E>, name: impl Into<String>) -> Self {
        Self::new(bundle.model, bundle.example_encoder, bundle.device, name)
    }

    /// Class probabilities in class-index order
    pub fn probabilities<T: Display + ?Sized>(&self, text: &T) -> Result<[f32; NUM_CLASSES]> {
        let encoded = self.encoder.encode_text(text)?;
        let len = encoded.len();

        let ids = Tensor::from_vec(encoded.token_ids, (1, len), &self.device)
            .model_context("Failed to create input tensor")?;
        let mask = Tensor::from_vec(encoded.attention_mask, (1, len), &self.device)
            .model_context("Failed to create mask tensor")?;

        let scores = self
            .model
            .forward(&ids, &mask)
            .model_context("Model forward pass failed")?;
        let probs = candle_nn::ops::softmax(&scores, 1)
            .and_then(|p| p.squeeze(0))
            .and_then(|p| p.to_vec1::<f32>())
            .model_context("Failed to apply softmax")?;

        probs.try_into().map_err(|p: Vec<f32>| {
            Error::model(format!("Expected {} scores, got {}", NUM_CLASSES, p.len()))
        })
    }

    /// Most probable label and its probability. Ties go to "not sarcastic".
    pub fn predict<T: Display + ?Sized>(&self, text: &T) -> Result<PredictionResult> {
        let probs = self.probabilities(text)?;
        let (index, confidence) = argmax(&probs);
        let label = Label::from_index(index as u32)
            .ok_or_else(|| Error::internal(format!("class index {} out of range", index)))?;

        Ok(PredictionResult { label, confidence })
    }
}

/// First index holding the maximum
fn argmax(values: &[f32; NUM_CLASSES]) -> (usize, f32) {
    values
        .iter()
        .copied()
        .enumerate()
        .fold((0, values[0]), |best, (i, v)| if v > best.1 { (i, v) } else { best })
}

#[async_trait]
impl<E: ContextEncoder + 'static> Classifier for Predictor<E> {
    async fn classify(&self, text: &str) -> Result<ClassificationResult> {
        let start = Instant::now();

        let probs = self.probabilities(text)?;
        let (index, score) = argmax(&probs);
        let label = Label::from_index(index as u32)
            .ok_or_else(|| Error::internal(format!("class index {} out of range", index)))?;

        let all_scores = Label::ALL
            .iter()
            .map(|l| (*l, probs[l.index() as usize]))
            .collect();

        Ok(ClassificationResult {
            label,
            score,
            metadata: ClassificationMetadata {
                model: Some(self.name.clone()),
                all_scores: Some(all_scores),
            },
            latency_us: start.elapsed().as_micros() as u64,
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{seed_parameters, HeadConfig};
    use crate::model_loader::build_lookup_bundle;
    use crate::test_support::word_tokenizer;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn predictor(seed: u64) -> Predictor<crate::backbone::LookupEncoder> {
        let bundle =
            build_lookup_bundle(word_tokenizer(), 16, 8, &HeadConfig::default(), Device::Cpu)
                .unwrap();
        seed_parameters(&bundle.varmap, &mut StdRng::seed_from_u64(seed), None).unwrap();
        Predictor::from_bundle(bundle, "test-model")
    }

    #[test]
    fn test_argmax_ties_go_to_first_class() {
        assert_eq!(argmax(&[0.5, 0.5]), (0, 0.5));
        assert_eq!(argmax(&[0.2, 0.8]), (1, 0.8));
    }

    #[test]
    fn test_confidence_is_predicted_probability() {
        let predictor = predictor(3);
        for text in ["area man shocked", "senate passes budget bill", "", "zebra"] {
            let probs = predictor.probabilities(text).unwrap();
            assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-5);

            let result = predictor.predict(text).unwrap();
            assert!(result.confidence >= 0.5 && result.confidence <= 1.0);
            assert_eq!(result.confidence, probs[result.label.index() as usize]);
        }
    }

    #[test]
    fn test_prediction_is_repeatable() {
        let predictor = predictor(4);
        let a = predictor.predict("the cat sat on the mat").unwrap();
        let b = predictor.predict("the cat sat on the mat").unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_classify_matches_predict() {
        let predictor = predictor(5);
        let result = predictor.classify("area man").await.unwrap();
        let direct = predictor.predict("area man").unwrap();

        assert_eq!(result.label, direct.label);
        assert_eq!(result.score, direct.confidence);
        assert_eq!(predictor.name(), "test-model");
        assert_eq!(result.metadata.all_scores.map(|s| s.len()), Some(2));
    }
}
