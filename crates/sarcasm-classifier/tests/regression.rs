//! Regression targets for a converged model trained on the full headline
//! corpus. They need the pretrained encoder and a trained checkpoint, so they
//! only build with the `pretrained-models` feature and are ignored by default.
//!
//! Run with:
//! SARCASM_CHECKPOINT=best_sarcasm_model.safetensors \
//!     cargo test -p sarcasm-classifier --features pretrained-models -- --ignored

#![cfg(feature = "pretrained-models")]

use sarcasm_classifier::{build_from_checkpoint, CheckpointStore, Predictor, TrainingConfig};
use sarcasm_core::Label;

fn predictor() -> Predictor<sarcasm_classifier::BertBackbone> {
    let checkpoint = std::env::var("SARCASM_CHECKPOINT")
        .unwrap_or_else(|_| "best_sarcasm_model.safetensors".to_string());
    let config = TrainingConfig::default();
    let bundle = build_from_checkpoint(&config, &CheckpointStore::new(checkpoint))
        .expect("trained checkpoint is available");
    Predictor::from_bundle(bundle, "bert-bilstm")
}

#[test]
#[ignore]
fn onion_style_headline_is_sarcastic() {
    let result = predictor()
        .predict("mr. falafel' owner does not actually like being addressed as mr. falafel")
        .unwrap();
    assert_eq!(result.label, Label::Sarcastic);
    assert!(result.confidence >= 0.9, "confidence {}", result.confidence);
}

#[test]
#[ignore]
fn news_headline_is_not_sarcastic() {
    let result = predictor()
        .predict("scalia's utter moral failure exposed")
        .unwrap();
    assert_eq!(result.label, Label::NotSarcastic);
    assert!(result.confidence >= 0.9, "confidence {}", result.confidence);
}
