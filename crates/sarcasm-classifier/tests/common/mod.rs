//! Offline fixtures for integration tests: an in-memory word-level
//! tokenizer and a tiny, clearly separable headline corpus.

#![allow(dead_code)]

use candle_core::Device;
use sarcasm_classifier::{build_lookup_bundle, HeadConfig, LookupEncoder, ModelBundle};
use sarcasm_core::{Example, Label};
use std::str::FromStr;
use tokenizers::Tokenizer;

pub const MAX_LENGTH: usize = 12;

const WORDS: &[&str] = &[
    "the", "cat", "sat", "on", "mat", "and", "dog", "area", "man", "local", "report", "finally",
    "news", "study", "finds", "senate", "passes", "bill", "budget", "shocked", "nation",
];

pub fn tokenizer() -> Tokenizer {
    let mut vocab = serde_json::Map::new();
    for (id, token) in ["[PAD]", "[CLS]", "[SEP]", "[UNK]"]
        .iter()
        .chain(WORDS.iter())
        .enumerate()
    {
        vocab.insert(token.to_string(), serde_json::json!(id));
    }

    let json = serde_json::json!({
        "version": "1.0",
        "truncation": null,
        "padding": null,
        "added_tokens": [],
        "normalizer": { "type": "Lowercase" },
        "pre_tokenizer": { "type": "Whitespace" },
        "post_processor": {
            "type": "BertProcessing",
            "sep": ["[SEP]", 2],
            "cls": ["[CLS]", 1]
        },
        "decoder": null,
        "model": {
            "type": "WordLevel",
            "vocab": vocab,
            "unk_token": "[UNK]"
        }
    });

    Tokenizer::from_str(&json.to_string()).expect("fixture tokenizer is valid")
}

pub fn head() -> HeadConfig {
    HeadConfig {
        lstm_hidden: 4,
        dropout: 0.1,
    }
}

/// Lookup-encoder model over the fixture tokenizer. Parameters are whatever
/// the variable store initialized them to; seed them before comparing runs.
pub fn bundle() -> ModelBundle<LookupEncoder> {
    bundle_with(&head())
}

pub fn bundle_with(head: &HeadConfig) -> ModelBundle<LookupEncoder> {
    build_lookup_bundle(tokenizer(), MAX_LENGTH, 8, head, Device::Cpu)
        .expect("lookup bundle builds")
}

pub fn headlines() -> Vec<Example> {
    let sarcastic = [
        "area man finally report",
        "area man shocked nation",
        "local area man passes",
        "area man sat on mat",
        "area man and dog",
        "nation shocked area man",
        "area man finds budget",
        "local man finally sat",
    ];
    let plain = [
        "senate passes budget bill",
        "study finds budget",
        "senate bill news",
        "the senate passes",
        "news report on budget",
        "study finds the bill",
        "senate news report",
        "budget bill passes",
    ];

    sarcastic
        .iter()
        .map(|t| Example::new(*t, Label::Sarcastic))
        .chain(plain.iter().map(|t| Example::new(*t, Label::NotSarcastic)))
        .collect()
}
