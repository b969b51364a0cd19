//! Offline fixtures shared by unit tests

use candle_transformers::models::bert::Config as BertConfig;
use sarcasm_core::{Example, Label};
use std::str::FromStr;
use tokenizers::Tokenizer;

const WORDS: &[&str] = &[
    "the", "cat", "sat", "on", "mat", "and", "dog", "area", "man", "local", "report", "finally",
    "news", "study", "finds", "senate", "passes", "bill", "budget", "shocked", "nation",
];

/// Word-level tokenizer JSON with BERT-style special tokens:
/// `[PAD]`=0, `[CLS]`=1, `[SEP]`=2, `[UNK]`=3, then `WORDS`.
pub(crate) fn word_tokenizer_json() -> String {
    let mut vocab = serde_json::Map::new();
    for (id, token) in ["[PAD]", "[CLS]", "[SEP]", "[UNK]"]
        .iter()
        .chain(WORDS.iter())
        .enumerate()
    {
        vocab.insert(token.to_string(), serde_json::json!(id));
    }

    serde_json::json!({
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
    })
    .to_string()
}

pub(crate) fn word_tokenizer() -> Tokenizer {
    Tokenizer::from_str(&word_tokenizer_json()).expect("fixture tokenizer is valid")
}

/// Two-layer BERT small enough to train in a unit test
pub(crate) fn tiny_bert_config(vocab_size: usize) -> BertConfig {
    serde_json::from_value(serde_json::json!({
        "vocab_size": vocab_size,
        "hidden_size": 8,
        "num_hidden_layers": 2,
        "num_attention_heads": 2,
        "intermediate_size": 16,
        "hidden_act": "gelu",
        "hidden_dropout_prob": 0.1,
        "max_position_embeddings": 32,
        "type_vocab_size": 2,
        "initializer_range": 0.02,
        "layer_norm_eps": 1e-12,
        "pad_token_id": 0
    }))
    .expect("fixture BERT config is valid")
}

/// Small, clearly separable corpus: sarcastic headlines all contain "area man"
pub(crate) fn toy_examples() -> Vec<Example> {
    let sarcastic = [
        "area man finally report",
        "area man shocked nation",
        "local area man passes",
        "area man sat on mat",
        "area man and dog",
        "nation shocked area man",
    ];
    let plain = [
        "senate passes budget bill",
        "study finds budget",
        "senate bill news",
        "the senate passes",
        "news report on budget",
        "study finds the bill",
    ];

    sarcastic
        .iter()
        .map(|t| Example::new(*t, Label::Sarcastic))
        .chain(plain.iter().map(|t| Example::new(*t, Label::NotSarcastic)))
        .collect()
}
