//! Example encoder: raw text + label → fixed-length token ids and mask

use sarcasm_core::{EncodedExample, Error, Example, Label, Result};
use std::fmt::Display;
use std::path::Path;
use tokenizers::{
    Encoding, PaddingDirection, PaddingParams, PaddingStrategy, Tokenizer, TruncationParams,
};

/// Default fixed sequence length
pub const DEFAULT_MAX_LENGTH: usize = 128;

/// Wraps a subword tokenizer configured to always emit exactly `max_length`
/// positions (padding short inputs, truncating long ones).
#[derive(Clone)]
pub struct ExampleEncoder {
    tokenizer: Tokenizer,
    max_length: usize,
}

impl ExampleEncoder {
    /// Configure `tokenizer` for fixed-length output.
    ///
    /// The pad token is taken from the tokenizer's existing padding settings,
    /// else `[PAD]` from its vocabulary, else id 0.
    pub fn new(mut tokenizer: Tokenizer, max_length: usize) -> Result<Self> {
        if max_length == 0 {
            return Err(Error::config("max_length must be greater than zero"));
        }

        let (pad_id, pad_token) = match tokenizer.get_padding() {
            Some(existing) => (existing.pad_id, existing.pad_token.clone()),
            None => match tokenizer.token_to_id("[PAD]") {
                Some(id) => (id, "[PAD]".to_string()),
                None => (0, "[PAD]".to_string()),
            },
        };

        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::Fixed(max_length),
            direction: PaddingDirection::Right,
            pad_id,
            pad_token,
            ..Default::default()
        }));
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length,
                ..Default::default()
            }))
            .map_err(|e| Error::tokenizer(format!("Failed to configure truncation: {}", e)))?;

        Ok(Self {
            tokenizer,
            max_length,
        })
    }

    /// Load a `tokenizer.json` and configure it for fixed-length output
    pub fn from_file(path: impl AsRef<Path>, max_length: usize) -> Result<Self> {
        let path = path.as_ref();
        let tokenizer = Tokenizer::from_file(path).map_err(|e| {
            Error::tokenizer(format!(
                "Failed to load tokenizer {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::new(tokenizer, max_length)
    }

    /// Encode any displayable value with a raw label token.
    ///
    /// Non-string inputs are rendered with `Display` before tokenizing.
    /// Only the exact label token `"sarcastic"` maps to class 1.
    pub fn encode<T: Display + ?Sized>(&self, text: &T, label_token: &str) -> Result<EncodedExample> {
        self.encode_with_label(&text.to_string(), Label::from_token(label_token))
    }

    /// Encode an example whose label is already resolved
    pub fn encode_example(&self, example: &Example) -> Result<EncodedExample> {
        self.encode_with_label(&example.text, example.label)
    }

    /// Encode text with no meaningful label (inference); the label is 0
    pub fn encode_text<T: Display + ?Sized>(&self, text: &T) -> Result<EncodedExample> {
        self.encode_with_label(&text.to_string(), Label::NotSarcastic)
    }

    /// Encode many examples in one tokenizer call
    pub fn encode_all(&self, examples: &[Example]) -> Result<Vec<EncodedExample>> {
        let texts: Vec<String> = examples.iter().map(|e| e.text.clone()).collect();
        let encodings = self
            .tokenizer
            .encode_batch(texts, true)
            .map_err(|e| Error::tokenizer(format!("Batch tokenization failed: {}", e)))?;

        encodings
            .iter()
            .zip(examples)
            .map(|(encoding, example)| self.package(encoding, example.label))
            .collect()
    }

    /// Fixed output length
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    /// The configured tokenizer
    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    fn encode_with_label(&self, text: &str, label: Label) -> Result<EncodedExample> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| Error::tokenizer(format!("Tokenization failed: {}", e)))?;
        self.package(&encoding, label)
    }

    fn package(&self, encoding: &Encoding, label: Label) -> Result<EncodedExample> {
        let token_ids = encoding.get_ids().to_vec();
        let attention_mask = encoding.get_attention_mask().to_vec();

        if token_ids.len() != self.max_length || attention_mask.len() != self.max_length {
            return Err(Error::tokenizer(format!(
                "Tokenizer produced {} ids and {} mask values, expected {}",
                token_ids.len(),
                attention_mask.len(),
                self.max_length
            )));
        }

        Ok(EncodedExample {
            token_ids,
            attention_mask,
            label: label.index(),
        })
    }
}
