//! Core types for the sarcasm classifier

use serde::{Deserialize, Serialize};
use std::fmt;

/// The two classes a headline can belong to.
///
/// Class indices follow the label mapping used for training:
/// `NotSarcastic` is 0 and `Sarcastic` is 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Label {
    #[serde(rename = "not sarcastic")]
    NotSarcastic,
    #[serde(rename = "sarcastic")]
    Sarcastic,
}

impl Label {
    /// The only raw label token mapped to the positive class
    pub const SARCASTIC_TOKEN: &'static str = "sarcastic";

    /// Both labels, ordered by class index
    pub const ALL: [Label; 2] = [Label::NotSarcastic, Label::Sarcastic];

    /// Map a raw dataset label token to a class.
    ///
    /// Only the exact token `"sarcastic"` is positive; every other value,
    /// including differently-cased variants, is negative.
    pub fn from_token(token: &str) -> Self {
        if token == Self::SARCASTIC_TOKEN {
            Self::Sarcastic
        } else {
            Self::NotSarcastic
        }
    }

    /// Class index used as the training target
    pub fn index(self) -> u32 {
        match self {
            Self::NotSarcastic => 0,
            Self::Sarcastic => 1,
        }
    }

    /// Class for a model output index, `None` outside {0, 1}
    pub fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(Self::NotSarcastic),
            1 => Some(Self::Sarcastic),
            _ => None,
        }
    }

    /// Human readable name
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotSarcastic => "not sarcastic",
            Self::Sarcastic => "sarcastic",
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single labelled headline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    /// Headline text
    pub text: String,

    /// Ground truth class
    pub label: Label,
}

impl Example {
    /// Create an example with an already-resolved label
    pub fn new(text: impl Into<String>, label: Label) -> Self {
        Self {
            text: text.into(),
            label,
        }
    }

    /// Create an example from a raw dataset label token
    pub fn from_token(text: impl Into<String>, token: &str) -> Self {
        Self::new(text, Label::from_token(token))
    }
}

/// Fixed-length numeric encoding of an example
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedExample {
    /// Token ids, padded or truncated to the configured maximum length
    pub token_ids: Vec<u32>,

    /// 1 for real tokens, 0 for padding; same length as `token_ids`
    pub attention_mask: Vec<u32>,

    /// Class index in {0, 1}
    pub label: u32,
}

impl EncodedExample {
    /// Sequence length of the encoding
    pub fn len(&self) -> usize {
        self.token_ids.len()
    }

    /// True when the encoding holds no positions
    pub fn is_empty(&self) -> bool {
        self.token_ids.is_empty()
    }

    /// Number of non-padding positions
    pub fn real_tokens(&self) -> usize {
        self.attention_mask.iter().filter(|&&m| m == 1).count()
    }
}

/// Outcome of classifying one headline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Predicted class
    #[serde(rename = "prediction")]
    pub label: Label,

    /// Softmax probability of the predicted class
    pub confidence: f32,
}
