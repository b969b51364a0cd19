//! Contextual encoders that turn token ids into one vector per position
//!
//! The classifier only depends on the [`ContextEncoder`] trait. The BERT
//! backbone is the production implementation; [`LookupEncoder`] is a plain
//! embedding table with the same contract, used where loading a pretrained
//! transformer is unnecessary (tests, benchmarks, smoke runs).

use crate::bert::BertEncoder;
use candle_core::{DType, Result, Tensor};
use candle_nn::{Embedding, Module, VarBuilder};
use candle_transformers::models::bert::Config as BertConfig;

/// Variable-store prefix under which every encoder parameter lives.
///
/// Everything outside this prefix belongs to the layers stacked on top of the
/// encoder and is initialized from the training seed.
pub const ENCODER_PREFIX: &str = "encoder";

/// Produces contextual hidden states for a batch of token sequences
pub trait ContextEncoder: Send + Sync {
    /// Width of each per-position vector
    fn hidden_size(&self) -> usize;

    /// `token_ids`, `attention_mask`: `[batch, seq_len]` u32.
    /// Returns `[batch, seq_len, hidden_size]` f32. Padded positions must not
    /// influence the vectors of real positions. `train` enables any dropout
    /// the encoder carries.
    fn encode(&self, token_ids: &Tensor, attention_mask: &Tensor, train: bool) -> Result<Tensor>;
}

/// Pretrained BERT encoder, fine-tuned along with the head
pub struct BertBackbone {
    model: BertEncoder,
    hidden_size: usize,
}

impl BertBackbone {
    /// Build the encoder layers; weights come from whatever backs `vb`
    pub fn load(vb: VarBuilder, config: &BertConfig) -> Result<Self> {
        let model = BertEncoder::load(vb, config)?;
        Ok(Self {
            model,
            hidden_size: config.hidden_size,
        })
    }
}

impl ContextEncoder for BertBackbone {
    fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    fn encode(&self, token_ids: &Tensor, attention_mask: &Tensor, train: bool) -> Result<Tensor> {
        self.model.forward_t(token_ids, attention_mask, train)
    }
}

/// Embedding-table encoder with no cross-position interaction
pub struct LookupEncoder {
    embeddings: Embedding,
    hidden_size: usize,
}

impl LookupEncoder {
    pub fn new(vocab_size: usize, hidden_size: usize, vb: VarBuilder) -> Result<Self> {
        let embeddings = candle_nn::embedding(vocab_size, hidden_size, vb.pp("embeddings"))?;
        Ok(Self {
            embeddings,
            hidden_size,
        })
    }
}

impl ContextEncoder for LookupEncoder {
    fn hidden_size(&self) -> usize {
        self.hidden_size
    }

    fn encode(&self, token_ids: &Tensor, attention_mask: &Tensor, _train: bool) -> Result<Tensor> {
        let hidden = self.embeddings.forward(token_ids)?;
        // Zero out padding so it carries no token information downstream
        let mask = attention_mask.to_dtype(DType::F32)?.unsqueeze(2)?;
        hidden.broadcast_mul(&mask)
    }
}
