//! Fine-tunable BERT encoder
//!
//! Parameter names follow the Hugging Face layout (`embeddings.*`,
//! `encoder.layer.N.*`) so a pretrained `model.safetensors` imports without
//! remapping. Every step, layer normalization included, is composed from
//! differentiable tensor ops, so gradients reach all encoder weights.

use candle_core::{DType, Result, Tensor, D};
use candle_nn::{Dropout, Embedding, Init, Linear, Module, VarBuilder};
use candle_transformers::models::bert::{Config, HiddenAct};

/// `(x - mean) / sqrt(var + eps) * weight + bias` over the last dimension
pub struct LayerNorm {
    weight: Tensor,
    bias: Tensor,
    eps: f64,
}

impl LayerNorm {
    pub fn load(size: usize, eps: f64, vb: VarBuilder) -> Result<Self> {
        Ok(Self {
            weight: vb.get_with_hints(size, "weight", Init::Const(1.0))?,
            bias: vb.get_with_hints(size, "bias", Init::Const(0.0))?,
            eps,
        })
    }
}

impl Module for LayerNorm {
    fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let mean = xs.mean_keepdim(D::Minus1)?;
        let centered = xs.broadcast_sub(&mean)?;
        let var = centered.sqr()?.mean_keepdim(D::Minus1)?;
        let std = (var + self.eps)?.sqrt()?;
        centered
            .broadcast_div(&std)?
            .broadcast_mul(&self.weight)?
            .broadcast_add(&self.bias)
    }
}

fn activate(act: HiddenAct, xs: &Tensor) -> Result<Tensor> {
    match act {
        HiddenAct::Gelu => xs.gelu_erf(),
        HiddenAct::GeluApproximate => xs.gelu(),
        HiddenAct::Relu => xs.relu(),
    }
}

struct Embeddings {
    word: Embedding,
    position: Embedding,
    token_type: Embedding,
    norm: LayerNorm,
    dropout: Dropout,
    max_positions: usize,
}

impl Embeddings {
    fn load(vb: VarBuilder, config: &Config) -> Result<Self> {
        let hidden = config.hidden_size;
        Ok(Self {
            word: candle_nn::embedding(config.vocab_size, hidden, vb.pp("word_embeddings"))?,
            position: candle_nn::embedding(
                config.max_position_embeddings,
                hidden,
                vb.pp("position_embeddings"),
            )?,
            token_type: candle_nn::embedding(
                config.type_vocab_size,
                hidden,
                vb.pp("token_type_embeddings"),
            )?,
            norm: LayerNorm::load(hidden, config.layer_norm_eps, vb.pp("LayerNorm"))?,
            dropout: Dropout::new(config.hidden_dropout_prob as f32),
            max_positions: config.max_position_embeddings,
        })
    }

    /// Single-segment input: every token type is 0
    fn forward(&self, token_ids: &Tensor, train: bool) -> Result<Tensor> {
        let seq_len = token_ids.dim(1)?;
        if seq_len > self.max_positions {
            candle_core::bail!(
                "sequence length {} exceeds {} position embeddings",
                seq_len,
                self.max_positions
            );
        }

        let positions = Tensor::arange(0u32, seq_len as u32, token_ids.device())?;
        let xs = self
            .word
            .forward(token_ids)?
            .broadcast_add(&self.position.forward(&positions)?)?;
        let xs = (xs + self.token_type.forward(&token_ids.zeros_like()?)?)?;

        self.dropout.forward(&self.norm.forward(&xs)?, train)
    }
}

struct SelfAttention {
    query: Linear,
    key: Linear,
    value: Linear,
    dropout: Dropout,
    num_heads: usize,
    head_size: usize,
}

impl SelfAttention {
    fn load(vb: VarBuilder, config: &Config) -> Result<Self> {
        let hidden = config.hidden_size;
        if hidden % config.num_attention_heads != 0 {
            candle_core::bail!(
                "hidden size {} is not a multiple of {} attention heads",
                hidden,
                config.num_attention_heads
            );
        }
        Ok(Self {
            query: candle_nn::linear(hidden, hidden, vb.pp("query"))?,
            key: candle_nn::linear(hidden, hidden, vb.pp("key"))?,
            value: candle_nn::linear(hidden, hidden, vb.pp("value"))?,
            dropout: Dropout::new(config.hidden_dropout_prob as f32),
            num_heads: config.num_attention_heads,
            head_size: hidden / config.num_attention_heads,
        })
    }

    /// `[B, L, H]` → `[B, heads, L, head_size]`
    fn split_heads(&self, xs: &Tensor) -> Result<Tensor> {
        let (batch, seq_len, _) = xs.dims3()?;
        xs.reshape((batch, seq_len, self.num_heads, self.head_size))?
            .transpose(1, 2)?
            .contiguous()
    }

    /// `mask_bias`: `[B, 1, 1, L]`, 0 for real tokens and a large negative
    /// value for padding
    fn forward(&self, xs: &Tensor, mask_bias: &Tensor, train: bool) -> Result<Tensor> {
        let (batch, seq_len, hidden) = xs.dims3()?;
        let query = self.split_heads(&self.query.forward(xs)?)?;
        let key = self.split_heads(&self.key.forward(xs)?)?;
        let value = self.split_heads(&self.value.forward(xs)?)?;

        let scores = (query.matmul(&key.t()?)? / (self.head_size as f64).sqrt())?;
        let scores = scores.broadcast_add(mask_bias)?;
        let probs = candle_nn::ops::softmax(&scores, D::Minus1)?;
        let probs = self.dropout.forward(&probs, train)?;

        probs
            .matmul(&value)?
            .transpose(1, 2)?
            .contiguous()?
            .reshape((batch, seq_len, hidden))
    }
}

struct Layer {
    attention: SelfAttention,
    attention_output: Linear,
    attention_norm: LayerNorm,
    intermediate: Linear,
    output: Linear,
    output_norm: LayerNorm,
    act: HiddenAct,
    dropout: Dropout,
}

impl Layer {
    fn load(vb: VarBuilder, config: &Config) -> Result<Self> {
        let hidden = config.hidden_size;
        let eps = config.layer_norm_eps;
        let attention_vb = vb.pp("attention");
        Ok(Self {
            attention: SelfAttention::load(attention_vb.pp("self"), config)?,
            attention_output: candle_nn::linear(
                hidden,
                hidden,
                attention_vb.pp("output").pp("dense"),
            )?,
            attention_norm: LayerNorm::load(hidden, eps, attention_vb.pp("output").pp("LayerNorm"))?,
            intermediate: candle_nn::linear(
                hidden,
                config.intermediate_size,
                vb.pp("intermediate").pp("dense"),
            )?,
            output: candle_nn::linear(
                config.intermediate_size,
                hidden,
                vb.pp("output").pp("dense"),
            )?,
            output_norm: LayerNorm::load(hidden, eps, vb.pp("output").pp("LayerNorm"))?,
            act: config.hidden_act,
            dropout: Dropout::new(config.hidden_dropout_prob as f32),
        })
    }

    fn forward(&self, xs: &Tensor, mask_bias: &Tensor, train: bool) -> Result<Tensor> {
        let attended = self.attention.forward(xs, mask_bias, train)?;
        let attended = self
            .dropout
            .forward(&self.attention_output.forward(&attended)?, train)?;
        let xs = self.attention_norm.forward(&(attended + xs)?)?;

        let inner = activate(self.act, &self.intermediate.forward(&xs)?)?;
        let out = self.dropout.forward(&self.output.forward(&inner)?, train)?;
        self.output_norm.forward(&(out + xs)?)
    }
}

/// Embeddings followed by a stack of transformer layers
pub struct BertEncoder {
    embeddings: Embeddings,
    layers: Vec<Layer>,
}

impl BertEncoder {
    pub fn load(vb: VarBuilder, config: &Config) -> Result<Self> {
        let embeddings = Embeddings::load(vb.pp("embeddings"), config)?;
        let layers = (0..config.num_hidden_layers)
            .map(|i| Layer::load(vb.pp("encoder").pp("layer").pp(i), config))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { embeddings, layers })
    }

    /// `token_ids`, `attention_mask`: `[B, L]` u32 → `[B, L, hidden]`.
    /// `train` enables the hidden and attention dropout.
    pub fn forward_t(
        &self,
        token_ids: &Tensor,
        attention_mask: &Tensor,
        train: bool,
    ) -> Result<Tensor> {
        let mask_bias = mask_bias(attention_mask)?;
        let mut xs = self.embeddings.forward(token_ids, train)?;
        for layer in &self.layers {
            xs = layer.forward(&xs, &mask_bias, train)?;
        }
        Ok(xs)
    }
}

/// `[B, L]` mask → `[B, 1, 1, L]` additive bias
fn mask_bias(attention_mask: &Tensor) -> Result<Tensor> {
    let mask = attention_mask.to_dtype(DType::F32)?.unsqueeze(1)?.unsqueeze(1)?;
    (mask.ones_like()? - mask)? * f64::from(f32::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::tiny_bert_config;
    use candle_core::{Device, IndexOp};
    use candle_nn::VarMap;

    fn build() -> (VarMap, BertEncoder) {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let encoder = BertEncoder::load(vb, &tiny_bert_config(30)).unwrap();
        (varmap, encoder)
    }

    #[test]
    fn test_layer_norm_normalizes_last_dim() {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let norm = LayerNorm::load(4, 1e-12, vb).unwrap();

        let xs = Tensor::new(&[[1f32, 2.0, 3.0, 4.0]], &Device::Cpu).unwrap();
        let out = norm.forward(&xs).unwrap().to_vec2::<f32>().unwrap();
        let mean: f32 = out[0].iter().sum::<f32>() / 4.0;
        let var: f32 = out[0].iter().map(|v| (v - mean).powi(2)).sum::<f32>() / 4.0;
        assert!(mean.abs() < 1e-5);
        assert!((var - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_parameter_names_follow_pretrained_layout() {
        let (varmap, _encoder) = build();
        let data = varmap.data().lock().unwrap();
        for name in [
            "embeddings.word_embeddings.weight",
            "embeddings.position_embeddings.weight",
            "embeddings.token_type_embeddings.weight",
            "embeddings.LayerNorm.weight",
            "encoder.layer.0.attention.self.query.weight",
            "encoder.layer.0.attention.output.dense.bias",
            "encoder.layer.0.attention.output.LayerNorm.weight",
            "encoder.layer.1.intermediate.dense.weight",
            "encoder.layer.1.output.LayerNorm.bias",
        ] {
            assert!(data.contains_key(name), "missing {}", name);
        }
    }

    #[test]
    fn test_padding_does_not_reach_real_positions() {
        let (_varmap, encoder) = build();
        let device = Device::Cpu;
        let ids = Tensor::new(&[[1u32, 5, 7, 2, 0, 0], [1, 5, 7, 2, 9, 9]], &device).unwrap();
        let mask = Tensor::new(&[[1u32, 1, 1, 1, 0, 0], [1, 1, 1, 1, 0, 0]], &device).unwrap();

        let hidden = encoder.forward_t(&ids, &mask, false).unwrap();
        assert_eq!(hidden.dims(), &[2, 6, 8]);

        let a = hidden.i((0, 0..4)).unwrap().flatten_all().unwrap();
        let b = hidden.i((1, 0..4)).unwrap().flatten_all().unwrap();
        let diff = (a - b)
            .unwrap()
            .abs()
            .unwrap()
            .max(0)
            .unwrap()
            .to_scalar::<f32>()
            .unwrap();
        assert!(diff < 1e-5, "max diff {}", diff);
    }

    #[test]
    fn test_too_long_sequence_rejected() {
        let (_varmap, encoder) = build();
        let ids = Tensor::zeros((1, 40), DType::U32, &Device::Cpu).unwrap();
        let mask = Tensor::ones((1, 40), DType::U32, &Device::Cpu).unwrap();
        assert!(encoder.forward_t(&ids, &mask, false).is_err());
    }
}
