//! Sequence classifier: contextual encoder + BiLSTM + fusion + max-pool head

use crate::backbone::ContextEncoder;
use crate::recurrent::BiLstm;
use candle_core::{Result, Tensor, D};
use candle_nn::{Dropout, Linear, Module, VarBuilder, VarMap};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Number of output classes
pub const NUM_CLASSES: usize = 2;

/// Sizes of the layers stacked on top of the encoder
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeadConfig {
    /// LSTM hidden size per direction
    pub lstm_hidden: usize,

    /// Dropout rate applied to the pooled vector during training
    pub dropout: f32,
}

impl Default for HeadConfig {
    fn default() -> Self {
        Self {
            lstm_hidden: 64,
            dropout: 0.1,
        }
    }
}

/// Headline classifier producing two unnormalized class scores.
///
/// Pipeline per batch:
/// 1. encoder → `H [B, L, hidden]` (fine-tuned, so it sees `train` too)
/// 2. BiLSTM → `R [B, L, 2 * lstm_hidden]`
/// 3. `tanh(fusion([H ‖ R]))` → `[B, L, hidden]`
/// 4. max over positions → `[B, hidden]`
/// 5. dropout (training only) → linear → `[B, 2]`
pub struct SarcasmModel<E> {
    encoder: E,
    recurrent: BiLstm,
    fusion: Linear,
    dropout: Dropout,
    classifier: Linear,
}

impl<E: ContextEncoder> SarcasmModel<E> {
    /// Stack the head layers on an already-built encoder. The head parameters
    /// are registered in `vb` under `recurrent`, `fusion` and `classifier`.
    pub fn new(encoder: E, config: &HeadConfig, vb: VarBuilder) -> Result<Self> {
        let hidden = encoder.hidden_size();
        let recurrent = BiLstm::new(hidden, config.lstm_hidden, vb.pp("recurrent"))?;
        let fusion = candle_nn::linear(hidden + recurrent.output_size(), hidden, vb.pp("fusion"))?;
        let classifier = candle_nn::linear(hidden, NUM_CLASSES, vb.pp("classifier"))?;

        Ok(Self {
            encoder,
            recurrent,
            fusion,
            dropout: Dropout::new(config.dropout),
            classifier,
        })
    }

    /// Class scores in evaluation mode (no dropout)
    pub fn forward(&self, token_ids: &Tensor, attention_mask: &Tensor) -> Result<Tensor> {
        self.forward_t(token_ids, attention_mask, false)
    }

    /// Class scores; `train` enables dropout
    pub fn forward_t(
        &self,
        token_ids: &Tensor,
        attention_mask: &Tensor,
        train: bool,
    ) -> Result<Tensor> {
        let hidden = self.encoder.encode(token_ids, attention_mask, train)?;
        let recurrent = self.recurrent.forward(&hidden)?;

        let fused = Tensor::cat(&[&hidden, &recurrent], D::Minus1)?;
        let fused = self.fusion.forward(&fused)?.tanh()?;

        // Per-feature maximum over every position, padding included
        let pooled = fused.max(1)?;
        let pooled = self.dropout.forward(&pooled, train)?;

        self.classifier.forward(&pooled)
    }

    /// The underlying contextual encoder
    pub fn encoder(&self) -> &E {
        &self.encoder
    }
}

/// Overwrite parameters with values drawn from `rng`, visiting variables in
/// name order so the same seed always produces the same weights.
///
/// Matrices are drawn from `U(-1/sqrt(fan_in), 1/sqrt(fan_in))` where
/// `fan_in` is the last dimension; vectors (biases) are zeroed. Variables
/// whose name starts with `skip_prefix` (pretrained weights) are left alone.
/// Returns the number of variables that were reset.
pub fn seed_parameters<R: Rng>(
    varmap: &VarMap,
    rng: &mut R,
    skip_prefix: Option<&str>,
) -> Result<usize> {
    let data = varmap
        .data()
        .lock()
        .map_err(|_| candle_core::Error::Msg("variable store lock poisoned".to_string()))?;

    let mut names: Vec<&String> = data
        .keys()
        .filter(|name| match skip_prefix {
            Some(prefix) => !name.starts_with(&format!("{}.", prefix)),
            None => true,
        })
        .collect();
    names.sort();

    for name in &names {
        let var = &data[*name];
        let shape = var.shape().clone();
        let dims = shape.dims();
        let values: Vec<f32> = if dims.len() >= 2 {
            let fan_in = dims[dims.len() - 1].max(1) as f32;
            let bound = 1.0 / fan_in.sqrt();
            (0..shape.elem_count())
                .map(|_| rng.gen_range(-bound..bound))
                .collect()
        } else {
            vec![0.0; shape.elem_count()]
        };
        let tensor = Tensor::from_vec(values, shape, var.device())?.to_dtype(var.dtype())?;
        var.set(&tensor)?;
    }

    Ok(names.len())
}
