//! Bidirectional LSTM over a batch of sequences

use candle_core::{Result, Tensor, D};
use candle_nn::rnn::{LSTMConfig, LSTM, RNN};
use candle_nn::VarBuilder;

/// Two independent LSTMs, one reading left-to-right and one right-to-left.
/// Their per-position hidden states are concatenated, so the output width is
/// `2 * hidden_size`.
pub struct BiLstm {
    forward_lstm: LSTM,
    backward_lstm: LSTM,
    hidden_size: usize,
}

impl BiLstm {
    pub fn new(input_size: usize, hidden_size: usize, vb: VarBuilder) -> Result<Self> {
        let forward_lstm = candle_nn::rnn::lstm(
            input_size,
            hidden_size,
            LSTMConfig::default(),
            vb.pp("forward"),
        )?;
        let backward_lstm = candle_nn::rnn::lstm(
            input_size,
            hidden_size,
            LSTMConfig::default(),
            vb.pp("backward"),
        )?;
        Ok(Self {
            forward_lstm,
            backward_lstm,
            hidden_size,
        })
    }

    /// Output width per position
    pub fn output_size(&self) -> usize {
        2 * self.hidden_size
    }

    /// `xs`: `[batch, seq_len, input_size]` → `[batch, seq_len, 2 * hidden_size]`
    pub fn forward(&self, xs: &Tensor) -> Result<Tensor> {
        let seq_len = xs.dim(1)?;

        let forward_states = self.forward_lstm.seq(xs)?;
        let forward_out = self.forward_lstm.states_to_tensor(&forward_states)?;

        // Run the second LSTM over the time-reversed sequence, then flip its
        // outputs back so position t lines up with position t of the forward
        // pass.
        let reversed: Vec<u32> = (0..seq_len as u32).rev().collect();
        let reversed = Tensor::new(reversed.as_slice(), xs.device())?;
        let backward_states = self.backward_lstm.seq(&xs.index_select(&reversed, 1)?)?;
        let backward_out = self
            .backward_lstm
            .states_to_tensor(&backward_states)?
            .index_select(&reversed, 1)?;

        Tensor::cat(&[&forward_out, &backward_out], D::Minus1)
    }
}
