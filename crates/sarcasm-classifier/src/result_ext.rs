//! Conversion from tensor-library errors into the crate error type

use sarcasm_core::{Error, Result};

/// Wraps a candle failure into [`Error::Model`] with a short context message
pub(crate) trait ModelResultExt<T> {
    fn model_context(self, what: &str) -> Result<T>;
}

impl<T> ModelResultExt<T> for candle_core::Result<T> {
    fn model_context(self, what: &str) -> Result<T> {
        self.map_err(|e| Error::model(format!("{}: {}", what, e)))
    }
}
