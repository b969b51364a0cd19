//! Sarcasm Core
//!
//! Types and error handling shared by the sarcasm classifier crates.
//!
//! This crate provides:
//! - The two-class label and its exact mapping from raw dataset tokens
//! - Raw and encoded examples
//! - Prediction results as returned to callers
//! - Error types and result handling

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{EncodedExample, Example, Label, PredictionResult};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::types::{EncodedExample, Example, Label, PredictionResult};
}
