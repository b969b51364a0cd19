//! Per-batch progress reporting

use std::fmt;

/// Which pass a batch belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Train,
    Eval,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Train => write!(f, "train"),
            Phase::Eval => write!(f, "eval"),
        }
    }
}

/// Snapshot after one batch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BatchProgress {
    pub phase: Phase,
    /// 1-based index of the finished batch
    pub batch: usize,
    pub total: usize,
    pub loss: f32,
}

/// Receives a notification after each batch of a train or eval pass
pub trait ProgressSink: Send {
    fn on_batch(&mut self, progress: &BatchProgress);
}

/// Discards progress
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_batch(&mut self, _progress: &BatchProgress) {}
}

/// Emits a `debug!` event per batch
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn on_batch(&mut self, progress: &BatchProgress) {
        tracing::debug!(
            phase = %progress.phase,
            batch = progress.batch,
            total = progress.total,
            loss = progress.loss,
            "batch complete"
        );
    }
}

/// Keeps every notification; handy for inspecting a pass after the fact
#[derive(Debug, Default, Clone)]
pub struct RecordingProgress {
    pub events: Vec<BatchProgress>,
}

impl ProgressSink for RecordingProgress {
    fn on_batch(&mut self, progress: &BatchProgress) {
        self.events.push(*progress);
    }
}
