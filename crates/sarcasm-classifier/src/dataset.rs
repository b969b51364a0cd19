//! Headline dataset loading, stratified splitting and batching

use crate::result_ext::ModelResultExt;
use candle_core::{Device, Tensor};
use rand::seq::SliceRandom;
use rand::Rng;
use sarcasm_core::{EncodedExample, Error, Example, Label, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// One raw input row. Fields are kept loose so that missing values can be
/// reported with the record number instead of a serde message.
#[derive(Debug, Deserialize)]
struct RawRecord {
    headline: Option<serde_json::Value>,
    label: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct CsvRecord {
    headline: Option<String>,
    label: Option<String>,
}

/// Render a JSON scalar as text; strings are taken verbatim
fn coerce(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

fn to_example(record: usize, headline: Option<String>, label: Option<String>) -> Result<Example> {
    let headline = headline
        .filter(|h| !h.trim().is_empty())
        .ok_or_else(|| Error::data(format!("record {}: missing headline", record)))?;
    let label =
        label.ok_or_else(|| Error::data(format!("record {}: missing label", record)))?;
    Ok(Example::from_token(headline, &label))
}

/// Load examples from a `.csv` (with a `headline,label` header) or a
/// `.jsonl` / `.json` lines file.
pub fn load_examples(path: impl AsRef<Path>) -> Result<Vec<Example>> {
    let path = path.as_ref();
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    let examples = match extension.as_deref() {
        Some("csv") => load_csv(path)?,
        Some("jsonl") | Some("json") => load_jsonl(path)?,
        _ => {
            return Err(Error::data(format!(
                "Unsupported dataset format: {} (expected .csv or .jsonl)",
                path.display()
            )))
        }
    };

    let sarcastic = examples
        .iter()
        .filter(|e| e.label == Label::Sarcastic)
        .count();
    tracing::info!(
        "Loaded {} examples from {} ({} sarcastic, {} not sarcastic)",
        examples.len(),
        path.display(),
        sarcastic,
        examples.len() - sarcastic
    );

    Ok(examples)
}

fn load_csv(path: &Path) -> Result<Vec<Example>> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| Error::data(format!("Failed to open {}: {}", path.display(), e)))?;

    reader
        .deserialize::<CsvRecord>()
        .enumerate()
        .map(|(i, row)| {
            let row = row.map_err(|e| Error::data(format!("record {}: {}", i + 1, e)))?;
            to_example(i + 1, row.headline, row.label)
        })
        .collect()
}

fn load_jsonl(path: &Path) -> Result<Vec<Example>> {
    let reader = BufReader::new(std::fs::File::open(path)?);
    let mut examples = Vec::new();

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let record = examples.len() + 1;
        let raw: RawRecord = serde_json::from_str(&line)
            .map_err(|e| Error::data(format!("record {}: {}", record, e)))?;
        examples.push(to_example(
            record,
            raw.headline.and_then(coerce),
            raw.label.and_then(coerce),
        )?);
    }

    Ok(examples)
}

/// Split into `(train, validation)`, keeping the class ratio on both sides.
///
/// Each class is shuffled independently and `round(len * fraction)` of it goes
/// to validation. Both sides are shuffled again so classes are interleaved.
pub fn stratified_split<R: Rng>(
    examples: Vec<Example>,
    fraction: f64,
    rng: &mut R,
) -> Result<(Vec<Example>, Vec<Example>)> {
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(Error::config(format!(
            "validation fraction must be in (0, 1), got {}",
            fraction
        )));
    }

    let mut by_label: BTreeMap<u32, Vec<Example>> = BTreeMap::new();
    for example in examples {
        by_label
            .entry(example.label.index())
            .or_default()
            .push(example);
    }

    let mut train = Vec::new();
    let mut validation = Vec::new();
    for (_, mut group) in by_label {
        group.shuffle(rng);
        let n_val = (group.len() as f64 * fraction).round() as usize;
        let rest = group.split_off(n_val);
        validation.extend(group);
        train.extend(rest);
    }

    if train.is_empty() || validation.is_empty() {
        return Err(Error::data(format!(
            "dataset too small to split: {} train / {} validation examples",
            train.len(),
            validation.len()
        )));
    }

    train.shuffle(rng);
    validation.shuffle(rng);

    tracing::info!(
        "Split into {} training and {} validation examples",
        train.len(),
        validation.len()
    );
    Ok((train, validation))
}

/// Stacked encodings on the target device
#[derive(Debug)]
pub struct Batch {
    /// `[B, L]` u32
    pub token_ids: Tensor,
    /// `[B, L]` u32
    pub attention_mask: Tensor,
    /// `[B]` u32
    pub labels: Tensor,
}

impl Batch {
    pub fn from_examples(examples: &[&EncodedExample], device: &Device) -> Result<Self> {
        let rows = examples.len();
        let cols = examples.first().map(|e| e.len()).unwrap_or(0);
        if examples.iter().any(|e| e.len() != cols) {
            return Err(Error::data("examples in a batch must share one length"));
        }

        let ids: Vec<u32> = examples
            .iter()
            .flat_map(|e| e.token_ids.iter().copied())
            .collect();
        let mask: Vec<u32> = examples
            .iter()
            .flat_map(|e| e.attention_mask.iter().copied())
            .collect();
        let labels: Vec<u32> = examples.iter().map(|e| e.label).collect();

        Ok(Self {
            token_ids: Tensor::from_vec(ids, (rows, cols), device)
                .model_context("Failed to build token id tensor")?,
            attention_mask: Tensor::from_vec(mask, (rows, cols), device)
                .model_context("Failed to build mask tensor")?,
            labels: Tensor::from_vec(labels, rows, device)
                .model_context("Failed to build label tensor")?,
        })
    }

    pub fn size(&self) -> usize {
        self.labels.dims().first().copied().unwrap_or(0)
    }
}

/// Encoded examples plus the batch size and device they are batched for
pub struct BatchLoader {
    examples: Vec<EncodedExample>,
    batch_size: usize,
    device: Device,
}

impl BatchLoader {
    pub fn new(examples: Vec<EncodedExample>, batch_size: usize, device: Device) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::config("batch_size must be greater than zero"));
        }
        Ok(Self {
            examples,
            batch_size,
            device,
        })
    }

    /// Number of examples
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn num_batches(&self) -> usize {
        self.examples.len().div_ceil(self.batch_size)
    }

    /// Batches in stored order
    pub fn sequential(&self) -> Batches<'_> {
        Batches {
            loader: self,
            order: (0..self.examples.len()).collect(),
            cursor: 0,
        }
    }

    /// Batches over a fresh permutation drawn from `rng`
    pub fn shuffled<R: Rng>(&self, rng: &mut R) -> Batches<'_> {
        let mut order: Vec<usize> = (0..self.examples.len()).collect();
        order.shuffle(rng);
        Batches {
            loader: self,
            order,
            cursor: 0,
        }
    }
}

/// Iterator over the batches of a [`BatchLoader`]; the last batch may be short
pub struct Batches<'a> {
    loader: &'a BatchLoader,
    order: Vec<usize>,
    cursor: usize,
}

impl Iterator for Batches<'_> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor >= self.order.len() {
            return None;
        }
        let end = (self.cursor + self.loader.batch_size).min(self.order.len());
        let members: Vec<&EncodedExample> = self.order[self.cursor..end]
            .iter()
            .map(|&i| &self.loader.examples[i])
            .collect();
        self.cursor = end;
        Some(Batch::from_examples(&members, &self.loader.device))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.order.len() - self.cursor).div_ceil(self.loader.batch_size);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Batches<'_> {}
