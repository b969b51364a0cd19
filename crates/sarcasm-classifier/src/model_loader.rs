//! Pretrained model resolution, device selection and model assembly

use crate::backbone::{BertBackbone, ContextEncoder, LookupEncoder, ENCODER_PREFIX};
use crate::checkpoint::CheckpointStore;
use crate::config::{PretrainedSource, TrainingConfig};
use crate::encoder::ExampleEncoder;
use crate::model::{HeadConfig, SarcasmModel};
use crate::result_ext::ModelResultExt;
use candle_core::{DType, Device, Tensor};
use candle_nn::{VarBuilder, VarMap};
use candle_transformers::models::bert::Config as BertConfig;
use hf_hub::api::sync::{ApiBuilder, ApiRepo};
use hf_hub::{Repo, RepoType};
use sarcasm_core::{Error, Result};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokenizers::{Model, Tokenizer};

/// Device type for training and inference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceType {
    /// CPU (always available)
    Cpu,
    /// CUDA GPU
    Cuda(usize), // GPU index
    /// Metal (Apple Silicon)
    Metal(usize),
}

impl DeviceType {
    /// Probe accelerators in priority order: Metal, CUDA, then CPU
    pub fn detect() -> Self {
        if candle_core::utils::metal_is_available() {
            Self::Metal(0)
        } else if candle_core::utils::cuda_is_available() {
            Self::Cuda(0)
        } else {
            Self::Cpu
        }
    }

    /// Create the Candle device
    pub fn create(self) -> Result<Device> {
        match self {
            Self::Cpu => Ok(Device::Cpu),
            Self::Cuda(idx) => Device::new_cuda(idx)
                .map_err(|e| Error::model(format!("Failed to create CUDA device: {}", e))),
            Self::Metal(idx) => Device::new_metal(idx)
                .map_err(|e| Error::model(format!("Failed to create Metal device: {}", e))),
        }
    }
}

/// Local paths of the three files a pretrained encoder needs
#[derive(Debug, Clone)]
pub struct PretrainedFiles {
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

/// Locate (downloading if needed) config, tokenizer and weights
pub fn resolve_pretrained(source: &PretrainedSource) -> Result<PretrainedFiles> {
    match source {
        PretrainedSource::Local { path } => {
            if !path.is_dir() {
                return Err(Error::config(format!(
                    "Pretrained model directory not found: {}",
                    path.display()
                )));
            }
            let tokenizer = ["tokenizer.json", "vocab.txt"]
                .iter()
                .map(|f| path.join(f))
                .find(|p| p.exists())
                .unwrap_or_else(|| path.join("tokenizer.json"));
            Ok(PretrainedFiles {
                config: path.join("config.json"),
                tokenizer,
                weights: path.join("model.safetensors"),
            })
        }
        PretrainedSource::HuggingFace { repo, revision } => {
            tracing::info!("Fetching pretrained encoder from HuggingFace: {} @ {}", repo, revision);

            let hub = hf_repo(repo, revision)?;
            let config = fetch(&hub, repo, "config.json")?;
            let weights = fetch(&hub, repo, "model.safetensors")?;
            // Older repos only ship a WordPiece vocabulary
            let tokenizer = fetch(&hub, repo, "tokenizer.json")
                .or_else(|_| fetch(&hub, repo, "vocab.txt"))?;

            Ok(PretrainedFiles {
                config,
                tokenizer,
                weights,
            })
        }
    }
}

/// Downloads are cached under `~/.cache/sarcasm/models`
fn hf_repo(repo: &str, revision: &str) -> Result<ApiRepo> {
    let cache_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".cache/sarcasm/models");

    let api = ApiBuilder::new()
        .with_cache_dir(cache_dir)
        .build()
        .map_err(|e| Error::config(format!("Failed to initialize HF API: {}", e)))?;

    Ok(api.repo(Repo::with_revision(
        repo.to_string(),
        RepoType::Model,
        revision.to_string(),
    )))
}

fn fetch(hub: &ApiRepo, repo: &str, file: &str) -> Result<PathBuf> {
    tracing::debug!("Downloading {}", file);
    hub.get(file)
        .map_err(|e| Error::config(format!("Failed to download {} from {}: {}", file, repo, e)))
}

/// Parse a JSON config file
pub fn parse_json_config<T: DeserializeOwned>(config_path: &Path) -> Result<T> {
    let config_str = std::fs::read_to_string(config_path).map_err(|e| {
        Error::config(format!(
            "Failed to read config {}: {}",
            config_path.display(),
            e
        ))
    })?;

    serde_json::from_str(&config_str).map_err(|e| {
        Error::config(format!(
            "Failed to parse config {}: {}",
            config_path.display(),
            e
        ))
    })
}

/// Load a tokenizer from `tokenizer.json`, or build a BERT WordPiece
/// tokenizer from a `vocab.txt`
pub fn load_tokenizer(path: &Path) -> Result<Tokenizer> {
    if path.extension().and_then(|e| e.to_str()) == Some("txt") {
        tracing::debug!("Building tokenizer from {}", path.display());

        use tokenizers::models::wordpiece::WordPiece;
        use tokenizers::normalizers::BertNormalizer;
        use tokenizers::pre_tokenizers::bert::BertPreTokenizer;
        use tokenizers::processors::bert::BertProcessing;

        let wordpiece = WordPiece::from_file(path.to_string_lossy().as_ref())
            .unk_token("[UNK]".to_string())
            .build()
            .map_err(|e| Error::tokenizer(format!("Failed to build WordPiece model: {}", e)))?;

        let cls_id = wordpiece.token_to_id("[CLS]").unwrap_or(101);
        let sep_id = wordpiece.token_to_id("[SEP]").unwrap_or(102);

        let mut tokenizer = Tokenizer::new(wordpiece);
        tokenizer.with_normalizer(Some(BertNormalizer::default()));
        tokenizer.with_pre_tokenizer(Some(BertPreTokenizer));
        tokenizer.with_post_processor(Some(BertProcessing::new(
            ("[SEP]".to_string(), sep_id),
            ("[CLS]".to_string(), cls_id),
        )));
        return Ok(tokenizer);
    }

    Tokenizer::from_file(path).map_err(|e| {
        Error::tokenizer(format!("Failed to load tokenizer {}: {}", path.display(), e))
    })
}

/// Normalize a pretrained tensor name to the variable-store layout:
/// drop a leading `bert.`, rename legacy LayerNorm `gamma`/`beta`, and
/// put the result under [`ENCODER_PREFIX`].
fn encoder_var_name(pretrained_name: &str) -> String {
    let name = pretrained_name
        .strip_prefix("bert.")
        .unwrap_or(pretrained_name);
    let name = if let Some(stem) = name.strip_suffix(".gamma") {
        format!("{}.weight", stem)
    } else if let Some(stem) = name.strip_suffix(".beta") {
        format!("{}.bias", stem)
    } else {
        name.to_string()
    };
    format!("{}.{}", ENCODER_PREFIX, name)
}

/// Copy pretrained encoder tensors into the trainable variable store.
///
/// Every variable under [`ENCODER_PREFIX`] must be present in the weights
/// file with the same shape. Tensors the encoder does not use (pooler, MLM
/// heads) are ignored. Returns the number of variables filled.
pub fn import_pretrained(varmap: &VarMap, weights: &Path, device: &Device) -> Result<usize> {
    let tensors: HashMap<String, Tensor> = candle_core::safetensors::load(weights, device)
        .model_context(&format!("Failed to read {}", weights.display()))?
        .into_iter()
        .map(|(name, tensor)| (encoder_var_name(&name), tensor))
        .collect();

    let data = varmap
        .data()
        .lock()
        .map_err(|_| Error::internal("variable store lock poisoned"))?;

    let prefix = format!("{}.", ENCODER_PREFIX);
    let mut filled = 0;
    for (name, var) in data.iter().filter(|(name, _)| name.starts_with(&prefix)) {
        let tensor = tensors.get(name).ok_or_else(|| {
            Error::config(format!(
                "Pretrained weights {} have no tensor for {}",
                weights.display(),
                name
            ))
        })?;
        let tensor = tensor
            .to_dtype(var.dtype())
            .model_context("Failed to convert pretrained tensor")?;
        var.set(&tensor)
            .model_context(&format!("Shape mismatch importing {}", name))?;
        filled += 1;
    }

    tracing::info!("Imported {} pretrained encoder tensors", filled);
    Ok(filled)
}

/// A model together with everything needed to train or run it
pub struct ModelBundle<E> {
    pub model: SarcasmModel<E>,

    /// Owns every trainable parameter of `model`
    pub varmap: VarMap,

    pub example_encoder: ExampleEncoder,

    pub device: Device,

    /// Prefix of variables holding pretrained weights that seeded
    /// initialization must not touch
    pub pretrained_prefix: Option<String>,
}

impl<E: ContextEncoder> ModelBundle<E> {
    /// Replace every parameter with the contents of a checkpoint
    pub fn load_checkpoint(&mut self, store: &CheckpointStore) -> Result<()> {
        store.load_into(&mut self.varmap)
    }
}

/// Build the BERT + BiLSTM model with pretrained encoder weights
pub fn build_pretrained_bundle(config: &TrainingConfig) -> Result<ModelBundle<BertBackbone>> {
    let files = resolve_pretrained(&config.pretrained)?;
    let bundle = assemble_bert(config, &files)?;
    import_pretrained(&bundle.varmap, &files.weights, &bundle.device)?;
    Ok(bundle)
}

/// Build the BERT + BiLSTM model and fill it from a fine-tuned checkpoint.
/// Only the pretrained config and tokenizer are needed, not its weights.
pub fn build_from_checkpoint(
    config: &TrainingConfig,
    checkpoint: &CheckpointStore,
) -> Result<ModelBundle<BertBackbone>> {
    let files = resolve_config_and_tokenizer(&config.pretrained)?;
    let mut bundle = assemble_bert(config, &files)?;
    bundle.load_checkpoint(checkpoint)?;
    tracing::info!("Model loaded from checkpoint {}", checkpoint.path().display());
    Ok(bundle)
}

fn resolve_config_and_tokenizer(source: &PretrainedSource) -> Result<PretrainedFiles> {
    match source {
        PretrainedSource::Local { .. } => resolve_pretrained(source),
        PretrainedSource::HuggingFace { repo, revision } => {
            let hub = hf_repo(repo, revision)?;
            let config = fetch(&hub, repo, "config.json")?;
            let tokenizer = fetch(&hub, repo, "tokenizer.json")
                .or_else(|_| fetch(&hub, repo, "vocab.txt"))?;
            Ok(PretrainedFiles {
                config,
                tokenizer,
                weights: PathBuf::new(),
            })
        }
    }
}

fn assemble_bert(
    config: &TrainingConfig,
    files: &PretrainedFiles,
) -> Result<ModelBundle<BertBackbone>> {
    let device = config.device.to_device_type().create()?;
    tracing::info!("Using device: {:?}", device);

    let bert_config: BertConfig = parse_json_config(&files.config)?;
    let tokenizer = load_tokenizer(&files.tokenizer)?;
    let example_encoder = ExampleEncoder::new(tokenizer, config.max_length)?;

    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
    let backbone = BertBackbone::load(vb.pp(ENCODER_PREFIX), &bert_config)
        .model_context("Failed to build BERT encoder")?;
    let model = SarcasmModel::new(backbone, &config.head_config(), vb)
        .model_context("Failed to build classifier head")?;

    Ok(ModelBundle {
        model,
        varmap,
        example_encoder,
        device,
        pretrained_prefix: Some(ENCODER_PREFIX.to_string()),
    })
}

/// Build a model over an embedding-table encoder. Nothing is pretrained, so
/// seeded initialization covers every parameter.
pub fn build_lookup_bundle(
    tokenizer: Tokenizer,
    max_length: usize,
    hidden_size: usize,
    head: &HeadConfig,
    device: Device,
) -> Result<ModelBundle<LookupEncoder>> {
    let vocab_size = tokenizer.get_vocab_size(true);
    let example_encoder = ExampleEncoder::new(tokenizer, max_length)?;

    let varmap = VarMap::new();
    let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
    let encoder = LookupEncoder::new(vocab_size, hidden_size, vb.pp(ENCODER_PREFIX))
        .model_context("Failed to build lookup encoder")?;
    let model = SarcasmModel::new(encoder, head, vb)
        .model_context("Failed to build classifier head")?;

    Ok(ModelBundle {
        model,
        varmap,
        example_encoder,
        device,
        pretrained_prefix: None,
    })
}
