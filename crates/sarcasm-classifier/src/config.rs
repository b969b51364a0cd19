//! Training and inference configuration

use crate::model::HeadConfig;
use crate::model_loader::DeviceType;
use sarcasm_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Configuration for a full training run and for rebuilding the model at
/// inference time. Every field has a default, so an empty YAML document is
/// a valid configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Where the pretrained encoder comes from
    #[serde(default)]
    pub pretrained: PretrainedSource,

    /// Fixed sequence length after padding/truncation
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Examples per mini-batch
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Number of train/eval passes
    #[serde(default = "default_epochs")]
    pub epochs: usize,

    /// AdamW learning rate
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    /// AdamW decoupled weight decay
    #[serde(default = "default_weight_decay")]
    pub weight_decay: f64,

    /// Seed for shuffling and for initializing non-pretrained layers
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Dropout rate before the classifier head
    #[serde(default = "default_dropout")]
    pub dropout: f32,

    /// LSTM hidden size per direction
    #[serde(default = "default_lstm_hidden")]
    pub lstm_hidden: usize,

    /// Share of each class held out for validation
    #[serde(default = "default_validation_fraction")]
    pub validation_fraction: f64,

    /// Seed for the stratified train/validation split
    #[serde(default = "default_seed")]
    pub split_seed: u64,

    /// Best-by-validation-loss checkpoint file
    #[serde(default = "default_checkpoint_path")]
    pub checkpoint_path: PathBuf,

    /// Compute device
    #[serde(default)]
    pub device: DeviceSpec,
}

/// Pretrained encoder source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PretrainedSource {
    /// Directory holding config.json, tokenizer.json and model.safetensors
    Local { path: PathBuf },

    /// Download from Hugging Face Hub
    HuggingFace {
        repo: String,
        #[serde(default = "default_revision")]
        revision: String,
    },
}

impl Default for PretrainedSource {
    fn default() -> Self {
        Self::HuggingFace {
            repo: "bert-base-uncased".to_string(),
            revision: default_revision(),
        }
    }
}

/// Device specification (for config files and the command line).
///
/// Config files and flags share one string syntax, see [`FromStr`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(try_from = "String", into = "String")]
pub enum DeviceSpec {
    /// Metal if available, else CUDA, else CPU
    #[default]
    Auto,
    Cpu,
    Cuda { index: Option<usize> },
    Metal { index: Option<usize> },
}

impl DeviceSpec {
    /// Convert to DeviceType, probing available accelerators for `Auto`
    pub fn to_device_type(&self) -> DeviceType {
        match self {
            DeviceSpec::Auto => DeviceType::detect(),
            DeviceSpec::Cpu => DeviceType::Cpu,
            DeviceSpec::Cuda { index } => DeviceType::Cuda(index.unwrap_or(0)),
            DeviceSpec::Metal { index } => DeviceType::Metal(index.unwrap_or(0)),
        }
    }
}

impl FromStr for DeviceSpec {
    type Err = Error;

    /// Parses `auto`, `cpu`, `cuda`, `cuda:N`, `metal`, `mps` and `metal:N`
    fn from_str(s: &str) -> Result<Self> {
        let lowered = s.trim().to_lowercase();
        let (kind, index) = match lowered.split_once(':') {
            Some((kind, idx)) => {
                let idx = idx
                    .parse::<usize>()
                    .map_err(|_| Error::config(format!("Invalid device index in '{}'", s)))?;
                (kind.to_string(), Some(idx))
            }
            None => (lowered, None),
        };

        match (kind.as_str(), index) {
            ("auto", None) => Ok(Self::Auto),
            ("cpu", None) => Ok(Self::Cpu),
            ("cuda", index) => Ok(Self::Cuda { index }),
            ("metal" | "mps", index) => Ok(Self::Metal { index }),
            _ => Err(Error::config(format!("Unknown device '{}'", s))),
        }
    }
}

impl TryFrom<String> for DeviceSpec {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<DeviceSpec> for String {
    fn from(spec: DeviceSpec) -> Self {
        spec.to_string()
    }
}

impl fmt::Display for DeviceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceSpec::Auto => write!(f, "auto"),
            DeviceSpec::Cpu => write!(f, "cpu"),
            DeviceSpec::Cuda { index: None } => write!(f, "cuda"),
            DeviceSpec::Cuda { index: Some(i) } => write!(f, "cuda:{}", i),
            DeviceSpec::Metal { index: None } => write!(f, "metal"),
            DeviceSpec::Metal { index: Some(i) } => write!(f, "metal:{}", i),
        }
    }
}

fn default_revision() -> String {
    "main".to_string()
}

fn default_max_length() -> usize {
    128
}

fn default_batch_size() -> usize {
    16
}

fn default_epochs() -> usize {
    5
}

fn default_learning_rate() -> f64 {
    2e-5
}

fn default_weight_decay() -> f64 {
    0.01
}

fn default_seed() -> u64 {
    42
}

fn default_dropout() -> f32 {
    0.1
}

fn default_lstm_hidden() -> usize {
    64
}

fn default_validation_fraction() -> f64 {
    0.2
}

fn default_checkpoint_path() -> PathBuf {
    PathBuf::from("best_sarcasm_model.safetensors")
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            pretrained: PretrainedSource::default(),
            max_length: default_max_length(),
            batch_size: default_batch_size(),
            epochs: default_epochs(),
            learning_rate: default_learning_rate(),
            weight_decay: default_weight_decay(),
            seed: default_seed(),
            dropout: default_dropout(),
            lstm_hidden: default_lstm_hidden(),
            validation_fraction: default_validation_fraction(),
            split_seed: default_seed(),
            checkpoint_path: default_checkpoint_path(),
            device: DeviceSpec::default(),
        }
    }
}

impl TrainingConfig {
    /// Load from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| Error::config(format!("Failed to parse training config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_yaml(&content)
    }

    /// Reject values the training loop cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.max_length == 0 {
            return Err(Error::config("max_length must be greater than zero"));
        }
        if self.batch_size == 0 {
            return Err(Error::config("batch_size must be greater than zero"));
        }
        if self.epochs == 0 {
            return Err(Error::config("epochs must be greater than zero"));
        }
        if self.lstm_hidden == 0 {
            return Err(Error::config("lstm_hidden must be greater than zero"));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(Error::config(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        if !(self.validation_fraction > 0.0 && self.validation_fraction < 1.0) {
            return Err(Error::config(format!(
                "validation_fraction must be in (0, 1), got {}",
                self.validation_fraction
            )));
        }
        if self.learning_rate.is_nan() || self.learning_rate <= 0.0 {
            return Err(Error::config("learning_rate must be positive"));
        }
        Ok(())
    }

    /// Layer sizes for the layers stacked on top of the encoder
    pub fn head_config(&self) -> HeadConfig {
        HeadConfig {
            lstm_hidden: self.lstm_hidden,
            dropout: self.dropout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_uses_defaults() {
        let config = TrainingConfig::from_yaml("{}").unwrap();
        assert_eq!(config.max_length, 128);
        assert_eq!(config.batch_size, 16);
        assert_eq!(config.epochs, 5);
        assert_eq!(config.seed, 42);
        assert_eq!(config.split_seed, 42);
        assert_eq!(config.lstm_hidden, 64);
        assert!((config.dropout - 0.1).abs() < f32::EPSILON);
        assert_eq!(
            config.checkpoint_path,
            PathBuf::from("best_sarcasm_model.safetensors")
        );
        assert_eq!(config.device, DeviceSpec::Auto);
        assert_eq!(config.pretrained, PretrainedSource::default());
    }

    #[test]
    fn test_full_yaml() {
        let yaml = r#"
pretrained:
  type: local
  path: "./models/bert-base-uncased"
max_length: 64
batch_size: 8
epochs: 3
learning_rate: 0.00003
seed: 7
device: cpu
checkpoint_path: "./out/best.safetensors"
"#;

        let config = TrainingConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.max_length, 64);
        assert_eq!(config.batch_size, 8);
        assert_eq!(config.epochs, 3);
        assert_eq!(config.seed, 7);
        assert_eq!(config.device, DeviceSpec::Cpu);

        match &config.pretrained {
            PretrainedSource::Local { path } => {
                assert_eq!(path.to_str().unwrap(), "./models/bert-base-uncased");
            }
            _ => panic!("Expected local source"),
        }
    }

    #[test]
    fn test_huggingface_source_default_revision() {
        let yaml = r#"
pretrained:
  type: huggingface
  repo: "distilbert-base-uncased"
"#;
        let config = TrainingConfig::from_yaml(yaml).unwrap();
        assert_eq!(
            config.pretrained,
            PretrainedSource::HuggingFace {
                repo: "distilbert-base-uncased".to_string(),
                revision: "main".to_string(),
            }
        );
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(TrainingConfig::from_yaml("batch_size: 0").is_err());
        assert!(TrainingConfig::from_yaml("epochs: 0").is_err());
        assert!(TrainingConfig::from_yaml("dropout: 1.0").is_err());
        assert!(TrainingConfig::from_yaml("validation_fraction: 0.0").is_err());
        assert!(TrainingConfig::from_yaml("validation_fraction: 1.0").is_err());
        assert!(TrainingConfig::from_yaml("max_length: 0").is_err());
    }

    #[test]
    fn test_device_spec_parsing() {
        assert_eq!("auto".parse::<DeviceSpec>().unwrap(), DeviceSpec::Auto);
        assert_eq!("CPU".parse::<DeviceSpec>().unwrap(), DeviceSpec::Cpu);
        assert_eq!(
            "cuda:1".parse::<DeviceSpec>().unwrap(),
            DeviceSpec::Cuda { index: Some(1) }
        );
        assert_eq!(
            "mps".parse::<DeviceSpec>().unwrap(),
            DeviceSpec::Metal { index: None }
        );
        assert!("tpu".parse::<DeviceSpec>().is_err());
        assert!("cuda:x".parse::<DeviceSpec>().is_err());
        assert!("cpu:1".parse::<DeviceSpec>().is_err());
    }

    #[test]
    fn test_device_spec_conversion() {
        assert!(matches!(DeviceSpec::Cpu.to_device_type(), DeviceType::Cpu));
        assert!(matches!(
            DeviceSpec::Cuda { index: Some(1) }.to_device_type(),
            DeviceType::Cuda(1)
        ));
        assert!(matches!(
            DeviceSpec::Metal { index: None }.to_device_type(),
            DeviceType::Metal(0)
        ));
    }

    #[test]
    fn test_device_spec_yaml() {
        let spec: DeviceSpec = serde_yaml::from_str("cpu").unwrap();
        assert_eq!(spec, DeviceSpec::Cpu);

        for (yaml, expected) in [
            ("device: auto", DeviceSpec::Auto),
            ("device: cuda", DeviceSpec::Cuda { index: None }),
            ("device: metal", DeviceSpec::Metal { index: None }),
            ("device: \"cuda:1\"", DeviceSpec::Cuda { index: Some(1) }),
            ("device: metal:0", DeviceSpec::Metal { index: Some(0) }),
        ] {
            let config = TrainingConfig::from_yaml(yaml).unwrap();
            assert_eq!(config.device, expected, "{}", yaml);
        }

        assert!(TrainingConfig::from_yaml("device: tpu").is_err());
    }

    #[test]
    fn test_device_spec_yaml_round_trip() {
        let config = TrainingConfig {
            device: DeviceSpec::Cuda { index: Some(2) },
            ..Default::default()
        };
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert!(yaml.contains("cuda:2"), "{}", yaml);
        let back = TrainingConfig::from_yaml(&yaml).unwrap();
        assert_eq!(back.device, config.device);
    }
}
