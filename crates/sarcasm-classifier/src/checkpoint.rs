//! Best-model checkpoint persistence

use candle_nn::VarMap;
use sarcasm_core::{Error, Result};
use std::path::{Path, PathBuf};

/// Default checkpoint file name
pub const DEFAULT_CHECKPOINT: &str = "best_sarcasm_model.safetensors";

/// A single safetensors file holding every parameter of a model.
///
/// Saving writes a sibling temp file and renames it over the target, so a
/// crash mid-write never leaves a truncated checkpoint behind.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    path: PathBuf,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Persist all variables, replacing any previous checkpoint
    pub fn save(&self, varmap: &VarMap) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| {
                Error::checkpoint(format!("Invalid checkpoint path: {}", self.path.display()))
            })?
            .to_string_lossy();
        let tmp = self.path.with_file_name(format!(".{}.tmp", file_name));

        let written = varmap
            .save(&tmp)
            .map_err(|e| Error::checkpoint(format!("Failed to write {}: {}", tmp.display(), e)))
            .and_then(|()| {
                std::fs::rename(&tmp, &self.path).map_err(|e| {
                    Error::checkpoint(format!(
                        "Failed to move checkpoint into {}: {}",
                        self.path.display(),
                        e
                    ))
                })
            });
        if let Err(e) = written {
            // Partial or orphaned temp file
            let _ = std::fs::remove_file(&tmp);
            return Err(e);
        }

        tracing::debug!("Checkpoint written to {}", self.path.display());
        Ok(())
    }

    /// Overwrite the variables in `varmap` with the checkpoint contents.
    /// Every variable must be present in the file with a matching shape.
    pub fn load_into(&self, varmap: &mut VarMap) -> Result<()> {
        if !self.exists() {
            return Err(Error::checkpoint(format!(
                "Checkpoint not found: {}",
                self.path.display()
            )));
        }

        varmap.load(&self.path).map_err(|e| {
            Error::checkpoint(format!("Failed to load {}: {}", self.path.display(), e))
        })
    }
}

impl Default for CheckpointStore {
    fn default() -> Self {
        Self::new(DEFAULT_CHECKPOINT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use candle_core::{DType, Device, Tensor};
    use candle_nn::{Init, VarBuilder};

    fn values(varmap: &VarMap, name: &str) -> Vec<f32> {
        varmap.data().lock().unwrap()[name]
            .as_tensor()
            .flatten_all()
            .unwrap()
            .to_vec1::<f32>()
            .unwrap()
    }

    #[test]
    fn test_save_and_restore() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("nested/best.safetensors"));
        assert!(!store.exists());

        let device = Device::Cpu;
        let source = VarMap::new();
        let vb = VarBuilder::from_varmap(&source, DType::F32, &device);
        let _linear = candle_nn::linear(3, 2, vb.pp("classifier")).unwrap();
        store.save(&source).unwrap();
        assert!(store.exists());

        let mut target = VarMap::new();
        let vb = VarBuilder::from_varmap(&target, DType::F32, &device);
        let _linear = candle_nn::linear(3, 2, vb.pp("classifier")).unwrap();
        assert_ne!(
            values(&source, "classifier.weight"),
            values(&target, "classifier.weight")
        );

        store.load_into(&mut target).unwrap();
        assert_eq!(
            values(&source, "classifier.weight"),
            values(&target, "classifier.weight")
        );

        // No temp file is left next to the checkpoint
        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("nested"))
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_save_overwrites_previous() {
        let dir = tempfile::tempdir().unwrap();
        let store = CheckpointStore::new(dir.path().join("best.safetensors"));
        let device = Device::Cpu;

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &device);
        let _w = vb.get_with_hints(4, "w", Init::Const(1.0)).unwrap();
        store.save(&varmap).unwrap();

        varmap.data().lock().unwrap()["w"]
            .set(&Tensor::new(&[5f32, 5., 5., 5.], &device).unwrap())
            .unwrap();
        store.save(&varmap).unwrap();

        let mut restored = VarMap::new();
        let vb = VarBuilder::from_varmap(&restored, DType::F32, &device);
        let _w = vb.get_with_hints(4, "w", Init::Const(0.0)).unwrap();
        store.load_into(&mut restored).unwrap();
        assert_eq!(values(&restored, "w"), vec![5.0; 4]);
    }

    #[test]
    fn test_failed_save_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        // A non-empty directory at the target path makes the final rename fail
        let target = dir.path().join("best.safetensors");
        std::fs::create_dir(&target).unwrap();
        std::fs::write(target.join("occupied"), b"x").unwrap();

        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu);
        let _w = vb.get_with_hints(3, "w", Init::Const(1.0)).unwrap();

        let err = CheckpointStore::new(&target).save(&varmap).unwrap_err();
        assert!(matches!(err, Error::Checkpoint(_)));

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
        assert!(target.join("occupied").is_file());
    }

    #[test]
    fn test_missing_checkpoint() {
        let mut varmap = VarMap::new();
        let store = CheckpointStore::new("/nonexistent/best.safetensors");
        let err = store.load_into(&mut varmap).unwrap_err();
        assert!(matches!(err, Error::Checkpoint(_)));
    }
}
