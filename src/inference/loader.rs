use anyhow::{anyhow, Context, Result};
use candle::{DType, Device};
use candle_nn::VarBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;

/// Files a model directory must provide before anything is loaded.
#[derive(Debug, Clone)]
pub struct ModelArtifacts {
    pub dir: PathBuf,
    pub config: PathBuf,
    pub tokenizer: PathBuf,
    pub weights: PathBuf,
}

impl ModelArtifacts {
    pub fn locate(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            return Err(anyhow!("model directory {} does not exist", dir.display()));
        }

        let config = dir.join("config.json");
        if !config.exists() {
            return Err(anyhow!("config.json not found under {}", dir.display()));
        }

        let tokenizer = dir.join("tokenizer.json");
        if !tokenizer.exists() {
            return Err(anyhow!("tokenizer.json not found under {}", dir.display()));
        }

        let weights = find_model_weights(dir)
            .ok_or_else(|| anyhow!("no model weights found under {}", dir.display()))?;

        Ok(Self {
            dir: dir.to_path_buf(),
            config,
            tokenizer,
            weights,
        })
    }

    pub fn read_config(&self) -> Result<Vec<u8>> {
        fs::read(&self.config).with_context(|| format!("failed to read {}", self.config.display()))
    }

    pub fn load_tokenizer(&self) -> Result<Tokenizer> {
        let mut tokenizer = Tokenizer::from_file(&self.tokenizer).map_err(|e| {
            anyhow!(
                "Tokenizer load failed ({}): {e}",
                self.tokenizer.display()
            )
        })?;
        // Inputs are encoded one at a time and truncated by the classifier.
        tokenizer.with_padding(None);
        tokenizer
            .with_truncation(None)
            .map_err(|e| anyhow!("Tokenizer truncation config failed: {e}"))?;
        Ok(tokenizer)
    }

    pub fn var_builder(&self, device: &Device) -> Result<VarBuilder<'static>> {
        build_var_builder(&self.weights, DType::F32, device)
    }
}

fn find_model_weights(dir: &Path) -> Option<PathBuf> {
    ["model.safetensors", "pytorch_model.bin"]
        .into_iter()
        .map(|candidate| dir.join(candidate))
        .find(|path| path.exists())
}

fn build_var_builder(path: &Path, dtype: DType, device: &Device) -> Result<VarBuilder<'static>> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    if ext == "safetensors" {
        let files = vec![path.to_path_buf()];
        // SAFETY: the weights file is treated as immutable for the life of the process.
        unsafe {
            VarBuilder::from_mmaped_safetensors(&files, dtype, device)
                .map_err(|e| anyhow!("failed to load {}: {e}", path.display()))
        }
    } else {
        VarBuilder::from_pth(path, dtype, device)
            .map_err(|e| anyhow!("failed to load {}: {e}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_directory_is_reported() {
        let err = ModelArtifacts::locate(Path::new("does/not/exist")).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn missing_tokenizer_is_reported() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("config.json"), "{}").unwrap();
        let err = ModelArtifacts::locate(dir.path()).unwrap_err();
        assert!(err.to_string().contains("tokenizer.json"));
    }

    #[test]
    fn missing_weights_are_reported() {
        let dir = tempdir().expect("tempdir");
        fs::write(dir.path().join("config.json"), "{}").unwrap();
        fs::write(dir.path().join("tokenizer.json"), "{}").unwrap();
        let err = ModelArtifacts::locate(dir.path()).unwrap_err();
        assert!(err.to_string().contains("no model weights"));
    }

    #[test]
    fn safetensors_preferred_over_pth() {
        let dir = tempdir().expect("tempdir");
        for name in [
            "config.json",
            "tokenizer.json",
            "model.safetensors",
            "pytorch_model.bin",
        ] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        let artifacts = ModelArtifacts::locate(dir.path()).unwrap();
        assert!(artifacts.weights.ends_with("model.safetensors"));
    }

    #[test]
    fn malformed_tokenizer_fails_to_load() {
        let dir = tempdir().expect("tempdir");
        for name in ["config.json", "tokenizer.json", "model.safetensors"] {
            fs::write(dir.path().join(name), "not json").unwrap();
        }
        let artifacts = ModelArtifacts::locate(dir.path()).unwrap();
        assert!(artifacts.load_tokenizer().is_err());
    }
}
