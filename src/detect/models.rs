//! Model download and caching
//!
//! Fetches the PaddleOCR detection/recognition models and the character
//! dictionary on first use and keeps them in the platform data directory.

use anyhow::{Context, Result};
use futures_util::StreamExt;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;
use tracing::{debug, info};

/// Files the detector engine needs on disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    /// Text detection model (DBNet)
    Detection,
    /// Text recognition model (CRNN)
    Recognition,
    /// Character dictionary for CTC decoding
    Dictionary,
}

impl ModelKind {
    /// Filename inside the model cache directory
    pub fn filename(&self) -> &'static str {
        match self {
            ModelKind::Detection => "det.onnx",
            ModelKind::Recognition => "rec.onnx",
            ModelKind::Dictionary => "dict.txt",
        }
    }

    /// Download URL (PaddleOCR ONNX exports from monkt/paddleocr-onnx)
    pub fn download_url(&self) -> &'static str {
        match self {
            ModelKind::Detection => {
                "https://huggingface.co/monkt/paddleocr-onnx/resolve/main/detection/v3/det.onnx"
            }
            ModelKind::Recognition => {
                "https://huggingface.co/monkt/paddleocr-onnx/resolve/main/languages/english/rec.onnx"
            }
            ModelKind::Dictionary => {
                "https://huggingface.co/monkt/paddleocr-onnx/resolve/main/languages/english/dict.txt"
            }
        }
    }

    /// Plausible on-disk size range, used as a cheap integrity check
    pub fn expected_size_range(&self) -> (u64, u64) {
        match self {
            ModelKind::Detection => (2_000_000, 5_000_000), // ~2.4 MB
            ModelKind::Recognition => (7_000_000, 10_000_000), // ~7.8 MB
            ModelKind::Dictionary => (500, 10_000), // ~1.4 KB
        }
    }

    /// Known SHA256 checksum, when pinned. None skips verification.
    pub fn expected_sha256(&self) -> Option<&'static str> {
        match self {
            ModelKind::Detection => None,
            ModelKind::Recognition => None,
            ModelKind::Dictionary => None,
        }
    }

    /// Display name for log output
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelKind::Detection => "Text Detection",
            ModelKind::Recognition => "Text Recognition",
            ModelKind::Dictionary => "Character Dictionary",
        }
    }
}

/// Manifest tracking downloaded model files
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ModelManifest {
    pub models: Vec<ModelEntry>,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ModelEntry {
    pub filename: String,
    pub size_bytes: u64,
    pub sha256: String,
}

/// Downloads and caches the ONNX models and dictionary.
pub struct ModelManager {
    models_dir: PathBuf,
}

impl ModelManager {
    /// Create a manager rooted at the platform data directory
    pub fn new() -> Result<Self> {
        let data_dir = crate::config::get_data_dir()?;
        Self::with_dir(data_dir.join("models"))
    }

    /// Create a manager with an explicit cache directory
    pub fn with_dir(models_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&models_dir)?;
        Ok(Self { models_dir })
    }

    /// Model cache directory
    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    /// Path a given model file lives at
    pub fn model_path(&self, kind: ModelKind) -> PathBuf {
        self.models_dir.join(kind.filename())
    }

    /// Whether a model file is present with a plausible size
    pub fn is_available(&self, kind: ModelKind) -> bool {
        let path = self.model_path(kind);
        match std::fs::metadata(&path) {
            Ok(metadata) => {
                let (min, max) = kind.expected_size_range();
                metadata.len() >= min && metadata.len() <= max
            }
            Err(_) => false,
        }
    }

    /// Whether everything the engine needs is cached
    pub fn all_available(&self) -> bool {
        self.is_available(ModelKind::Detection)
            && self.is_available(ModelKind::Recognition)
            && self.is_available(ModelKind::Dictionary)
    }

    /// Return the path to a model, downloading it first if missing.
    pub fn ensure(&self, kind: ModelKind) -> Result<PathBuf> {
        let path = self.model_path(kind);

        if self.is_available(kind) {
            debug!("Model {:?} already cached at {:?}", kind, path);
            return Ok(path);
        }

        self.download(kind)?;
        Ok(path)
    }

    /// Download one model file (blocking).
    fn download(&self, kind: ModelKind) -> Result<()> {
        let url = kind.download_url();
        let path = self.model_path(kind);

        info!("Downloading {} model from {}", kind.display_name(), url);

        if std::env::var("RETEXT_OFFLINE").is_ok() {
            anyhow::bail!(
                "Offline mode: cannot download models. Fetch {} manually and place it at {:?}",
                url,
                path
            );
        }

        let rt = Runtime::new().context("Failed to create tokio runtime")?;
        rt.block_on(async { self.download_file_async(url, &path, kind).await })?;

        if !self.is_available(kind) {
            anyhow::bail!("Download completed but model verification failed");
        }

        self.update_manifest(kind)?;
        info!("Successfully downloaded {} model", kind.display_name());
        Ok(())
    }

    async fn download_file_async(&self, url: &str, path: &Path, kind: ModelKind) -> Result<()> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .context("Failed to create HTTP client")?;

        let response = client
            .get(url)
            .send()
            .await
            .context("Failed to send download request")?;

        if !response.status().is_success() {
            anyhow::bail!("Download failed with status {}: {}", response.status(), url);
        }

        let total_size = response.content_length();
        debug!("Download size: {:?} bytes", total_size);

        // Download to a temp file and rename so a partial fetch never
        // masquerades as a cached model
        let temp_path = path.with_extension("tmp");
        let mut file = std::fs::File::create(&temp_path).context("Failed to create temp file")?;

        let mut hasher = Sha256::new();
        let mut stream = response.bytes_stream();

        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("Error reading download stream")?;
            file.write_all(&chunk).context("Failed to write to temp file")?;
            hasher.update(&chunk);
        }

        file.flush().context("Failed to flush temp file")?;
        drop(file);

        let hash = format!("{:x}", hasher.finalize());
        if let Some(expected) = kind.expected_sha256() {
            if hash != expected {
                std::fs::remove_file(&temp_path).ok();
                anyhow::bail!(
                    "Checksum mismatch for {}: expected {}, got {}",
                    kind.filename(),
                    expected,
                    hash
                );
            }
        }

        std::fs::rename(&temp_path, path).context("Failed to move download into place")?;
        Ok(())
    }

    fn update_manifest(&self, kind: ModelKind) -> Result<()> {
        let mut manifest = self.load_manifest().unwrap_or_default();

        let path = self.model_path(kind);
        let metadata = std::fs::metadata(&path)?;
        let hash = {
            let data = std::fs::read(&path)?;
            let mut hasher = Sha256::new();
            hasher.update(&data);
            format!("{:x}", hasher.finalize())
        };

        let entry = ModelEntry {
            filename: kind.filename().to_string(),
            size_bytes: metadata.len(),
            sha256: hash,
        };

        if let Some(existing) = manifest
            .models
            .iter_mut()
            .find(|m| m.filename == entry.filename)
        {
            *existing = entry;
        } else {
            manifest.models.push(entry);
        }

        self.save_manifest(&manifest)
    }

    /// Load the model manifest
    pub fn load_manifest(&self) -> Result<ModelManifest> {
        let manifest_path = self.models_dir.join("manifest.json");
        if manifest_path.exists() {
            let content = std::fs::read_to_string(&manifest_path)?;
            Ok(serde_json::from_str(&content)?)
        } else {
            Ok(ModelManifest::default())
        }
    }

    /// Save the model manifest
    pub fn save_manifest(&self, manifest: &ModelManifest) -> Result<()> {
        let manifest_path = self.models_dir.join("manifest.json");
        let content = serde_json::to_string_pretty(manifest)?;
        std::fs::write(manifest_path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_filenames() {
        assert_eq!(ModelKind::Detection.filename(), "det.onnx");
        assert_eq!(ModelKind::Recognition.filename(), "rec.onnx");
        assert_eq!(ModelKind::Dictionary.filename(), "dict.txt");
    }

    #[test]
    fn test_manager_with_dir() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::with_dir(dir.path().join("models")).unwrap();
        assert!(manager.models_dir().exists());
        assert!(!manager.is_available(ModelKind::Detection));
        assert!(!manager.all_available());
    }

    #[test]
    fn test_size_range_check() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::with_dir(dir.path().to_path_buf()).unwrap();

        // A file outside the plausible size range is treated as missing
        std::fs::write(manager.model_path(ModelKind::Dictionary), b"x").unwrap();
        assert!(!manager.is_available(ModelKind::Dictionary));

        std::fs::write(manager.model_path(ModelKind::Dictionary), vec![b'a'; 1500]).unwrap();
        assert!(manager.is_available(ModelKind::Dictionary));
    }

    #[test]
    fn test_manifest_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ModelManager::with_dir(dir.path().to_path_buf()).unwrap();

        let manifest = ModelManifest {
            models: vec![ModelEntry {
                filename: "det.onnx".to_string(),
                size_bytes: 42,
                sha256: "abc".to_string(),
            }],
        };
        manager.save_manifest(&manifest).unwrap();

        let loaded = manager.load_manifest().unwrap();
        assert_eq!(loaded.models.len(), 1);
        assert_eq!(loaded.models[0].filename, "det.onnx");
    }
}
