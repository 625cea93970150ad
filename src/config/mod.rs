//! Application Configuration
//!
//! User settings and preferences stored in TOML format.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Detector settings
    pub detector: DetectorSettings,
    /// Background fill settings
    pub fill: FillSettings,
    /// Replacement text rendering settings
    pub font: FontSettings,
}

/// Text detector settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectorSettings {
    /// Override for the model cache directory (default: platform data dir)
    pub models_dir: Option<PathBuf>,
    /// Drop detections below this confidence before matching.
    /// Disabled by default: confidence is passed through unfiltered.
    pub min_confidence: Option<f32>,
}

/// How the original glyphs are erased before redrawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillStrategy {
    /// Solid fill with the mean color of a margin ring around the box
    #[default]
    Flat,
    /// Gaussian-blurred copy of the box itself (keeps local texture,
    /// leaves a soft residue of the original glyphs)
    Blur,
}

/// Background reconstruction settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FillSettings {
    /// Fill strategy
    pub strategy: FillStrategy,
    /// Margin ring width in pixels sampled around a box (flat fill)
    pub margin: u32,
    /// Gaussian blur sigma (blur fill)
    pub blur_sigma: f32,
}

impl Default for FillSettings {
    fn default() -> Self {
        Self {
            strategy: FillStrategy::Flat,
            margin: 5,
            blur_sigma: 8.0,
        }
    }
}

/// Replacement text settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FontSettings {
    /// Bold typeface file looked up by the font loader. Absence is
    /// non-fatal; rendering degrades to the built-in bitmap font.
    pub typeface: PathBuf,
    /// Smallest font size the fitter will shrink to
    pub min_size: u32,
    /// Size decrement per fit iteration
    pub shrink_step: u32,
}

impl Default for FontSettings {
    fn default() -> Self {
        Self {
            typeface: PathBuf::from("DejaVuSans-Bold.ttf"),
            min_size: 10,
            shrink_step: 2,
        }
    }
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;
    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;
    Ok(config)
}

/// Save configuration to a TOML file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config).context("Failed to serialize config")?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write config file: {:?}", path))?;
    Ok(())
}

/// Get the platform config directory for retext
pub fn get_config_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "retext")
        .context("Failed to determine config directory")?;
    let dir = dirs.config_dir().to_path_buf();
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Get the platform data directory (model cache lives here)
pub fn get_data_dir() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "retext")
        .context("Failed to determine data directory")?;
    let dir = dirs.data_dir().to_path_buf();
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.fill.strategy, FillStrategy::Flat);
        assert_eq!(config.fill.margin, 5);
        assert_eq!(config.font.min_size, 10);
        assert_eq!(config.font.shrink_step, 2);
        assert!(config.detector.min_confidence.is_none());
    }

    #[test]
    fn test_config_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = AppConfig::default();
        config.fill.strategy = FillStrategy::Blur;
        config.detector.min_confidence = Some(0.4);

        save_config(&config, &path).unwrap();
        let loaded = load_config(&path).unwrap();

        assert_eq!(loaded.fill.strategy, FillStrategy::Blur);
        assert_eq!(loaded.detector.min_confidence, Some(0.4));
    }
}
