use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{layout::CellSize, Result};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub output: OutputConfig,
    pub sheet: SheetConfig,
    pub animation: AnimationConfig,
    pub numbering: NumberingConfig,
}

impl AppConfig {
    /// Reads a JSON configuration file. Missing fields fall back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = serde_json::from_str(&text)?;
        tracing::debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }
}

/// Where artifacts are written and how they are addressed by callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub root: PathBuf,
    /// Prefix used when turning an artifact path into a served URL.
    pub url_prefix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("assets/outputs"),
            url_prefix: "/view".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetConfig {
    pub columns: u32,
    pub autotrim: bool,
    pub fixed_cell: bool,
    pub cell: Option<CellSize>,
    /// Inter-cell spacing for the padded sheet variant. Non-zero selects that
    /// variant in the `sheet` command.
    pub padding: u32,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            columns: 3,
            autotrim: true,
            fixed_cell: false,
            cell: None,
            padding: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    pub fps: u32,
    pub autotrim: bool,
    pub frame_size: Option<CellSize>,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            fps: 8,
            autotrim: true,
            frame_size: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NumberingConfig {
    pub normalize: bool,
    pub start_index: u32,
    pub pad_width: usize,
}

impl Default for NumberingConfig {
    fn default() -> Self {
        Self {
            normalize: true,
            start_index: 1,
            pad_width: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_files_fall_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "sheet": { "columns": 6 }, "animation": { "fps": 12 } }"#)
            .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.sheet.columns, 6);
        assert!(config.sheet.autotrim);
        assert_eq!(config.animation.fps, 12);
        assert_eq!(config.numbering.pad_width, 2);
        assert_eq!(config.output.url_prefix, "/view");
    }

    #[test]
    fn rejects_malformed_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(AppConfig::load(&path).is_err());
    }
}
