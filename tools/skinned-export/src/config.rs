//! Export configuration (skinned.toml)
//!
//! Every field has a default, so a missing file or an empty table is a valid configuration.
//! Command-line flags are applied on top by the caller.

use serde::{Deserialize, Serialize};
use skinned_common::{BuildOptions, CoordinateConverter, CoordinateSystem};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Looked up in the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "skinned.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub coordinates: CoordinatesConfig,
    #[serde(default)]
    pub skeleton: SkeletonConfig,
    #[serde(default)]
    pub animation: AnimationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoordinatesConfig {
    #[serde(default)]
    pub negative_forward: bool,
    /// Engine-side system of the files.
    #[serde(default = "default_source")]
    pub source: CoordinateSystem,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkeletonConfig {
    #[serde(default = "default_true")]
    pub only_deform_bones: bool,
    #[serde(default = "default_true")]
    pub check_for_exportation: bool,
    #[serde(default)]
    pub rebuild_missing_ids: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimationConfig {
    /// Defaults to the first sampled frame.
    #[serde(default)]
    pub first_frame: Option<i32>,
    /// Inclusive. Defaults to the last sampled frame.
    #[serde(default)]
    pub last_frame: Option<i32>,
}

fn default_true() -> bool {
    true
}

fn default_source() -> CoordinateSystem {
    CoordinateSystem::Unity
}

impl Default for CoordinatesConfig {
    fn default() -> Self {
        Self {
            negative_forward: false,
            source: default_source(),
        }
    }
}

impl Default for SkeletonConfig {
    fn default() -> Self {
        Self {
            only_deform_bones: true,
            check_for_exportation: true,
            rebuild_missing_ids: false,
        }
    }
}

impl CoordinatesConfig {
    /// File space to tool space.
    pub fn import_converter(&self) -> CoordinateConverter {
        CoordinateConverter::new(self.source, CoordinateSystem::Blender)
            .with_negative_forward(self.negative_forward)
    }

    /// Tool space to file space.
    pub fn export_converter(&self) -> CoordinateConverter {
        self.import_converter().inverse()
    }
}

impl SkeletonConfig {
    pub fn build_options(&self) -> BuildOptions {
        BuildOptions {
            only_deform_bones: self.only_deform_bones,
            check_for_exportation: self.check_for_exportation,
        }
    }
}

impl Config {
    pub fn from_toml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads `path`, or [`DEFAULT_CONFIG_FILE`] if present, or the defaults.
    ///
    /// An explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        };

        if !required && !path.exists() {
            tracing::debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = Self::from_toml(&content, &path)?;
        tracing::debug!("Loaded config from {}: {:?}", path.display(), config);
        Ok(config)
    }
}
