//! Application settings management

use crate::{ConfigError, PathManager, ToolCommand};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Application settings stored in settings.toml. Every field is optional;
/// anything left out falls back to the built-in defaults.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Settings {
    #[serde(default)]
    pub llm: LlmSettings,
    #[serde(default)]
    pub render: RenderSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct LlmSettings {
    pub api_key: Option<String>,
    /// Endpoint root, e.g. "https://integrate.api.nvidia.com"
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub max_tokens: Option<u32>,
    /// Whole-request timeout for the completion call; unset means no limit
    pub request_timeout_secs: Option<u64>,
    pub max_history_messages: Option<usize>,
    pub max_history_chars: Option<usize>,
    pub stream: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct RenderSettings {
    pub timeout_secs: Option<u64>,
    pub dpi: Option<u32>,
    pub compiler: Option<ToolCommand>,
    pub rasterizer: Option<ToolCommand>,
    /// Parent directory for per-render scratch directories
    pub scratch_dir: Option<PathBuf>,
}

impl Settings {
    /// Load settings from the settings file, or return defaults if not found
    pub fn load() -> Result<Self, ConfigError> {
        match PathManager::settings_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No settings file at {:?}, using defaults", path);
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }
}
