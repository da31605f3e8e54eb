//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory where models are stored
    pub model_dir: PathBuf,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("~/.lumen/models"),
        }
    }
}

/// Tagger model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Hugging Face repository holding `model.onnx` and `selected_tags.csv`
    pub repo: String,

    /// Model name reported in responses (`model.name`)
    pub name: String,

    /// Square input size the model expects, in pixels
    pub image_size: u32,

    /// Never fetch missing model files; fail with "model not loaded" instead
    pub skip_auto_download: bool,

    /// Load the model at startup instead of on the first request
    pub preload: bool,

    /// Base URL for model downloads
    pub download_base_url: String,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            repo: "SmilingWolf/wd-vit-tagger-v3".to_string(),
            name: "vit".to_string(),
            image_size: 448,
            skip_auto_download: false,
            preload: true,
            download_base_url: "https://huggingface.co".to_string(),
        }
    }
}

impl ModelConfig {
    /// Directory name for this repo under the model dir (`owner--name`).
    pub fn local_dir_name(&self) -> String {
        self.repo.replace('/', "--")
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,

    /// Bind port
    pub port: u16,

    /// Maximum request body size in megabytes
    pub body_limit_mb: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            body_limit_mb: 32,
        }
    }
}

impl ServerConfig {
    /// `host:port` string suitable for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Body limit in bytes.
    pub fn body_limit_bytes(&self) -> usize {
        self.body_limit_mb.saturating_mul(1024 * 1024)
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum image dimension (width or height)
    pub max_image_dimension: u32,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_image_dimension: 10000,
        }
    }
}

/// Threshold defaults applied when a request leaves them out.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Minimum confidence for general tags
    pub general_threshold: f32,

    /// Minimum confidence for character tags
    pub character_threshold: f32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            general_threshold: 0.6,
            character_threshold: 0.85,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
