use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::catalog::{CatalogError, LabelCatalog};
use crate::inference::preprocess::{CHANNELS, Preprocessor};

const CONFIG_ENV: &str = "AGROSCAN_CONFIG";
const CONFIG_FILE: &str = "config/agroscan.yaml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
    #[error("Invalid label configuration: {0}")]
    Catalog(#[from] CatalogError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub version: f32,
    pub model: ModelConfig,
    pub image: ImageConfig,
    pub labels: Vec<String>,
    pub advice: AdviceConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub path: PathBuf,
    /// Set for artifacts whose last layer emits logits instead of probabilities.
    #[serde(default)]
    pub apply_softmax: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageConfig {
    pub size: Vec<u32>,
    pub channels: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdviceConfig {
    pub fallback: String,
    #[serde(default)]
    pub entries: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8081,
            max_upload_bytes: 10 * 1024 * 1024,
        }
    }
}

impl AppConfig {
    /// Reads the YAML file and applies `MODEL_PATH` / `PORT` overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::locate();
        log::info!("Reading configuration from {}", config_path.display());
        let mut config = Self::from_file(&config_path)?;

        if let Ok(model_path) = std::env::var("MODEL_PATH") {
            config.model.path = PathBuf::from(model_path);
        }
        if let Ok(port) = std::env::var("PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("PORT is not a port number: {}", port)))?;
        }
        config.validate()?;
        Ok(config)
    }

    fn locate() -> PathBuf {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return PathBuf::from(path);
        }
        if let Ok(manifest_dir) = std::env::var("CARGO_MANIFEST_DIR") {
            return Path::new(&manifest_dir).join("..").join(CONFIG_FILE);
        }
        PathBuf::from(CONFIG_FILE)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&config_str)
    }

    pub fn from_yaml_str(config_str: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_yaml::from_str(config_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.image.size.len() != 2 || self.image.size.contains(&0) {
            return Err(ConfigError::Invalid(format!(
                "image.size must be [width, height] with non-zero values, got {:?}",
                self.image.size
            )));
        }
        if self.image.channels as usize != CHANNELS {
            return Err(ConfigError::Invalid(format!(
                "image.channels must be {}, got {}",
                CHANNELS, self.image.channels
            )));
        }
        if self.server.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid(
                "server.max_upload_bytes must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn preprocessor(&self) -> Preprocessor {
        Preprocessor::new(self.image.size[0], self.image.size[1])
    }

    pub fn label_catalog(&self) -> Result<LabelCatalog, ConfigError> {
        let catalog = LabelCatalog::new(
            self.labels.clone(),
            self.advice.entries.clone(),
            self.advice.fallback.clone(),
        )?;
        Ok(catalog)
    }
}
