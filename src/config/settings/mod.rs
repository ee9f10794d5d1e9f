
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::chunking::ChunkingConfig;

pub const DEFAULT_EMBEDDING_DIMENSION: u32 = 768;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub gemini: GeminiConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    /// Root directory holding the portfolio markdown documents; relative
    /// paths resolve against the base directory
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("portfolio-content")
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeminiConfig {
    pub protocol: String,
    pub host: String,
    pub model: String,
    /// Environment variable holding the API key; the key itself never lives in the TOML
    pub api_key_env: String,
    pub embedding_dimension: u32,
}

impl Default for GeminiConfig {
    #[inline]
    fn default() -> Self {
        Self {
            protocol: "https".to_string(),
            host: "generativelanguage.googleapis.com".to_string(),
            model: "gemini-embedding-001".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Maximum L2 distance accepted for a chunk; calibrated per embedding model
    pub max_l2_distance: f32,
    /// Over-fetch multiplier applied to top_k before threshold filtering
    pub candidate_factor: usize,
    pub default_top_k: usize,
    pub stack_top_k: usize,
    pub work_top_k: usize,
    pub projects_top_k: usize,
}

impl Default for RetrievalConfig {
    #[inline]
    fn default() -> Self {
        Self {
            max_l2_distance: 1.2,
            candidate_factor: 3,
            default_top_k: 3,
            stack_top_k: 5,
            work_top_k: 6,
            projects_top_k: 10,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("API key environment variable {0} is not set")]
    MissingApiKey(String),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid chunk size: {0} (must be at least 1)")]
    InvalidChunkSize(usize),
    #[error("Chunk overlap ({0}) must be smaller than chunk size ({1})")]
    OverlapTooLarge(usize, usize),
    #[error("Invalid max L2 distance: {0} (must be positive)")]
    InvalidMaxDistance(f32),
    #[error("Invalid top_k: {0} (must be at least 1)")]
    InvalidTopK(usize),
    #[error("Invalid candidate factor: {0} (must be at least 1)")]
    InvalidCandidateFactor(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            gemini: GeminiConfig::default(),
            chunking: ChunkingConfig::default(),
            retrieval: RetrievalConfig::default(),
            data_dir: default_data_dir(),
            base_dir: PathBuf::new(),
        }
    }
}

impl Config {
    #[inline]
    pub fn default_base_dir() -> Result<PathBuf, ConfigError> {
        dirs::home_dir()
            .map(|home| home.join(".portfolio-rag"))
            .or({
                #[cfg(windows)]
                {
                    dirs::data_dir().map(|data| data.join("portfolio-rag"))
                }
                #[cfg(not(windows))]
                {
                    None
                }
            })
            .ok_or(ConfigError::DirectoryError)
    }

    #[inline]
    pub fn load<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let config_path = base_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            let mut config = Self {
                base_dir: base_dir.as_ref().to_path_buf(),
                ..Self::default()
            };
            config.resolve_data_dir();
            return Ok(config);
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = base_dir.as_ref().to_path_buf();
        config.resolve_data_dir();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        fs::create_dir_all(&self.base_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                self.base_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.gemini.validate()?;

        if self.chunking.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize(self.chunking.chunk_size));
        }
        if self.chunking.overlap >= self.chunking.chunk_size {
            return Err(ConfigError::OverlapTooLarge(
                self.chunking.overlap,
                self.chunking.chunk_size,
            ));
        }

        let retrieval = &self.retrieval;
        if retrieval.max_l2_distance <= 0.0 {
            return Err(ConfigError::InvalidMaxDistance(retrieval.max_l2_distance));
        }
        if retrieval.candidate_factor == 0 {
            return Err(ConfigError::InvalidCandidateFactor(
                retrieval.candidate_factor,
            ));
        }
        for top_k in [
            retrieval.default_top_k,
            retrieval.stack_top_k,
            retrieval.work_top_k,
            retrieval.projects_top_k,
        ] {
            if top_k == 0 {
                return Err(ConfigError::InvalidTopK(top_k));
            }
        }

        Ok(())
    }

    fn resolve_data_dir(&mut self) {
        if self.data_dir.is_relative() {
            self.data_dir = self.base_dir.join(&self.data_dir);
        }
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.base_dir.join("config.toml")
    }

    /// Path of the serialized flat vector index artifact
    #[inline]
    pub fn index_path(&self) -> PathBuf {
        self.base_dir.join("vector_store.bin")
    }

    /// Path of the serialized chunk metadata artifact
    #[inline]
    pub fn metadata_path(&self) -> PathBuf {
        self.base_dir.join("vector_metadata.json")
    }
}

impl GeminiConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        let url_str = format!("{}://{}", self.protocol, self.host);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))?;

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if !(64..=4096).contains(&self.embedding_dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding_dimension,
            ));
        }

        Ok(())
    }

    pub fn base_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}", self.protocol, self.host);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }

    /// Resolve the API key from the configured environment variable
    pub fn api_key(&self) -> Result<String, ConfigError> {
        env::var(&self.api_key_env)
            .map_err(|_| ConfigError::MissingApiKey(self.api_key_env.clone()))
    }
}
