// Configuration management module
// Handles TOML configuration loading, validation, and artifact paths

pub mod settings;

pub use settings::{Config, ConfigError, GeminiConfig, RetrievalConfig};

/// Get the default base directory for config and index artifacts
#[inline]
pub fn default_base_dir() -> Result<std::path::PathBuf, ConfigError> {
    Config::default_base_dir()
}
