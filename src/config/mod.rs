// Configuration management module
// TOML settings plus startup validation for every tunable.

pub mod settings;

pub use settings::{
    Config, ConfigError, ContentConfig, EmbeddingBackendKind, EmbeddingConfig,
    GenerationBackendKind, GenerationConfig, MemoryConfig, RetrievalConfig,
};

/// Get the default configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join("ragchat"))
        .ok_or(ConfigError::DirectoryError)
}
