//! Application configuration, loaded from an optional `doctalk.toml` in the
//! working directory. Every field has a default so the service runs with no
//! config file at all.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Config file name, resolved relative to the working directory.
pub const CONFIG_FILE: &str = "doctalk.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Top-level service configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct AppConfig {
    /// Directory holding the vector index. Its existence on disk is the sole
    /// signal distinguishing a fresh start from a warm one.
    pub data_dir: PathBuf,
    /// Address the HTTP server binds to.
    pub bind_addr: String,
    /// Maximum segment length in characters.
    pub chunk_size: usize,
    /// Overlap between neighboring segments in characters.
    pub chunk_overlap: usize,
    /// Number of segments retrieved per question.
    pub top_k: usize,
    pub ollama: OllamaConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("db"),
            bind_addr: "127.0.0.1:8080".to_string(),
            chunk_size: 1000,
            chunk_overlap: 400,
            top_k: 4,
            ollama: OllamaConfig::default(),
        }
    }
}

/// Ollama backend configuration, shared by embeddings and chat.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct OllamaConfig {
    pub base_url: String,
    pub chat_model: String,
    pub embedding_model: String,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434".to_string(),
            chat_model: "llama3.2:3b".to_string(),
            embedding_model: "nomic-embed-text".to_string(),
        }
    }
}

/// Load configuration from `doctalk.toml` if present, defaults otherwise.
pub fn load() -> Result<AppConfig, ConfigError> {
    load_from(Path::new(CONFIG_FILE))
}

fn load_from(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}
