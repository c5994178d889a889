//! TOML configuration.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all) yields a working configuration. See `config/docchat.example.toml`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Maximum characters per chunk.
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    /// Characters shared between consecutive chunks.
    #[serde(default = "default_overlap")]
    pub overlap: usize,
    /// How far back from a window's end to look for a sentence boundary.
    #[serde(default = "default_boundary_window")]
    pub boundary_window: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap: default_overlap(),
            boundary_window: default_boundary_window(),
        }
    }
}

fn default_max_chars() -> usize {
    1000
}
fn default_overlap() -> usize {
    100
}
fn default_boundary_window() -> usize {
    50
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    /// Hits returned by the direct strategy.
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Base hits fetched by the expansion strategy.
    #[serde(default = "default_expansion_base_k")]
    pub expansion_base_k: usize,
    /// Number of expansion terms searched.
    #[serde(default = "default_expansion_terms")]
    pub expansion_terms: usize,
    /// Hits fetched per expansion term.
    #[serde(default = "default_expansion_term_k")]
    pub expansion_term_k: usize,
    /// Most recent history messages included in a prompt.
    #[serde(default = "default_history_window")]
    pub history_window: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            expansion_base_k: default_expansion_base_k(),
            expansion_terms: default_expansion_terms(),
            expansion_term_k: default_expansion_term_k(),
            history_window: default_history_window(),
        }
    }
}

fn default_top_k() -> usize {
    5
}
fn default_expansion_base_k() -> usize {
    3
}
fn default_expansion_terms() -> usize {
    3
}
fn default_expansion_term_k() -> usize {
    2
}
fn default_history_window() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct MemoryConfig {
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
        }
    }
}

fn default_max_messages() -> usize {
    10
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    /// `"gemini"` or `"disabled"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Model used when a request carries an image.
    #[serde(default = "default_model")]
    pub vision_model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            vision_model: default_model(),
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "gemini".to_string()
}
fn default_model() -> String {
    "gemini-2.0-flash".to_string()
}
fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}
fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}
fn default_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}
fn default_max_upload_bytes() -> usize {
    20 * 1024 * 1024
}

impl Config {
    /// Check cross-field invariants.
    pub fn validate(&self) -> Result<()> {
        if self.chunking.max_chars == 0 {
            anyhow::bail!("chunking.max_chars must be > 0");
        }
        if self.chunking.overlap >= self.chunking.max_chars {
            anyhow::bail!("chunking.overlap must be < chunking.max_chars");
        }
        if self.chunking.boundary_window > self.chunking.max_chars {
            anyhow::bail!("chunking.boundary_window must be <= chunking.max_chars");
        }
        if self.retrieval.top_k == 0 || self.retrieval.expansion_base_k == 0 {
            anyhow::bail!("retrieval.top_k and retrieval.expansion_base_k must be >= 1");
        }
        if self.memory.max_messages == 0 {
            anyhow::bail!("memory.max_messages must be >= 1");
        }
        match self.generation.provider.as_str() {
            "disabled" | "gemini" => {}
            other => anyhow::bail!(
                "Unknown generation provider: '{}'. Must be disabled or gemini.",
                other
            ),
        }
        Ok(())
    }
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

/// Load a config file. A missing file yields the defaults.
pub fn load_config(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        return Ok(Config::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_uses_defaults() {
        let cfg = parse_config("").unwrap();
        assert_eq!(cfg.chunking.max_chars, 1000);
        assert_eq!(cfg.chunking.overlap, 100);
        assert_eq!(cfg.retrieval.top_k, 5);
        assert_eq!(cfg.memory.max_messages, 10);
        assert_eq!(cfg.generation.provider, "gemini");
        assert_eq!(cfg.server.bind, "127.0.0.1:8000");
    }

    #[test]
    fn test_partial_section() {
        let cfg = parse_config("[chunking]\nmax_chars = 400\n").unwrap();
        assert_eq!(cfg.chunking.max_chars, 400);
        assert_eq!(cfg.chunking.overlap, 100);
    }

    #[test]
    fn test_overlap_must_be_smaller_than_max() {
        let err = parse_config("[chunking]\nmax_chars = 100\noverlap = 100\n").unwrap_err();
        assert!(err.to_string().contains("overlap"));
    }

    #[test]
    fn test_zero_max_chars_rejected() {
        assert!(parse_config("[chunking]\nmax_chars = 0\noverlap = 0\n").is_err());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let err = parse_config("[generation]\nprovider = \"magic\"\n").unwrap_err();
        assert!(err.to_string().contains("magic"));
    }

    #[test]
    fn test_missing_file_is_default() {
        let cfg = load_config(Path::new("/definitely/not/here.toml")).unwrap();
        assert_eq!(cfg.retrieval.expansion_base_k, 3);
    }
}
