use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub graphrag: GraphragConfig,
    pub embeddings: EmbeddingsConfig,
    #[serde(default)]
    pub graph: GraphConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
}

/// Corpus and persistence locations
#[derive(Debug, Clone, Deserialize)]
pub struct GraphragConfig {
    /// Directory holding the `.md` / `.txt` corpus.
    pub data_dir: PathBuf,
    /// Directory where `entities.json`, `relations.json` and the GraphML export live.
    pub graph_dir: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Embeddings configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingsConfig {
    pub provider: String,
    pub model: String,
    pub api_key_env: String,
    pub batch_size: usize,
    pub dimensions: usize,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
}

/// Knowledge graph build configuration
#[derive(Debug, Clone, Deserialize)]
pub struct GraphConfig {
    /// Entities mentioned fewer times than this across the corpus are dropped.
    #[serde(default = "default_min_entity_freq")]
    pub min_entity_freq: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            min_entity_freq: default_min_entity_freq(),
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_max_hops")]
    pub max_hops: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_hops: default_max_hops(),
        }
    }
}

/// Document chunking configuration (sizes in characters)
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
        }
    }
}

fn default_cache_capacity() -> usize {
    1000
}

fn default_min_entity_freq() -> usize {
    2
}

fn default_top_k() -> usize {
    5
}

fn default_max_hops() -> usize {
    2
}

fn default_chunk_size() -> usize {
    500
}

fn default_chunk_overlap() -> usize {
    50
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in GRAPHRAG_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // .env is optional
        let _ = dotenv::dotenv();

        let config_path = std::env::var("GRAPHRAG_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config: Config = toml::from_str(&config_str)
            .context("Failed to parse config.toml")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        if !self.graphrag.data_dir.exists() {
            anyhow::bail!(
                "data_dir path does not exist: {}. Set data_dir in config.toml to your docs directory.",
                self.graphrag.data_dir.display()
            );
        }

        if !self.graphrag.data_dir.is_dir() {
            anyhow::bail!(
                "data_dir must be a directory, not a file: {}",
                self.graphrag.data_dir.display()
            );
        }

        // The API key is checked where an embedder is built; graph-only commands run without it.
        if !self.embeddings.provider.eq_ignore_ascii_case("openai") {
            anyhow::bail!(
                "Unsupported embeddings.provider '{}'. Only \"openai\" is supported.",
                self.embeddings.provider
            );
        }

        if self.embeddings.dimensions == 0 {
            anyhow::bail!("embeddings.dimensions must be greater than 0");
        }

        if self.graph.min_entity_freq == 0 {
            anyhow::bail!("graph.min_entity_freq must be at least 1");
        }

        if self.retrieval.top_k == 0 {
            anyhow::bail!("retrieval.top_k must be greater than 0");
        }

        if self.chunking.chunk_size == 0 {
            anyhow::bail!("chunking.chunk_size must be greater than 0");
        }

        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            anyhow::bail!("chunking.chunk_overlap must be less than chunk_size");
        }

        Ok(())
    }

    /// Get the corpus directory
    pub fn data_dir(&self) -> &Path {
        &self.graphrag.data_dir
    }

    /// Get the persisted graph directory
    pub fn graph_dir(&self) -> &Path {
        &self.graphrag.graph_dir
    }
}
