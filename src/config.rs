use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,
    #[serde(default)]
    pub performance: PerformanceConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

/// Input folders, output tables and the graph store location
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Folder of plaintext documents; watched for changes in `run` mode.
    pub docs_folder: PathBuf,
    /// Query/backstory table (query_number, book_name, char, caption, content).
    pub queries_csv: PathBuf,
    pub ingestion_log: PathBuf,
    pub results_csv: PathBuf,
    pub db_path: PathBuf,
    #[serde(default = "default_schema_prompt_path")]
    pub schema_prompt_path: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Language model configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_extraction_model")]
    pub extraction_model: String,
    /// Lighter model used to pull entity names out of a claim before graph lookup
    #[serde(default = "default_entity_model")]
    pub entity_model: String,
    #[serde(default = "default_extraction_model")]
    pub decomposition_model: String,
    #[serde(default = "default_extraction_model")]
    pub reasoning_model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            extraction_model: default_extraction_model(),
            entity_model: default_entity_model(),
            decomposition_model: default_extraction_model(),
            reasoning_model: default_extraction_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Embeddings configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingsConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dimensions: default_dimensions(),
        }
    }
}

/// Chunking and concurrency tuning
#[derive(Debug, Clone, Deserialize)]
pub struct PerformanceConfig {
    #[serde(default = "default_chunk_size_tokens")]
    pub chunk_size_tokens: usize,
    #[serde(default = "default_chunk_overlap_tokens")]
    pub chunk_overlap_tokens: usize,
    /// Upper bound on in-flight model calls per pipeline stage
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            chunk_size_tokens: default_chunk_size_tokens(),
            chunk_overlap_tokens: default_chunk_overlap_tokens(),
            max_concurrency: default_max_concurrency(),
            debounce_ms: default_debounce_ms(),
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    #[serde(default = "default_graph_evidence_limit")]
    pub graph_evidence_limit: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            graph_evidence_limit: default_graph_evidence_limit(),
        }
    }
}

fn default_schema_prompt_path() -> PathBuf {
    PathBuf::from("config/schema_prompt.txt")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_extraction_model() -> String {
    "gemini-2.5-flash-lite".to_string()
}

fn default_entity_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_embedding_model() -> String {
    "embedding-001".to_string()
}

fn default_dimensions() -> usize {
    768
}

fn default_chunk_size_tokens() -> usize {
    250
}

fn default_chunk_overlap_tokens() -> usize {
    50
}

fn default_max_concurrency() -> usize {
    8
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_top_k() -> usize {
    3
}

fn default_graph_evidence_limit() -> usize {
    10
}

impl Config {
    /// Load configuration from file
    ///
    /// Loads environment variables from .env file (if present) before loading config.
    /// Looks for config file in this order:
    /// 1. Path specified in CLAIMGRAPH_CONFIG environment variable
    /// 2. ./config.toml in current directory
    pub fn load() -> Result<Self> {
        // Optional: credentials usually live in .env
        let _ = dotenv::dotenv();

        let config_path = std::env::var("CLAIMGRAPH_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config.toml"));

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let config = Self::from_toml_str(&config_str)?;
        config.validate()?;

        Ok(config)
    }

    /// Parse configuration without touching the environment or validating paths
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        toml::from_str(config_str).context("Failed to parse config.toml")
    }

    /// Validate configuration values
    fn validate(&self) -> Result<()> {
        let docs = &self.pipeline.docs_folder;
        if !docs.exists() {
            anyhow::bail!(
                "docs_folder path does not exist: {}. Set docs_folder in config.toml to your corpus directory.",
                docs.display()
            );
        }

        if !docs.is_dir() {
            anyhow::bail!(
                "docs_folder must be a directory, not a file: {}",
                docs.display()
            );
        }

        std::env::var(&self.llm.api_key_env).with_context(|| {
            format!(
                "Environment variable {} not set. Set it in your .env file or as an environment variable with your Gemini API key.",
                self.llm.api_key_env
            )
        })?;

        if self.embeddings.dimensions == 0 {
            anyhow::bail!("embeddings.dimensions must be greater than 0");
        }

        if self.search.top_k == 0 {
            anyhow::bail!("search.top_k must be greater than 0");
        }

        if self.performance.max_concurrency == 0 {
            anyhow::bail!("performance.max_concurrency must be greater than 0");
        }

        if self.performance.chunk_size_tokens == 0 {
            anyhow::bail!("performance.chunk_size_tokens must be greater than 0");
        }

        if self.performance.chunk_overlap_tokens >= self.performance.chunk_size_tokens {
            anyhow::bail!(
                "performance.chunk_overlap_tokens must be less than chunk_size_tokens"
            );
        }

        Ok(())
    }

    /// Read the API key named by `llm.api_key_env`
    pub fn api_key(&self) -> Result<String> {
        std::env::var(&self.llm.api_key_env).with_context(|| {
            format!(
                "Environment variable {} not set. Set it in your .env file or as an environment variable.",
                self.llm.api_key_env
            )
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.pipeline.db_path
    }

    pub fn docs_folder(&self) -> &Path {
        &self.pipeline.docs_folder
    }
}
