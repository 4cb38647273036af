use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable holding the API credential for embeddings and chat.
pub const API_KEY_VAR: &str = "OPENAI_API_KEY";
/// Environment variable that overrides `sources.user_agent`.
pub const USER_AGENT_VAR: &str = "USER_AGENT";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub sources: SourcesConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub answer: AnswerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourcesConfig {
    pub root: PathBuf,
    #[serde(default)]
    pub urls: Vec<String>,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (compatible; DocConcierge/1.0)".to_string()
}
fn default_fetch_timeout_secs() -> u64 {
    30
}

impl SourcesConfig {
    /// User-Agent for web fetches; the environment wins over the file.
    pub fn effective_user_agent(&self) -> String {
        std::env::var(USER_AGENT_VAR)
            .ok()
            .filter(|ua| !ua.trim().is_empty())
            .unwrap_or_else(|| self.user_agent.clone())
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    #[serde(default = "default_separator")]
    pub separator: String,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            separator: default_separator(),
        }
    }
}

fn default_chunk_size() -> usize {
    500
}
fn default_chunk_overlap() -> usize {
    50
}
fn default_separator() -> String {
    "\n".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_embedding_model(),
            batch_size: default_batch_size(),
            max_retries: 0,
            timeout_secs: default_timeout_secs(),
            base_url: default_base_url(),
        }
    }
}

fn default_provider() -> String {
    "openai".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout_secs(),
            base_url: default_base_url(),
        }
    }
}

fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_temperature() -> f32 {
    0.5
}
fn default_llm_timeout_secs() -> u64 {
    60
}

/// Fixed answer sentinels and display strings.
#[derive(Debug, Deserialize, Clone)]
pub struct AnswerConfig {
    /// Reply the model is told to give in search mode when nothing matches.
    #[serde(default = "default_no_doc_match_answer")]
    pub no_doc_match_answer: String,
    /// Message shown to the user for a search-mode miss.
    #[serde(default = "default_no_doc_match_message")]
    pub no_doc_match_message: String,
    /// Reply the model is told to give in inquiry mode when nothing matches.
    #[serde(default = "default_inquiry_no_match_answer")]
    pub inquiry_no_match_answer: String,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            no_doc_match_answer: default_no_doc_match_answer(),
            no_doc_match_message: default_no_doc_match_message(),
            inquiry_no_match_answer: default_inquiry_no_match_answer(),
        }
    }
}

fn default_no_doc_match_answer() -> String {
    "No matching documents.".to_string()
}
fn default_no_doc_match_message() -> String {
    "No documents related to your input were found. Try different wording.".to_string()
}
fn default_inquiry_no_match_answer() -> String {
    "I could not find information related to your question in the indexed documents."
        .to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_log_file")]
    pub file: String,
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            file: default_log_file(),
            level: default_log_level(),
        }
    }
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("./logs")
}
fn default_log_file() -> String {
    "concierge.log".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    config.validate()?;
    Ok(config)
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        // Validate chunking
        if self.chunking.chunk_size == 0 {
            anyhow::bail!("chunking.chunk_size must be > 0");
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            anyhow::bail!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap,
                self.chunking.chunk_size
            );
        }

        // Validate retrieval
        if self.retrieval.top_k < 1 {
            anyhow::bail!("retrieval.top_k must be >= 1");
        }

        // Validate embedding
        if self.embedding.batch_size == 0 {
            anyhow::bail!("embedding.batch_size must be > 0");
        }
        match self.embedding.provider.as_str() {
            "openai" => {}
            other => anyhow::bail!("Unknown embedding provider: '{}'. Must be openai.", other),
        }

        // Validate llm
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            anyhow::bail!("llm.temperature must be in [0.0, 2.0]");
        }

        for url in &self.sources.urls {
            let parsed = reqwest::Url::parse(url)
                .with_context(|| format!("sources.urls: invalid URL '{}'", url))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                anyhow::bail!("sources.urls: '{}' must use http or https", url);
            }
        }

        Ok(())
    }
}
