
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::embeddings::ollama::DEFAULT_EMBEDDING_DIMENSION;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    #[serde(default)]
    pub github: GithubConfig,
    #[serde(default)]
    pub docs: DocsConfig,
    #[serde(default)]
    pub ollama: OllamaConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(skip)]
    pub base_dir: PathBuf,
}

/// Repository holding the documentation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GithubConfig {
    pub api_url: String,
    pub owner: String,
    pub repo: String,
    /// Environment variable holding the access token
    pub token_env: String,
    pub user_agent: String,
    pub timeout_seconds: u64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            owner: "aframevr".to_string(),
            repo: "aframe".to_string(),
            token_env: "GITHUB_TOKEN".to_string(),
            user_agent: "docs-rag/0.0.1 (Documentation Indexer)".to_string(),
            timeout_seconds: 30,
        }
    }
}

/// How documentation files are found, split and cited
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DocsConfig {
    /// Directory in the repository holding the documentation
    pub docs_root: String,
    /// Extension of documentation files, without the dot
    pub file_extension: String,
    /// Heading marker that starts a new section
    pub section_delimiter: String,
    /// Public base URL the documentation is served from
    pub source_url: String,
    /// Prefix removed from repository paths before appending them to `source_url`
    pub strip_prefix: String,
    /// Build source URLs from the front-matter `source_code` field when present
    pub prefer_front_matter_url: bool,
    /// Number of files processed concurrently during a crawl
    pub concurrency: usize,
}

impl Default for DocsConfig {
    fn default() -> Self {
        Self {
            docs_root: "docs".to_string(),
            file_extension: "md".to_string(),
            section_delimiter: "#".to_string(),
            source_url: "https://aframe.io/docs/master/".to_string(),
            strip_prefix: "docs/".to_string(),
            prefer_front_matter_url: false,
            concurrency: 4,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OllamaConfig {
    pub protocol: String,
    pub host: String,
    pub port: u16,
    /// Embedding model
    pub model: String,
    /// Model used to generate answers
    pub completion_model: String,
    pub embedding_dimension: u32,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            protocol: "http".to_string(),
            host: "localhost".to_string(),
            port: 11434,
            model: "nomic-embed-text:latest".to_string(),
            completion_model: "llama3.2:latest".to_string(),
            embedding_dimension: DEFAULT_EMBEDDING_DIMENSION,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Minimum cosine similarity for a stored section to be used as grounding
    pub match_threshold: f32,
    /// Maximum number of sections retrieved per question
    pub match_count: usize,
    /// Maximum length, in characters, of the prompt header handed to the model
    pub char_budget: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            match_threshold: 0.6,
            match_count: 5,
            char_budget: 2000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AssistantConfig {
    pub product_name: String,
    pub product_url: String,
    /// Reply sent when answering fails
    pub fallback_reply: String,
    /// Cite rendered `.html` pages instead of `.md` sources
    pub html_links: bool,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            product_name: "A-Frame".to_string(),
            product_url: "https://aframe.io/".to_string(),
            fallback_reply: "Sorry, I could not answer that right now. Please try again later."
                .to_string(),
            html_links: true,
        }
    }
}

impl AssistantConfig {
    /// Instructions placed at the start of every prompt
    #[inline]
    pub fn preamble(&self) -> String {
        format!(
            "From now on, you are an assistant that is only knowledgeable on the {name} web framework ({url}). \
             If any question is not related to {name}, give me a standardized response that tells me \
             you only assist with {name} related questions.",
            name = self.product_name,
            url = self.product_url,
        )
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found or could not be created")]
    DirectoryError,
    #[error("Invalid URL format: {0}")]
    InvalidUrl(String),
    #[error("Invalid port: {0} (must be between 1 and 65535)")]
    InvalidPort(u16),
    #[error("Invalid model name: {0} (cannot be empty)")]
    InvalidModel(String),
    #[error("Invalid protocol: {0} (must be 'http' or 'https')")]
    InvalidProtocol(String),
    #[error("Invalid embedding dimension: {0} (must be between 64 and 4096)")]
    InvalidEmbeddingDimension(u32),
    #[error("Invalid repository: '{0}' (owner and name cannot be empty)")]
    InvalidRepository(String),
    #[error("Invalid section delimiter: '{0}' (cannot be empty or contain whitespace)")]
    InvalidDelimiter(String),
    #[error("Invalid file extension: '{0}' (cannot be empty)")]
    InvalidExtension(String),
    #[error("Invalid concurrency: {0} (must be between 1 and 32)")]
    InvalidConcurrency(usize),
    #[error("Invalid match threshold: {0} (must be greater than 0 and at most 1)")]
    InvalidThreshold(f32),
    #[error("Invalid match count: {0} (must be between 1 and 100)")]
    InvalidMatchCount(usize),
    #[error("Invalid character budget: {0} (must be at least 100)")]
    InvalidCharBudget(usize),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parsing error: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}

impl Config {
    #[inline]
    pub fn load<P: AsRef<Path>>(config_dir: P) -> Result<Self> {
        let config_path = config_dir.as_ref().join("config.toml");

        if !config_path.exists() {
            return Ok(Self {
                base_dir: config_dir.as_ref().to_path_buf(),
                ..Self::default()
            });
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))?;
        config.base_dir = config_dir.as_ref().to_path_buf();

        config
            .validate()
            .with_context(|| "Configuration validation failed")?;

        Ok(config)
    }

    #[inline]
    pub fn save(&self) -> Result<()> {
        self.validate()
            .context("Configuration validation failed before saving")?;

        let config_dir = self.get_base_dir();

        fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        let config_path = self.config_file_path();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;

        Ok(())
    }

    /// Get the base directory for the application
    #[inline]
    pub fn get_base_dir(&self) -> &Path {
        &self.base_dir
    }

    #[inline]
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.github.validate()?;
        self.docs.validate()?;
        self.ollama.validate()?;
        self.retrieval.validate()?;
        Ok(())
    }

    #[inline]
    pub fn config_file_path(&self) -> PathBuf {
        self.get_base_dir().join("config.toml")
    }

    /// Get the path for the vector database directory
    #[inline]
    pub fn vector_database_path(&self) -> PathBuf {
        self.get_base_dir().join("vectors")
    }

    /// File receiving one JSON line per chat exchange
    #[inline]
    pub fn exchange_log_path(&self) -> PathBuf {
        self.get_base_dir().join("exchanges.jsonl")
    }

    #[inline]
    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        self.ollama.ollama_url()
    }
}

impl GithubConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(&self.api_url).map_err(|_| ConfigError::InvalidUrl(self.api_url.clone()))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(self.api_url.clone()));
        }

        if self.owner.trim().is_empty() || self.repo.trim().is_empty() {
            return Err(ConfigError::InvalidRepository(format!(
                "{}/{}",
                self.owner, self.repo
            )));
        }

        Ok(())
    }

    /// Access token read from the configured environment variable, if set
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|token| !token.trim().is_empty())
    }

    pub fn set_repository(&mut self, owner: String, repo: String) -> Result<(), ConfigError> {
        if owner.trim().is_empty() || repo.trim().is_empty() {
            return Err(ConfigError::InvalidRepository(format!("{}/{}", owner, repo)));
        }
        self.owner = owner;
        self.repo = repo;
        Ok(())
    }
}

impl DocsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.section_delimiter.is_empty()
            || self.section_delimiter.chars().any(char::is_whitespace)
        {
            return Err(ConfigError::InvalidDelimiter(self.section_delimiter.clone()));
        }

        if self.file_extension.trim_start_matches('.').is_empty() {
            return Err(ConfigError::InvalidExtension(self.file_extension.clone()));
        }

        Url::parse(&self.source_url).map_err(|_| ConfigError::InvalidUrl(self.source_url.clone()))?;

        if !(1..=32).contains(&self.concurrency) {
            return Err(ConfigError::InvalidConcurrency(self.concurrency));
        }

        Ok(())
    }

    pub fn set_source_url(&mut self, source_url: String) -> Result<(), ConfigError> {
        Url::parse(&source_url).map_err(|_| ConfigError::InvalidUrl(source_url.clone()))?;
        self.source_url = source_url;
        Ok(())
    }
}

impl OllamaConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol != "http" && self.protocol != "https" {
            return Err(ConfigError::InvalidProtocol(self.protocol.clone()));
        }

        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))?;

        if self.port == 0 {
            return Err(ConfigError::InvalidPort(self.port));
        }

        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.model.clone()));
        }

        if self.completion_model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(self.completion_model.clone()));
        }

        if !(64..=4096).contains(&self.embedding_dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(
                self.embedding_dimension,
            ));
        }

        Ok(())
    }

    pub fn ollama_url(&self) -> Result<Url, ConfigError> {
        let url_str = format!("{}://{}:{}", self.protocol, self.host, self.port);
        Url::parse(&url_str).map_err(|_| ConfigError::InvalidUrl(url_str))
    }

    pub fn set_protocol(&mut self, protocol: String) -> Result<(), ConfigError> {
        if protocol != "http" && protocol != "https" {
            return Err(ConfigError::InvalidProtocol(protocol));
        }
        self.protocol = protocol;
        Ok(())
    }

    pub fn set_host(&mut self, host: String) -> Result<(), ConfigError> {
        let temp_config = OllamaConfig {
            host: host.clone(),
            ..self.clone()
        };
        temp_config.validate()?;
        self.host = host;
        Ok(())
    }

    pub fn set_port(&mut self, port: u16) -> Result<(), ConfigError> {
        if port == 0 {
            return Err(ConfigError::InvalidPort(port));
        }
        self.port = port;
        Ok(())
    }

    pub fn set_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.model = model;
        Ok(())
    }

    pub fn set_completion_model(&mut self, model: String) -> Result<(), ConfigError> {
        if model.trim().is_empty() {
            return Err(ConfigError::InvalidModel(model));
        }
        self.completion_model = model;
        Ok(())
    }

    pub fn set_embedding_dimension(&mut self, dimension: u32) -> Result<(), ConfigError> {
        if !(64..=4096).contains(&dimension) {
            return Err(ConfigError::InvalidEmbeddingDimension(dimension));
        }
        self.embedding_dimension = dimension;
        Ok(())
    }
}

impl RetrievalConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.match_threshold > 0.0 && self.match_threshold <= 1.0) {
            return Err(ConfigError::InvalidThreshold(self.match_threshold));
        }

        if !(1..=100).contains(&self.match_count) {
            return Err(ConfigError::InvalidMatchCount(self.match_count));
        }

        if self.char_budget < 100 {
            return Err(ConfigError::InvalidCharBudget(self.char_budget));
        }

        Ok(())
    }
}
