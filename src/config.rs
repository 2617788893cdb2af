/// Configuration module for servicegraph.
///
/// Handles loading, validating, and providing default configuration values
/// for the indexing pass, the vector store, the Gemini backends and retrieval.
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub const DEFAULT_CONFIG_PATH: &str = "servicegraph.json";

/// Environment variables checked (in order) for the Gemini API key.
const API_KEY_VARS: [&str; 2] = ["GOOGLE_API_KEY", "GEMINI_API_KEY"];

// ── Default value functions ──────────────────────────────────────────

fn default_qdrant_url() -> String {
    "http://localhost:6333".to_string()
}

fn default_collection_name() -> String {
    "project_chunks".to_string()
}

fn default_db_path() -> String {
    "./servicegraph.db".to_string()
}

fn default_vector_size() -> usize {
    768
}

fn default_api_base() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-004".to_string()
}

fn default_generation_model() -> String {
    "gemini-2.0-flash".to_string()
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_search_top_k() -> usize {
    5
}

fn default_max_depth() -> usize {
    2
}

fn default_related_limit() -> usize {
    3
}

fn default_score_decay() -> f64 {
    0.75
}

fn default_max_prompt_chars() -> usize {
    12_000
}

fn default_history_turns() -> usize {
    3
}

fn default_exclude_dirs() -> Vec<String> {
    [
        "node_modules",
        ".git",
        "dist",
        "build",
        "__pycache__",
        "venv",
        ".venv",
        ".cache",
        "coverage",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_source_extensions() -> Vec<String> {
    ["js", "ts", "jsx", "tsx"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_service_suffixes() -> Vec<String> {
    vec!["-service".to_string(), "-panel".to_string()]
}

// ── Config structs ───────────────────────────────────────────────────

/// Which vector store backend to talk to.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Qdrant,
    Sqlite,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub store: StoreKind,

    #[serde(default = "default_qdrant_url")]
    pub qdrant_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qdrant_api_key: Option<String>,

    #[serde(default = "default_collection_name")]
    pub collection_name: String,

    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_vector_size")]
    pub vector_size: usize,

    #[serde(default = "default_api_base")]
    pub api_base: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub generation: GenerationConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub layout: LayoutConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_model")]
    pub model: String,

    #[serde(default = "default_max_prompt_chars")]
    pub max_prompt_chars: usize,

    #[serde(default = "default_history_turns")]
    pub history_turns: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_search_top_k")]
    pub search_top_k: usize,

    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Matches fetched per relation link during graph expansion.
    #[serde(default = "default_related_limit")]
    pub related_limit: usize,

    #[serde(default = "default_score_decay")]
    pub score_decay: f64,
}

/// Directory conventions of the indexed tree.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LayoutConfig {
    #[serde(default = "default_exclude_dirs")]
    pub exclude_dirs: Vec<String>,

    #[serde(default = "default_source_extensions")]
    pub source_extensions: Vec<String>,

    #[serde(default = "default_service_suffixes")]
    pub service_suffixes: Vec<String>,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreKind::default(),
            qdrant_url: default_qdrant_url(),
            qdrant_api_key: None,
            collection_name: default_collection_name(),
            db_path: default_db_path(),
            vector_size: default_vector_size(),
            api_base: default_api_base(),
            request_timeout_secs: default_request_timeout_secs(),
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
            retrieval: RetrievalConfig::default(),
            layout: LayoutConfig::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: default_generation_model(),
            max_prompt_chars: default_max_prompt_chars(),
            history_turns: default_history_turns(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            search_top_k: default_search_top_k(),
            max_depth: default_max_depth(),
            related_limit: default_related_limit(),
            score_decay: default_score_decay(),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            exclude_dirs: default_exclude_dirs(),
            source_extensions: default_source_extensions(),
            service_suffixes: default_service_suffixes(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If `config_path` is empty, defaults to [`DEFAULT_CONFIG_PATH`].
    /// If the file does not exist, returns a default config and, for the
    /// default path only, writes a template next to the working directory.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            DEFAULT_CONFIG_PATH
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            let cfg = Self::default();

            if path == DEFAULT_CONFIG_PATH {
                match cfg.save(path) {
                    Ok(()) => info!("Generated config template: {path}"),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }

            return Ok(cfg);
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        let cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {path}: {e}");
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {path}");
        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.vector_size > 0, "vector_size must be positive");
        anyhow::ensure!(
            self.retrieval.search_top_k > 0,
            "retrieval.search_top_k must be positive"
        );
        anyhow::ensure!(
            self.retrieval.related_limit > 0,
            "retrieval.related_limit must be positive"
        );
        anyhow::ensure!(
            self.retrieval.score_decay > 0.0 && self.retrieval.score_decay <= 1.0,
            "retrieval.score_decay must be in (0, 1]"
        );
        anyhow::ensure!(
            self.generation.max_prompt_chars > 0,
            "generation.max_prompt_chars must be positive"
        );
        anyhow::ensure!(
            !self.layout.service_suffixes.is_empty(),
            "at least one service suffix must be specified"
        );
        anyhow::ensure!(
            !self.collection_name.is_empty(),
            "collection_name must not be empty"
        );
        anyhow::ensure!(
            self.request_timeout_secs > 0,
            "request_timeout_secs must be positive"
        );
        Ok(())
    }

    /// Timeout applied to every outbound HTTP request.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Resolve the Gemini API key from the environment.
    pub fn api_key(&self) -> Result<String> {
        API_KEY_VARS
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|v| !v.is_empty()))
            .with_context(|| format!("no API key set (expected one of {API_KEY_VARS:?})"))
    }
}

// ── Tests ────────────────────────────────────────────────────────────
