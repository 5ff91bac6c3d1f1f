use crate::error::{AttackError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration structure loaded from affect_attack.toml and environment variables
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub attack: AttackConfig,
    pub resources: ResourceConfig,
    pub grammar: GrammarConfig,
    pub similarity: SimilarityConfig,
    pub batch: BatchConfig,
    /// Runtime configuration loaded from environment variables
    #[serde(skip)]
    pub runtime: RuntimeConfig,
}

/// How the grammar step decides which candidate issues the substitution introduced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RepairStrategy {
    /// Match issues by rule and message regardless of position
    #[default]
    Multiset,
    /// Compare messages at parallel list positions
    Positional,
}

/// Thresholds and search parameters of the word-substitution attack
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AttackConfig {
    pub word_similarity: f32,
    pub sentence_similarity: f32,
    pub neighbor_count: usize,
    pub repair_strategy: RepairStrategy,
    /// Master seed for the emotionless-text search order; unseeded when absent
    pub seed: Option<u64>,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            word_similarity: 0.70,
            sentence_similarity: 0.80,
            neighbor_count: crate::candidates::DEFAULT_NEIGHBOR_COUNT,
            repair_strategy: RepairStrategy::default(),
            seed: None,
        }
    }
}

/// Locations of the lexicon and word vectors
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResourceConfig {
    pub lexicon_path: PathBuf,
    pub word_vectors_path: PathBuf,
    pub vocabulary_limit: Option<usize>,
}

impl Default for ResourceConfig {
    fn default() -> Self {
        Self {
            lexicon_path: PathBuf::from("./lexicon/wordlex.txt"),
            word_vectors_path: PathBuf::from("./word_embeddings/glove.6B.100d.txt"),
            vocabulary_limit: None,
        }
    }
}

/// LanguageTool connection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GrammarConfig {
    pub url: String,
    pub language: String,
    pub requests_per_second: u32,
    pub timeout_ms: u64,
    pub retries: u32,
}

impl Default for GrammarConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8081/v2".to_string(),
            language: "en-US".to_string(),
            requests_per_second: 20,
            timeout_ms: 10_000,
            retries: 3,
        }
    }
}

/// Sentence encoder used for the semantic similarity check
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SimilarityConfig {
    /// "local" (candle BERT), "openai" or "hashing"
    pub provider: String,
    pub model: String,
    /// Base URL of an OpenAI-compatible embeddings API
    pub url: Option<String>,
    /// Local directory holding config.json, tokenizer.json and model.safetensors
    pub model_dir: Option<PathBuf>,
    pub dimensions: Option<usize>,
    pub cache_size: usize,
    pub retries: u32,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            provider: "local".to_string(),
            model: "sentence-transformers/all-MiniLM-L6-v2".to_string(),
            url: None,
            model_dir: None,
            dimensions: None,
            cache_size: 1024,
            retries: 3,
        }
    }
}

/// Dataset-level run settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BatchConfig {
    pub concurrency: usize,
    pub sentence_timeout_ms: u64,
    pub max_retries: u32,
    pub data_dir: PathBuf,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            sentence_timeout_ms: 300_000,
            max_retries: 2,
            data_dir: PathBuf::from("./data"),
        }
    }
}

/// Runtime configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub log_level: String,
    pub openai_api_key: Option<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            log_level: "affect_attack=info".to_string(),
            openai_api_key: None,
        }
    }
}

impl RuntimeConfig {
    /// Load runtime configuration from environment variables
    pub fn load_from_env() -> Self {
        Self {
            log_level: std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "affect_attack=info".to_string()),
            openai_api_key: std::env::var("OPENAI_API_KEY")
                .ok()
                .filter(|k| !k.trim().is_empty()),
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

impl Config {
    /// Load configuration from TOML file and environment variables
    /// Uses AFFECT_ATTACK_CONFIG environment variable or defaults to "affect_attack.toml"
    pub fn load() -> Result<Self> {
        // 1) AFFECT_ENV_FILE if set, 2) ./.env, 3) ../.env
        if let Ok(env_path) = std::env::var("AFFECT_ENV_FILE") {
            let _ = dotenvy::from_path(env_path);
        } else if dotenvy::from_path(".env").is_err() {
            let _ = dotenvy::from_path("../.env");
        }

        let config_path = std::env::var("AFFECT_ATTACK_CONFIG")
            .unwrap_or_else(|_| "affect_attack.toml".to_string());

        let mut config: Config = if let Ok(content) = std::fs::read_to_string(&config_path) {
            Self::from_toml_str(&content)?
        } else {
            tracing::warn!("Config file {} not found, using defaults", config_path);
            Self::default()
        };

        config.apply_env_overrides();
        config.runtime = RuntimeConfig::load_from_env();
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    fn apply_env_overrides(&mut self) {
        if let Some(v) = env_parse("AFFECT_WORD_SIMILARITY") {
            self.attack.word_similarity = v;
        }
        if let Some(v) = env_parse("AFFECT_SENTENCE_SIMILARITY") {
            self.attack.sentence_similarity = v;
        }
        if let Some(v) = env_parse("AFFECT_SEED") {
            self.attack.seed = Some(v);
        }
        if let Ok(v) = std::env::var("AFFECT_LEXICON_PATH") {
            self.resources.lexicon_path = v.into();
        }
        if let Ok(v) = std::env::var("AFFECT_WORD_VECTORS_PATH") {
            self.resources.word_vectors_path = v.into();
        }
        if let Ok(v) = std::env::var("AFFECT_LANGUAGETOOL_URL") {
            self.grammar.url = v;
        }
        if let Ok(v) = std::env::var("AFFECT_SIMILARITY_PROVIDER") {
            self.similarity.provider = v;
        }
        if let Some(v) = env_parse("AFFECT_CONCURRENCY") {
            self.batch.concurrency = v;
        }
        if let Some(v) = env_parse("AFFECT_SENTENCE_TIMEOUT_MS") {
            self.batch.sentence_timeout_ms = v;
        }
    }

    /// Reject out-of-range thresholds; clamp retry counts.
    pub fn validate(&mut self) -> Result<()> {
        for (name, value) in [
            ("attack.word_similarity", self.attack.word_similarity),
            ("attack.sentence_similarity", self.attack.sentence_similarity),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(AttackError::Config {
                    message: format!("{} must be between 0.0 and 1.0, got {}", name, value),
                });
            }
        }
        if self.attack.neighbor_count == 0 {
            return Err(AttackError::Config {
                message: "attack.neighbor_count must be at least 1".to_string(),
            });
        }
        if self.batch.concurrency == 0 {
            return Err(AttackError::Config {
                message: "batch.concurrency must be at least 1".to_string(),
            });
        }
        for (name, retries) in [
            ("grammar.retries", &mut self.grammar.retries),
            ("similarity.retries", &mut self.similarity.retries),
        ] {
            if *retries == 0 {
                *retries = 1;
            } else if *retries > 10 {
                tracing::warn!("{} {} exceeds max 10, clamping to 10", name, retries);
                *retries = 10;
            }
        }
        Ok(())
    }
}
