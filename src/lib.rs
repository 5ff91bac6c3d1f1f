pub mod analysis;
pub mod attack;
pub mod batch;
pub mod bert_encoder;
pub mod candidates;
pub mod config;
pub mod dataset;
pub mod embeddings;
pub mod emotion;
pub mod error;
pub mod gate;
pub mod grammar;
pub mod lexicon;
pub mod profiler;
pub mod similarity;
pub mod text;
pub mod utils;
pub mod word_vectors;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::attack::AttackServices;
use crate::config::Config;
use crate::grammar::LanguageToolClient;
use crate::lexicon::{AffectTable, Lexicon};
use crate::profiler::{EmotionProfiler, NrcAffectSource};
use crate::similarity::EncoderSimilarity;
use crate::word_vectors::GloveEmbeddings;

pub use crate::attack::{AttackParams, AttackRecord, NO_ATTACK_FOUND, attack_sentence};
pub use crate::error::{AttackError, Result as AttackResult};

/// Initialise logging for the binaries. `RUST_LOG` wins over `default_level`.
pub fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
}

/// Load the lexicon and word vectors and connect the grammar and
/// similarity backends. Everything returned is read-only and shared by
/// every attack of the run.
pub async fn build_services(config: &Config) -> Result<AttackServices> {
    let table = AffectTable::load(&config.resources.lexicon_path)
        .with_context(|| format!("loading lexicon {}", config.resources.lexicon_path.display()))?;
    let table = Arc::new(table);
    let lexicon = Arc::new(Lexicon::from_table(&table));
    info!(
        "lexicon ready: {} emotional words (fingerprint {})",
        lexicon.len(),
        &lexicon.fingerprint()[..12]
    );
    let profiler = EmotionProfiler::new(Arc::new(NrcAffectSource::new(table)));

    let vectors_path = config.resources.word_vectors_path.clone();
    let limit = config.resources.vocabulary_limit;
    let embeddings = tokio::task::spawn_blocking(move || GloveEmbeddings::load(&vectors_path, limit))
        .await
        .context("word vector loader panicked")??;

    let grammar = LanguageToolClient::new(
        config.grammar.url.clone(),
        config.grammar.language.clone(),
        config.grammar.requests_per_second,
        config.grammar.timeout_ms,
        config.grammar.retries,
    )?;

    let embedder = crate::embeddings::create_embedder(
        &config.similarity,
        config.runtime.openai_api_key.as_deref(),
    )
    .await?;
    info!(
        "sentence encoder ready: provider={}, dims={}",
        config.similarity.provider,
        embedder.dimensions()
    );
    let similarity = EncoderSimilarity::new(embedder, config.similarity.cache_size);

    Ok(AttackServices {
        lexicon,
        profiler,
        embeddings: Arc::new(embeddings),
        grammar: Arc::new(grammar),
        similarity: Arc::new(similarity),
    })
}
