use crate::config::SimilarityConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Sentence encoder: text in, fixed-size vector out.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
    fn dimensions(&self) -> usize;
}

pub const OPENAI_URL: &str = "https://api.openai.com/v1";

/// Client for an OpenAI-compatible `/embeddings` endpoint.
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    dims: usize,
    retries: u32,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

impl OpenAIEmbedder {
    pub fn new(
        base_url: impl Into<String>,
        api_key: String,
        model: String,
        dims: Option<usize>,
        retries: u32,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(20))
            .build()
            .context("Failed to build reqwest client with timeout")?;
        let dims = dims.unwrap_or(match model.as_str() {
            "text-embedding-3-large" => 3072,
            _ => 1536,
        });
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            model,
            dims,
            retries: retries.max(1),
        })
    }

    async fn embed_once(&self, text: &str) -> Result<Vec<f32>> {
        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: text,
            })
            .send()
            .await
            .context("embedding request failed")?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("embedding API error {}: {}", status, body);
        }
        let parsed: EmbeddingResponse = response
            .json()
            .await
            .context("invalid embedding response")?;
        let embedding = parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .context("no embedding returned")?;
        anyhow::ensure!(
            embedding.len() == self.dims,
            "expected {} dimensions from {}, got {}",
            self.dims,
            self.model,
            embedding.len()
        );
        Ok(embedding)
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!("embedding {} chars with {}", text.len(), self.model);
        let mut last_err = None;
        for i in 0..self.retries {
            match self.embed_once(text).await {
                Ok(embedding) => return Ok(embedding),
                Err(e) => {
                    debug!("embedding attempt {} failed: {:#}", i + 1, e);
                    last_err = Some(e);
                    tokio::time::sleep(std::time::Duration::from_millis(200u64 << i)).await;
                }
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("embedding failed")))
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

/// Deterministic bag-of-words encoder for offline runs and tests.
///
/// Each lowercased word is hashed into one of `dims` buckets with a signed
/// weight, so sentences sharing most words score a high cosine.
pub struct HashingEmbedder {
    dims: usize,
}

impl HashingEmbedder {
    pub fn new(dims: Option<usize>) -> Self {
        Self {
            dims: dims.unwrap_or(512).max(1),
        }
    }

    fn generate(&self, text: &str) -> Vec<f32> {
        let mut out = vec![0.0f32; self.dims];
        for word in crate::text::lowercase_words(text) {
            let digest = blake3::hash(word.as_bytes());
            let bytes = digest.as_bytes();
            let mut b8 = [0u8; 8];
            b8.copy_from_slice(&bytes[..8]);
            let bucket = (u64::from_le_bytes(b8) % self.dims as u64) as usize;
            let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
            out[bucket] += sign;
        }
        crate::utils::math::normalize_in_place(&mut out);
        out
    }
}

#[async_trait]
impl Embedder for HashingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.generate(text))
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

/// Factory function to create the sentence encoder named in the config
pub async fn create_embedder(
    config: &SimilarityConfig,
    openai_api_key: Option<&str>,
) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "openai" => {
            let key = openai_api_key
                .context("similarity.provider=openai but OPENAI_API_KEY is not set")?;
            let model = if config.model.starts_with("text-embedding") {
                config.model.clone()
            } else {
                "text-embedding-3-small".to_string()
            };
            info!("Using OpenAI embeddings (model={})", model);
            Ok(Arc::new(OpenAIEmbedder::new(
                config.url.as_deref().unwrap_or(OPENAI_URL),
                key.to_string(),
                model,
                config.dimensions,
                config.retries,
            )?))
        }
        "local" | "candle" => {
            let encoder = match &config.model_dir {
                Some(dir) => crate::bert_encoder::BertSentenceEncoder::from_dir(dir)?,
                None => crate::bert_encoder::BertSentenceEncoder::from_hub(&config.model).await?,
            };
            info!(
                "Using local sentence encoder (model={}, dims={})",
                config.model,
                encoder.dimensions()
            );
            Ok(Arc::new(encoder))
        }
        "hashing" => {
            let encoder = HashingEmbedder::new(config.dimensions);
            info!(
                "Using HashingEmbedder (deterministic) with {} dimensions",
                encoder.dimensions()
            );
            Ok(Arc::new(encoder))
        }
        other => anyhow::bail!("Unknown similarity provider '{}'", other),
    }
}
