//! Local sentence-transformer encoder (BERT family) run with candle.

use anyhow::{Context, Result};
use async_trait::async_trait;
use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config};
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;
use tracing::info;

use crate::embeddings::Embedder;

pub struct BertSentenceEncoder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    dims: usize,
}

impl BertSentenceEncoder {
    /// Load from a directory holding config.json, tokenizer.json and model.safetensors.
    pub fn from_dir(model_path: &Path) -> Result<Self> {
        Self::from_files(
            &model_path.join("config.json"),
            &model_path.join("tokenizer.json"),
            &model_path.join("model.safetensors"),
        )
    }

    /// Download (or reuse the cached copy of) a model from the Hugging Face hub.
    pub async fn from_hub(model_id: &str) -> Result<Self> {
        let api = hf_hub::api::tokio::ApiBuilder::new()
            .with_cache_dir(cache_dir())
            .build()
            .context("Failed to initialise Hugging Face hub client")?;
        let repo = api.model(model_id.to_string());
        info!("Resolving sentence encoder {} from the hub", model_id);
        let config = repo.get("config.json").await.context("config.json")?;
        let tokenizer = repo.get("tokenizer.json").await.context("tokenizer.json")?;
        let weights = repo
            .get("model.safetensors")
            .await
            .context("model.safetensors")?;
        Self::from_files(&config, &tokenizer, &weights)
    }

    fn from_files(config_path: &Path, tokenizer_path: &Path, weights_path: &Path) -> Result<Self> {
        let device = Device::Cpu;

        let tokenizer = Tokenizer::from_file(tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load tokenizer: {}", e))?;

        let config_str =
            std::fs::read_to_string(config_path).context("Failed to read config.json")?;
        let config: Config =
            serde_json::from_str(&config_str).context("Failed to parse config.json")?;
        let dims = serde_json::from_str::<serde_json::Value>(&config_str)?
            .get("hidden_size")
            .and_then(|v| v.as_u64())
            .unwrap_or(384) as usize;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(
                &[weights_path.to_path_buf()],
                candle_core::DType::F32,
                &device,
            )?
        };
        let model = BertModel::load(vb, &config)?;

        Ok(Self {
            model,
            tokenizer,
            device,
            dims,
        })
    }

    fn mean_pooling(&self, embeddings: &Tensor, attention_mask: &Tensor) -> Result<Vec<f32>> {
        // [batch, seq] -> [batch, seq, hidden]
        let mask_expanded = attention_mask.unsqueeze(2)?;
        let masked = embeddings.broadcast_mul(&mask_expanded)?;
        let summed = masked.sum(1)?;
        let mask_sum = mask_expanded.sum(1)?;
        let mean = summed.broadcast_div(&mask_sum)?;

        let norm = mean.sqr()?.sum_keepdim(1)?.sqrt()?;
        let normalized = mean.broadcast_div(&norm)?;

        Ok(normalized.squeeze(0)?.to_vec1::<f32>()?)
    }
}

fn cache_dir() -> PathBuf {
    std::env::var("AFFECT_MODEL_CACHE")
        .map(PathBuf::from)
        .ok()
        .or_else(|| dirs::cache_dir().map(|d| d.join("affect-attack").join("models")))
        .unwrap_or_else(|| PathBuf::from("./models"))
}

#[async_trait]
impl Embedder for BertSentenceEncoder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow::anyhow!("Tokenization failed: {}", e))?;

        let token_ids = encoding.get_ids();
        let attention_mask = encoding.get_attention_mask();
        let type_ids = vec![0u32; token_ids.len()];

        let input_ids = Tensor::new(token_ids, &self.device)?.unsqueeze(0)?;
        let token_type_ids = Tensor::new(type_ids.as_slice(), &self.device)?.unsqueeze(0)?;
        let attention_tensor = Tensor::new(
            attention_mask
                .iter()
                .map(|&x| x as f32)
                .collect::<Vec<_>>()
                .as_slice(),
            &self.device,
        )?
        .unsqueeze(0)?;

        let embeddings =
            self.model
                .forward(&input_ids, &token_type_ids, Some(&attention_tensor))?;

        self.mean_pooling(&embeddings, &attention_tensor)
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}
