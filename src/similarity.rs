//! Sentence similarity on top of a sentence encoder.

use crate::embeddings::Embedder;
use crate::error::{AttackError, Result};
use crate::utils::cosine_similarity;
use async_trait::async_trait;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

#[async_trait]
pub trait SentenceSimilarity: Send + Sync {
    /// Cosine similarity of the two sentences, in [-1, 1].
    async fn similarity(&self, a: &str, b: &str) -> Result<f32>;
}

/// Scores sentence pairs by the cosine of their encodings.
///
/// Encodings are cached because the gate scores the same original sentence
/// against every candidate substitution.
pub struct EncoderSimilarity {
    embedder: Arc<dyn Embedder>,
    cache: Mutex<LruCache<String, Arc<Vec<f32>>>>,
}

impl EncoderSimilarity {
    pub fn new(embedder: Arc<dyn Embedder>, cache_size: usize) -> Self {
        let cap = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            embedder,
            cache: Mutex::new(LruCache::new(cap)),
        }
    }

    async fn encode(&self, text: &str) -> Result<Arc<Vec<f32>>> {
        if let Some(hit) = self.cache.lock().await.get(text) {
            return Ok(hit.clone());
        }
        let vector = self
            .embedder
            .embed(text)
            .await
            .map_err(|e| AttackError::Similarity {
                message: format!("{:#}", e),
            })?;
        if vector.is_empty() {
            return Err(AttackError::Similarity {
                message: "encoder returned an empty vector".into(),
            });
        }
        let vector = Arc::new(vector);
        self.cache.lock().await.put(text.to_string(), vector.clone());
        Ok(vector)
    }
}

#[async_trait]
impl SentenceSimilarity for EncoderSimilarity {
    async fn similarity(&self, a: &str, b: &str) -> Result<f32> {
        let va = self.encode(a).await?;
        let vb = self.encode(b).await?;
        let score = cosine_similarity(&va, &vb);
        debug!("sentence similarity {:.4}", score);
        Ok(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::HashingEmbedder;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counting {
        inner: HashingEmbedder,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for Counting {
        async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed(text).await
        }
        fn dimensions(&self) -> usize {
            self.inner.dimensions()
        }
    }

    struct Broken;

    #[async_trait]
    impl Embedder for Broken {
        async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
            anyhow::bail!("connection refused")
        }
        fn dimensions(&self) -> usize {
            0
        }
    }

    #[tokio::test]
    async fn identical_sentences_score_one() {
        let sim = EncoderSimilarity::new(Arc::new(HashingEmbedder::new(None)), 8);
        let score = sim.similarity("great coffee", "great coffee").await.unwrap();
        assert!((score - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn repeated_sentences_hit_the_cache() {
        let counting = Arc::new(Counting {
            inner: HashingEmbedder::new(None),
            calls: AtomicUsize::new(0),
        });
        let sim = EncoderSimilarity::new(counting.clone(), 8);
        sim.similarity("the original", "candidate one").await.unwrap();
        sim.similarity("the original", "candidate two").await.unwrap();
        assert_eq!(counting.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn encoder_failure_is_a_service_failure() {
        let sim = EncoderSimilarity::new(Arc::new(Broken), 8);
        let err = sim.similarity("a", "b").await.unwrap_err();
        assert!(matches!(err, AttackError::Similarity { .. }));
        assert!(err.is_service_failure());
    }
}
