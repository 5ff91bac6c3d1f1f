//! Word embedding space used to find substitution candidates.

use crate::error::{AttackError, Result};
use crate::utils::math::{dot, normalize_in_place};
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::{debug, info};

/// Capability: vocabulary membership and cosine nearest neighbours.
pub trait WordEmbeddings: Send + Sync {
    fn contains(&self, word: &str) -> bool;

    /// Up to `topn` neighbours of `word` (excluding itself) with their
    /// cosine similarity, highest first. Errors with `VocabularyMiss` when
    /// `word` is unknown.
    fn most_similar(&self, word: &str, topn: usize) -> Result<Vec<(String, f32)>>;
}

/// In-memory GloVe / word2vec text-format vectors, L2-normalised.
pub struct GloveEmbeddings {
    vocab: Vec<String>,
    index: HashMap<String, usize>,
    dims: usize,
    matrix: Vec<f32>,
}

impl GloveEmbeddings {
    pub fn load(path: impl AsRef<Path>, limit: Option<usize>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| AttackError::Embedding {
            message: format!("cannot open word vectors {}: {}", path.display(), e),
        })?;
        let vectors = Self::from_reader(file, limit)?;
        info!(
            "Word vectors loaded from {} ({} words, {} dims)",
            path.display(),
            vectors.len(),
            vectors.dims
        );
        Ok(vectors)
    }

    /// Reads `word v1 v2 ...` lines. A leading word2vec `count dims` header
    /// is skipped.
    pub fn from_reader(reader: impl Read, limit: Option<usize>) -> Result<Self> {
        let mut entries = Vec::new();
        for (n, line) in BufReader::new(reader).lines().enumerate() {
            let line = line?;
            let mut parts = line.split_whitespace();
            let Some(word) = parts.next() else { continue };
            let values: Vec<f32> = parts
                .map(|p| p.parse::<f32>())
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| AttackError::Embedding {
                    message: format!("line {}: invalid vector component: {}", n + 1, e),
                })?;
            if n == 0 && values.len() == 1 && word.parse::<usize>().is_ok() {
                debug!("Skipping word2vec header line");
                continue;
            }
            entries.push((word.to_string(), values));
            if limit.is_some_and(|l| entries.len() >= l) {
                break;
            }
        }
        Self::from_vectors(entries)
    }

    pub fn from_vectors(entries: Vec<(String, Vec<f32>)>) -> Result<Self> {
        let dims = entries.first().map(|(_, v)| v.len()).unwrap_or(0);
        let mut vocab = Vec::with_capacity(entries.len());
        let mut index = HashMap::with_capacity(entries.len());
        let mut matrix = Vec::with_capacity(entries.len() * dims);
        for (word, mut vector) in entries {
            if vector.len() != dims {
                return Err(AttackError::Embedding {
                    message: format!(
                        "dimension mismatch for '{}': expected {}, got {}",
                        word,
                        dims,
                        vector.len()
                    ),
                });
            }
            if index.contains_key(&word) {
                continue;
            }
            normalize_in_place(&mut vector);
            index.insert(word.clone(), vocab.len());
            vocab.push(word);
            matrix.extend_from_slice(&vector);
        }
        Ok(Self {
            vocab,
            index,
            dims,
            matrix,
        })
    }

    pub fn len(&self) -> usize {
        self.vocab.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vocab.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.dims
    }

    fn row(&self, i: usize) -> &[f32] {
        &self.matrix[i * self.dims..(i + 1) * self.dims]
    }
}

impl WordEmbeddings for GloveEmbeddings {
    fn contains(&self, word: &str) -> bool {
        self.index.contains_key(word)
    }

    fn most_similar(&self, word: &str, topn: usize) -> Result<Vec<(String, f32)>> {
        let &query = self.index.get(word).ok_or_else(|| AttackError::VocabularyMiss {
            word: word.to_string(),
        })?;
        let q = self.row(query);
        let mut scored: Vec<(usize, f32)> = (0..self.vocab.len())
            .filter(|&i| i != query)
            .map(|i| (i, dot(q, self.row(i))))
            .collect();
        // stable: equal scores stay in vocabulary order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(topn);
        Ok(scored
            .into_iter()
            .map(|(i, s)| (self.vocab[i].clone(), s))
            .collect())
    }
}
