//! Substitution candidates drawn from the word embedding space.

use crate::emotion::EmotionSpectrum;
use crate::error::Result;
use crate::lexicon::Lexicon;
use crate::word_vectors::WordEmbeddings;

/// Neighbours requested from the embedding space per target word.
pub const DEFAULT_NEIGHBOR_COUNT: usize = 50;

/// A ranked replacement for an emotional target word.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub word: String,
    pub similarity: f32,
    /// Euclidean distance between the candidate's and the target's spectrum.
    pub distance: f32,
}

pub struct CandidateGenerator<'a> {
    embeddings: &'a dyn WordEmbeddings,
    lexicon: &'a Lexicon,
    neighbor_count: usize,
    word_similarity: f32,
}

impl<'a> CandidateGenerator<'a> {
    pub fn new(
        embeddings: &'a dyn WordEmbeddings,
        lexicon: &'a Lexicon,
        neighbor_count: usize,
        word_similarity: f32,
    ) -> Self {
        Self {
            embeddings,
            lexicon,
            neighbor_count,
            word_similarity,
        }
    }

    /// Neighbours of a word in emotionless text that carry some emotion,
    /// in the embedding space's similarity order.
    pub fn candidates_for_neutral_word(&self, word: &str) -> Result<Vec<String>> {
        Ok(self
            .embeddings
            .most_similar(word, self.neighbor_count)?
            .into_iter()
            .filter(|(w, _)| self.lexicon.contains(w))
            .map(|(w, _)| w)
            .collect())
    }

    /// Neighbours above the word-similarity threshold, ranked by similarity
    /// then by spectrum distance from `word`, both descending. Equal keys
    /// keep the embedding query order.
    pub fn candidates_for_emotional_word(&self, word: &str) -> Result<Vec<Candidate>> {
        let target = self
            .lexicon
            .spectrum(word)
            .copied()
            .unwrap_or_else(EmotionSpectrum::zero);

        let mut candidates: Vec<Candidate> = self
            .embeddings
            .most_similar(word, self.neighbor_count)?
            .into_iter()
            .filter(|(_, sim)| *sim >= self.word_similarity)
            .map(|(w, similarity)| {
                let spectrum = self
                    .lexicon
                    .spectrum(&w)
                    .copied()
                    .unwrap_or_else(EmotionSpectrum::zero);
                Candidate {
                    distance: spectrum.distance(&target),
                    word: w,
                    similarity,
                }
            })
            .collect();

        candidates.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then(b.distance.total_cmp(&a.distance))
        });
        Ok(candidates)
    }
}
