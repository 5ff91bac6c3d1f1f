//! Per-sentence attack search.
//!
//! Text that carries emotion tags is attacked word by word in order of
//! emotional weight. Emotionless text falls back to a shuffled walk over its
//! content words, swapping each for an emotion-bearing neighbour. The search
//! stops at the first substitution the acceptance gate admits.

use crate::candidates::CandidateGenerator;
use crate::config::{AttackConfig, RepairStrategy};
use crate::emotion::{DominantEmotions, EmotionFrequencies};
use crate::error::{AttackError, Result};
use crate::gate::AcceptanceGate;
use crate::grammar::GrammarChecker;
use crate::lexicon::Lexicon;
use crate::profiler::EmotionProfiler;
use crate::similarity::SentenceSimilarity;
use crate::text::{content_tokens, normalize, replace_word};
use crate::word_vectors::WordEmbeddings;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Output text recorded when the search space is exhausted.
pub const NO_ATTACK_FOUND: &str = "No adversarial attack found.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttackStrategy {
    Emotional,
    NonEmotional,
}

impl fmt::Display for AttackStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AttackStrategy::Emotional => "emotional",
            AttackStrategy::NonEmotional => "non_emotional",
        })
    }
}

/// Read-only resources shared by every attack in a run.
#[derive(Clone)]
pub struct AttackServices {
    pub lexicon: Arc<Lexicon>,
    pub profiler: EmotionProfiler,
    pub embeddings: Arc<dyn WordEmbeddings>,
    pub grammar: Arc<dyn GrammarChecker>,
    pub similarity: Arc<dyn SentenceSimilarity>,
}

#[derive(Debug, Clone, Copy)]
pub struct AttackParams {
    pub word_similarity: f32,
    pub sentence_similarity: f32,
    pub neighbor_count: usize,
    pub repair_strategy: RepairStrategy,
}

impl Default for AttackParams {
    fn default() -> Self {
        Self::from(&AttackConfig::default())
    }
}

impl From<&AttackConfig> for AttackParams {
    fn from(config: &AttackConfig) -> Self {
        Self {
            word_similarity: config.word_similarity,
            sentence_similarity: config.sentence_similarity,
            neighbor_count: config.neighbor_count,
            repair_strategy: config.repair_strategy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Substitution {
    pub target: String,
    pub replacement: String,
}

/// Outcome of one sentence's search. `new_*` fields are empty when no
/// attack was found; frequency fields are empty for emotionless text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttackRecord {
    pub original_text: String,
    pub new_text: Option<String>,
    pub strategy: AttackStrategy,
    pub substitution: Option<Substitution>,
    pub original_frequencies: Option<EmotionFrequencies>,
    pub new_frequencies: Option<EmotionFrequencies>,
    pub original_dominant: DominantEmotions,
    pub new_dominant: Option<DominantEmotions>,
    pub candidates_tried: usize,
}

impl AttackRecord {
    pub fn attack_found(&self) -> bool {
        self.new_text.is_some()
    }

    /// The attacked text, or the sentinel when the search came up empty.
    pub fn text_new(&self) -> &str {
        self.new_text.as_deref().unwrap_or(NO_ATTACK_FOUND)
    }
}

struct Search<'a> {
    text: &'a str,
    gate: AcceptanceGate<'a>,
    tried: usize,
}

impl Search<'_> {
    async fn try_replacement(&mut self, target: &str, replacement: &str) -> Result<Option<String>> {
        let Some(candidate) = replace_word(self.text, target, replacement) else {
            return Ok(None);
        };
        self.tried += 1;
        let decision = self.gate.evaluate(self.text, &candidate).await?;
        if decision.accepted {
            return Ok(Some(decision.repaired_text));
        }
        debug!(
            "rejected '{}' -> '{}': {:?}",
            target, replacement, decision.rejection
        );
        Ok(None)
    }
}

/// Search for a single-word substitution that shifts the emotion profile
/// of `text`. `rng` orders the walk over emotionless text.
///
/// The text is brought to NFC first; the record carries the normalised
/// form. Unknown vocabulary is skipped. Service failures abort the search
/// and are returned as errors, never as a missing attack.
pub async fn attack_sentence<R: Rng + ?Sized>(
    text: &str,
    services: &AttackServices,
    params: &AttackParams,
    rng: &mut R,
) -> Result<AttackRecord> {
    let normalized = normalize(text);
    let text = normalized.as_str();
    let profiler = &services.profiler;
    let generator = CandidateGenerator::new(
        services.embeddings.as_ref(),
        &services.lexicon,
        params.neighbor_count,
        params.word_similarity,
    );
    let mut search = Search {
        text,
        gate: AcceptanceGate::new(
            services.grammar.as_ref(),
            services.similarity.as_ref(),
            profiler,
            params.sentence_similarity,
            params.repair_strategy,
        ),
        tried: 0,
    };

    let targets: Vec<String> = profiler
        .prioritized_affect_words(text)
        .into_iter()
        .filter(|w| services.lexicon.contains(w))
        .collect();
    let strategy = if targets.is_empty() {
        AttackStrategy::NonEmotional
    } else {
        AttackStrategy::Emotional
    };

    let mut found: Option<(Substitution, String)> = None;
    match strategy {
        AttackStrategy::Emotional => {
            'words: for word in &targets {
                let candidates = match generator.candidates_for_emotional_word(word) {
                    Ok(c) => c,
                    Err(AttackError::VocabularyMiss { word }) => {
                        debug!("skipping '{}': not in embedding vocabulary", word);
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                for candidate in candidates {
                    if let Some(new_text) = search.try_replacement(word, &candidate.word).await? {
                        found = Some((substitution(word, &candidate.word), new_text));
                        break 'words;
                    }
                }
            }
        }
        AttackStrategy::NonEmotional => {
            let mut tokens = content_tokens(text);
            tokens.shuffle(rng);
            'tokens: for token in &tokens {
                let candidates = match generator.candidates_for_neutral_word(token) {
                    Ok(c) => c,
                    Err(AttackError::VocabularyMiss { word }) => {
                        debug!("skipping '{}': not in embedding vocabulary", word);
                        continue;
                    }
                    Err(e) => return Err(e),
                };
                for candidate in candidates {
                    if let Some(new_text) = search.try_replacement(token, &candidate).await? {
                        found = Some((substitution(token, &candidate), new_text));
                        break 'tokens;
                    }
                }
            }
        }
    }

    let original_frequencies = profiler.try_affect_frequencies(text);
    let original_dominant = original_frequencies
        .map(|f| f.dominant())
        .unwrap_or_default();
    let candidates_tried = search.tried;

    let record = match found {
        Some((sub, new_text)) => {
            let new_frequencies = profiler.try_affect_frequencies(&new_text);
            info!(
                "attack found ({}): '{}' -> '{}' after {} candidate(s)",
                strategy, sub.target, sub.replacement, candidates_tried
            );
            AttackRecord {
                original_text: text.to_string(),
                new_dominant: Some(new_frequencies.map(|f| f.dominant()).unwrap_or_default()),
                new_frequencies,
                new_text: Some(new_text),
                strategy,
                substitution: Some(sub),
                original_frequencies,
                original_dominant,
                candidates_tried,
            }
        }
        None => {
            debug!(
                "no attack found ({}) after {} candidate(s)",
                strategy, candidates_tried
            );
            AttackRecord {
                original_text: text.to_string(),
                new_text: None,
                strategy,
                substitution: None,
                original_frequencies,
                new_frequencies: None,
                original_dominant,
                new_dominant: None,
                candidates_tried,
            }
        }
    };
    Ok(record)
}

fn substitution(target: &str, replacement: &str) -> Substitution {
    Substitution {
        target: target.to_string(),
        replacement: replacement.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_is_reported_without_attack() {
        let record = AttackRecord {
            original_text: "plain".into(),
            new_text: None,
            strategy: AttackStrategy::NonEmotional,
            substitution: None,
            original_frequencies: None,
            new_frequencies: None,
            original_dominant: DominantEmotions::default(),
            new_dominant: None,
            candidates_tried: 0,
        };
        assert!(!record.attack_found());
        assert_eq!(record.text_new(), "No adversarial attack found.");
    }

    #[test]
    fn params_follow_attack_config() {
        let config = AttackConfig {
            word_similarity: 0.75,
            ..AttackConfig::default()
        };
        let params = AttackParams::from(&config);
        assert_eq!(params.word_similarity, 0.75);
        assert_eq!(params.sentence_similarity, 0.80);
        assert_eq!(params.neighbor_count, 50);
    }

    #[test]
    fn strategy_names_are_snake_case() {
        assert_eq!(AttackStrategy::NonEmotional.to_string(), "non_emotional");
        assert_eq!(
            serde_json::to_string(&AttackStrategy::Emotional).unwrap(),
            "\"emotional\""
        );
    }
}
