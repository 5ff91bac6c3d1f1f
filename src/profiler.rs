//! Emotion profiling of raw text over a lexical affect source.

use crate::emotion::{AffectTag, DominantEmotions, Emotion, EmotionFrequencies};
use crate::error::Result;
use crate::lexicon::AffectTable;
use crate::text;
use std::collections::HashSet;
use std::sync::Arc;

/// Lexical affect capability: for each distinct word of `text` that the
/// source knows, the tags it carries (polarity included), in order of
/// first occurrence.
pub trait AffectSource: Send + Sync {
    fn affect_dict(&self, text: &str) -> Vec<(String, Vec<AffectTag>)>;
}

/// Affect source backed by the full NRC table.
pub struct NrcAffectSource {
    table: Arc<AffectTable>,
}

impl NrcAffectSource {
    pub fn new(table: Arc<AffectTable>) -> Self {
        Self { table }
    }
}

impl AffectSource for NrcAffectSource {
    fn affect_dict(&self, input: &str) -> Vec<(String, Vec<AffectTag>)> {
        let normalized = text::normalize(input);
        let mut seen = HashSet::new();
        text::lowercase_words(&normalized)
            .into_iter()
            .filter(|w| seen.insert(w.clone()))
            .filter_map(|w| self.table.tags(&w).map(|tags| (w, tags)))
            .collect()
    }
}

/// Pure functions deriving emotion measures from an [`AffectSource`].
#[derive(Clone)]
pub struct EmotionProfiler {
    source: Arc<dyn AffectSource>,
}

impl EmotionProfiler {
    pub fn new(source: Arc<dyn AffectSource>) -> Self {
        Self { source }
    }

    /// Words with at least one emotion tag, polarity stripped.
    pub fn affect_categories(&self, text: &str) -> Vec<(String, Vec<Emotion>)> {
        self.source
            .affect_dict(text)
            .into_iter()
            .map(|(word, tags)| {
                let emotions: Vec<Emotion> = tags.into_iter().filter_map(AffectTag::emotion).collect();
                (word, emotions)
            })
            .filter(|(_, emotions)| !emotions.is_empty())
            .collect()
    }

    /// Normalized emotion shares. Errors with `EmptyAffectInput` when the
    /// text has no emotion tags.
    pub fn affect_frequencies(&self, text: &str) -> Result<EmotionFrequencies> {
        let mut counts = [0u32; 8];
        for (_, emotions) in self.affect_categories(text) {
            for emotion in emotions {
                counts[emotion.index()] += 1;
            }
        }
        EmotionFrequencies::from_counts(&counts)
    }

    /// Like [`affect_frequencies`](Self::affect_frequencies) but maps
    /// emotionless text to `None`.
    pub fn try_affect_frequencies(&self, text: &str) -> Option<EmotionFrequencies> {
        self.affect_frequencies(text).ok()
    }

    pub fn dominant_emotions(&self, text: &str) -> Result<DominantEmotions> {
        Ok(self.affect_frequencies(text)?.dominant())
    }

    /// Emotion-carrying words, most tags first; ties keep text order.
    pub fn prioritized_affect_words(&self, text: &str) -> Vec<String> {
        let mut words = self.affect_categories(text);
        words.sort_by(|a, b| b.1.len().cmp(&a.1.len()));
        words.into_iter().map(|(w, _)| w).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AttackError;

    const RAW: &str = "love\tjoy\t1\nlove\tpositive\t1\nlove\ttrust\t0\n\
                       hate\tanger\t1\nhate\tdisgust\t1\nhate\tfear\t1\nhate\tnegative\t1\n\
                       nice\tpositive\t1\n\
                       sad\tsadness\t1\n";

    fn profiler() -> EmotionProfiler {
        let table = Arc::new(AffectTable::from_reader(RAW.as_bytes()).unwrap());
        EmotionProfiler::new(Arc::new(NrcAffectSource::new(table)))
    }

    #[test]
    fn polarity_only_words_are_ignored() {
        let cats = profiler().affect_categories("a nice day");
        assert!(cats.is_empty());
    }

    #[test]
    fn frequencies_count_each_distinct_word_once() {
        let freqs = profiler().affect_frequencies("Love love, sad").unwrap();
        assert_eq!(freqs.get(Emotion::Joy), 0.5);
        assert_eq!(freqs.get(Emotion::Sadness), 0.5);
    }

    #[test]
    fn emotionless_text_is_empty_input() {
        let p = profiler();
        assert!(matches!(
            p.affect_frequencies("the weather is mild today"),
            Err(AttackError::EmptyAffectInput)
        ));
        assert!(p.try_affect_frequencies("the weather").is_none());
    }

    #[test]
    fn prioritized_words_order_by_tag_count_then_position() {
        let words = profiler().prioritized_affect_words("sad love but hate");
        assert_eq!(words, vec!["hate", "sad", "love"]);
    }

    #[test]
    fn dominant_emotions_follow_maximum() {
        let dominant = profiler().dominant_emotions("hate and sad").unwrap();
        assert_eq!(
            dominant.emotions(),
            &[Emotion::Anger, Emotion::Disgust, Emotion::Fear, Emotion::Sadness]
        );
    }
}
