//! In-memory capability implementations for integration tests.
#![allow(dead_code)]

use affect_attack::attack::AttackServices;
use affect_attack::error::{AttackError, Result};
use affect_attack::grammar::{GrammarChecker, GrammarIssue};
use affect_attack::lexicon::{AffectTable, Lexicon};
use affect_attack::profiler::{EmotionProfiler, NrcAffectSource};
use affect_attack::similarity::SentenceSimilarity;
use affect_attack::word_vectors::WordEmbeddings;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const RAW_LEXICON: &str = "\
love\tjoy\t1
love\ttrust\t1
love\tpositive\t1
adore\tjoy\t1
adore\ttrust\t1
adore\tpositive\t1
hate\tanger\t1
hate\tdisgust\t1
hate\tnegative\t1
like\tjoy\t1
storm\tfear\t1
storm\tanger\t1
gentle\ttrust\t1
school\tjoy\t0
";

pub struct ScriptedEmbeddings {
    neighbours: HashMap<String, Vec<(String, f32)>>,
}

impl ScriptedEmbeddings {
    pub fn new(entries: Vec<(&str, Vec<(&str, f32)>)>) -> Self {
        let neighbours = entries
            .into_iter()
            .map(|(word, ns)| {
                (
                    word.to_string(),
                    ns.into_iter().map(|(w, s)| (w.to_string(), s)).collect(),
                )
            })
            .collect();
        Self { neighbours }
    }
}

impl WordEmbeddings for ScriptedEmbeddings {
    fn contains(&self, word: &str) -> bool {
        self.neighbours.contains_key(word)
    }

    fn most_similar(&self, word: &str, topn: usize) -> Result<Vec<(String, f32)>> {
        self.neighbours
            .get(word)
            .map(|ns| ns.iter().take(topn).cloned().collect())
            .ok_or_else(|| AttackError::VocabularyMiss {
                word: word.to_string(),
            })
    }
}

/// Grammar checker answering from a fixed table. Texts containing
/// `fail_on` produce a service error; every call is counted.
#[derive(Default)]
pub struct ScriptedGrammar {
    pub issues: HashMap<String, Vec<GrammarIssue>>,
    pub fail_on: Option<String>,
    pub delay: Option<Duration>,
    pub calls: AtomicUsize,
}

impl ScriptedGrammar {
    pub fn with_issues(mut self, text: &str, issues: Vec<GrammarIssue>) -> Self {
        self.issues.insert(text.to_string(), issues);
        self
    }

    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_on = Some(marker.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GrammarChecker for ScriptedGrammar {
    async fn check(&self, text: &str) -> Result<Vec<GrammarIssue>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_on.as_deref().is_some_and(|m| text.contains(m)) {
            return Err(AttackError::Grammar {
                message: "connection refused".into(),
            });
        }
        Ok(self.issues.get(text).cloned().unwrap_or_default())
    }
}

/// Returns the same score for every pair.
pub struct FixedSimilarity(pub f32);

#[async_trait]
impl SentenceSimilarity for FixedSimilarity {
    async fn similarity(&self, _a: &str, _b: &str) -> Result<f32> {
        Ok(self.0)
    }
}

pub fn issue(rule: &str, message: &str, offset: usize, length: usize, fix: &str) -> GrammarIssue {
    GrammarIssue {
        rule_id: rule.into(),
        message: message.into(),
        offset,
        length,
        replacements: vec![fix.into()],
    }
}

pub fn profiler() -> (Arc<Lexicon>, EmotionProfiler) {
    let table = Arc::new(AffectTable::from_reader(RAW_LEXICON.as_bytes()).unwrap());
    let lexicon = Arc::new(Lexicon::from_table(&table));
    (lexicon, EmotionProfiler::new(Arc::new(NrcAffectSource::new(table))))
}

pub fn default_embeddings() -> ScriptedEmbeddings {
    ScriptedEmbeddings::new(vec![
        ("love", vec![("adore", 0.90), ("hate", 0.80), ("like", 0.75)]),
        ("weather", vec![("storm", 0.70), ("climate", 0.65)]),
        ("mild", vec![("gentle", 0.80), ("moderate", 0.78)]),
    ])
}

pub fn services(grammar: Arc<ScriptedGrammar>, similarity: f32) -> AttackServices {
    let (lexicon, profiler) = profiler();
    AttackServices {
        lexicon,
        profiler,
        embeddings: Arc::new(default_embeddings()),
        grammar,
        similarity: Arc::new(FixedSimilarity(similarity)),
    }
}
