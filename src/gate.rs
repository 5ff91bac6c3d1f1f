//! Acceptance gate for one-word substitutions.
//!
//! A candidate passes when, after repairing only the grammar issues the
//! substitution introduced, it still differs from the original, stays
//! semantically close to it, and moves the emotion frequency map.

use crate::config::RepairStrategy;
use crate::error::Result;
use crate::grammar::{GrammarChecker, GrammarIssue};
use crate::profiler::EmotionProfiler;
use crate::similarity::SentenceSimilarity;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

/// Why a candidate was turned down.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    /// Grammar repair restored the original sentence.
    RepairReverted,
    DissimilarSentence { score: f32 },
    UnchangedEmotion,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GateDecision {
    pub accepted: bool,
    pub repaired_text: String,
    pub rejection: Option<Rejection>,
}

impl GateDecision {
    fn accept(repaired_text: String) -> Self {
        Self {
            accepted: true,
            repaired_text,
            rejection: None,
        }
    }

    fn reject(repaired_text: String, reason: Rejection) -> Self {
        Self {
            accepted: false,
            repaired_text,
            rejection: Some(reason),
        }
    }
}

/// Issues of `candidate` presumed to be artifacts of the substitution.
///
/// Empty whenever the candidate has no more issues than the original.
pub fn select_new_issues(
    original: &[GrammarIssue],
    candidate: &[GrammarIssue],
    strategy: RepairStrategy,
) -> Vec<GrammarIssue> {
    if candidate.len() <= original.len() {
        return Vec::new();
    }
    match strategy {
        RepairStrategy::Positional => positional_new_issues(original, candidate),
        RepairStrategy::Multiset => multiset_new_issues(original, candidate),
    }
}

fn positional_new_issues(original: &[GrammarIssue], candidate: &[GrammarIssue]) -> Vec<GrammarIssue> {
    let mut picked = Vec::new();
    for (i, issue) in candidate.iter().enumerate() {
        match original.get(i) {
            // Ran past the original list: the trailing issue is the artifact.
            None => {
                if let Some(last) = candidate.last() {
                    picked.push(last.clone());
                }
                break;
            }
            Some(orig) if orig.message != issue.message => picked.push(issue.clone()),
            Some(_) => {}
        }
    }
    picked
}

fn multiset_new_issues(original: &[GrammarIssue], candidate: &[GrammarIssue]) -> Vec<GrammarIssue> {
    let mut available: HashMap<(&str, &str), usize> = HashMap::new();
    for issue in original {
        *available
            .entry((issue.rule_id.as_str(), issue.message.as_str()))
            .or_default() += 1;
    }
    candidate
        .iter()
        .filter(|issue| {
            match available.get_mut(&(issue.rule_id.as_str(), issue.message.as_str())) {
                Some(n) if *n > 0 => {
                    *n -= 1;
                    false
                }
                _ => true,
            }
        })
        .cloned()
        .collect()
}

/// The three-step gate, borrowing the shared service handles.
pub struct AcceptanceGate<'a> {
    grammar: &'a dyn GrammarChecker,
    similarity: &'a dyn SentenceSimilarity,
    profiler: &'a EmotionProfiler,
    sentence_similarity: f32,
    strategy: RepairStrategy,
}

impl<'a> AcceptanceGate<'a> {
    pub fn new(
        grammar: &'a dyn GrammarChecker,
        similarity: &'a dyn SentenceSimilarity,
        profiler: &'a EmotionProfiler,
        sentence_similarity: f32,
        strategy: RepairStrategy,
    ) -> Self {
        Self {
            grammar,
            similarity,
            profiler,
            sentence_similarity,
            strategy,
        }
    }

    /// Repair `candidate` and decide whether it is a valid attack on
    /// `original`. Service failures propagate as errors.
    pub async fn evaluate(&self, original: &str, candidate: &str) -> Result<GateDecision> {
        let original_issues = self.grammar.check(original).await?;
        let candidate_issues = self.grammar.check(candidate).await?;
        let new_issues = select_new_issues(&original_issues, &candidate_issues, self.strategy);
        let repaired = if new_issues.is_empty() {
            candidate.to_string()
        } else {
            debug!("repairing {} introduced grammar issue(s)", new_issues.len());
            self.grammar.correct(candidate, &new_issues)
        };

        if repaired == original {
            return Ok(GateDecision::reject(repaired, Rejection::RepairReverted));
        }

        let score = self.similarity.similarity(original, &repaired).await?;
        if score < self.sentence_similarity {
            return Ok(GateDecision::reject(
                repaired,
                Rejection::DissimilarSentence { score },
            ));
        }

        if self.profiler.try_affect_frequencies(&repaired)
            == self.profiler.try_affect_frequencies(original)
        {
            return Ok(GateDecision::reject(repaired, Rejection::UnchangedEmotion));
        }

        Ok(GateDecision::accept(repaired))
    }
}
