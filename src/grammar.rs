//! Grammar checking capability and a LanguageTool HTTP client.

use crate::error::{AttackError, Result};
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::time::Duration;
use tracing::debug;

/// One detected issue. Offsets and lengths count chars, not bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrammarIssue {
    pub rule_id: String,
    pub message: String,
    pub offset: usize,
    pub length: usize,
    pub replacements: Vec<String>,
}

#[async_trait]
pub trait GrammarChecker: Send + Sync {
    /// Issues in `text`, ordered by position.
    async fn check(&self, text: &str) -> Result<Vec<GrammarIssue>>;

    /// Apply the given issues' suggested fixes to `text`.
    fn correct(&self, text: &str, issues: &[GrammarIssue]) -> String {
        apply_corrections(text, issues)
    }
}

/// Replace each issue's span with its first suggestion, shifting later
/// offsets by the change in length. Issues without suggestions, or whose
/// span no longer holds the original text, are skipped.
pub fn apply_corrections(text: &str, issues: &[GrammarIssue]) -> String {
    let original: Vec<char> = text.chars().collect();
    let mut chars = original.clone();
    let mut fixable: Vec<&GrammarIssue> = issues
        .iter()
        .filter(|i| !i.replacements.is_empty())
        .collect();
    fixable.sort_by_key(|i| i.offset);

    let mut shift: isize = 0;
    for issue in fixable {
        let end = issue.offset + issue.length;
        if end > original.len() {
            continue;
        }
        let from = issue.offset as isize + shift;
        let to = end as isize + shift;
        if from < 0 || to as usize > chars.len() {
            continue;
        }
        let (from, to) = (from as usize, to as usize);
        if chars[from..to] != original[issue.offset..end] {
            continue;
        }
        let replacement: Vec<char> = issue.replacements[0].chars().collect();
        shift += replacement.len() as isize - issue.length as isize;
        chars.splice(from..to, replacement);
    }
    chars.into_iter().collect()
}

#[derive(Deserialize)]
struct CheckResponse {
    matches: Vec<LtMatch>,
}

#[derive(Deserialize)]
struct LtMatch {
    message: String,
    offset: usize,
    length: usize,
    #[serde(default)]
    replacements: Vec<LtReplacement>,
    rule: LtRule,
}

#[derive(Deserialize)]
struct LtReplacement {
    value: String,
}

#[derive(Deserialize)]
struct LtRule {
    id: String,
}

/// Client for a LanguageTool server's `/check` endpoint.
pub struct LanguageToolClient {
    client: reqwest::Client,
    base_url: String,
    language: String,
    retries: u32,
    limiter: DefaultDirectRateLimiter,
}

impl LanguageToolClient {
    pub fn new(
        base_url: impl Into<String>,
        language: impl Into<String>,
        requests_per_second: u32,
        timeout_ms: u64,
        retries: u32,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(|e| AttackError::Grammar {
                message: format!("Failed to build HTTP client: {}", e),
            })?;
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            language: language.into(),
            retries: retries.max(1),
            limiter: RateLimiter::direct(Quota::per_second(rps)),
        })
    }

    async fn check_once(&self, text: &str) -> Result<Vec<GrammarIssue>> {
        self.limiter.until_ready().await;
        let response = self
            .client
            .post(format!("{}/check", self.base_url))
            .form(&[("text", text), ("language", self.language.as_str())])
            .send()
            .await
            .map_err(|e| AttackError::Grammar {
                message: format!("request failed: {}", e),
            })?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AttackError::Grammar {
                message: format!("LanguageTool error {}: {}", status, body),
            });
        }
        let parsed: CheckResponse = response.json().await.map_err(|e| AttackError::Grammar {
            message: format!("invalid LanguageTool response: {}", e),
        })?;
        Ok(parsed
            .matches
            .into_iter()
            .map(|m| {
                let start = utf16_to_char_offset(text, m.offset);
                let end = utf16_to_char_offset(text, m.offset + m.length);
                GrammarIssue {
                    rule_id: m.rule.id,
                    message: m.message,
                    offset: start,
                    length: end - start,
                    replacements: m.replacements.into_iter().map(|r| r.value).collect(),
                }
            })
            .collect())
    }
}

#[async_trait]
impl GrammarChecker for LanguageToolClient {
    async fn check(&self, text: &str) -> Result<Vec<GrammarIssue>> {
        let mut last_err = None;
        for i in 0..self.retries {
            match self.check_once(text).await {
                Ok(issues) => {
                    debug!("LanguageTool found {} issue(s)", issues.len());
                    return Ok(issues);
                }
                Err(e) => {
                    last_err = Some(e);
                    let delay_ms = 200u64 * (1u64 << i);
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
            }
        }
        Err(last_err.unwrap_or_else(|| AttackError::Grammar {
            message: "Unknown LanguageTool error".to_string(),
        }))
    }
}

/// LanguageTool reports Java (UTF-16) string offsets.
fn utf16_to_char_offset(text: &str, utf16_offset: usize) -> usize {
    let mut units = 0;
    for (i, c) in text.chars().enumerate() {
        if units >= utf16_offset {
            return i;
        }
        units += c.len_utf16();
    }
    text.chars().count()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issue(offset: usize, length: usize, fix: &str) -> GrammarIssue {
        GrammarIssue {
            rule_id: "R".into(),
            message: "m".into(),
            offset,
            length,
            replacements: vec![fix.into()],
        }
    }

    #[test]
    fn corrections_shift_later_offsets() {
        let text = "he go to a apple store";
        let fixed = apply_corrections(text, &[issue(3, 2, "goes"), issue(9, 1, "an")]);
        assert_eq!(fixed, "he goes to an apple store");
    }

    #[test]
    fn issues_without_suggestions_are_ignored() {
        let mut i = issue(0, 2, "x");
        i.replacements.clear();
        assert_eq!(apply_corrections("he go", &[i]), "he go");
    }

    #[test]
    fn out_of_range_issue_is_skipped() {
        assert_eq!(apply_corrections("short", &[issue(3, 10, "x")]), "short");
    }

    #[test]
    fn utf16_offsets_map_to_chars() {
        let text = "😀 he go";
        // the emoji is two UTF-16 units, one char
        assert_eq!(utf16_to_char_offset(text, 3), 2);
        assert_eq!(utf16_to_char_offset(text, 0), 0);
        assert_eq!(utf16_to_char_offset(text, 100), text.chars().count());
    }

    #[test]
    fn response_json_parses() {
        let json = r#"{"matches":[{"message":"Possible agreement error","offset":3,"length":2,
            "replacements":[{"value":"goes"}],"rule":{"id":"HE_VERB_AGR"}}]}"#;
        let parsed: CheckResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.matches[0].rule.id, "HE_VERB_AGR");
        assert_eq!(parsed.matches[0].replacements[0].value, "goes");
    }
}
