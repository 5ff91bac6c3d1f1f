//! Review dataset presets and row filtering.

use crate::error::{AttackError, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Where a review corpus lives and which of its rows are usable.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSpec {
    pub name: String,
    pub path: PathBuf,
    pub column: String,
    /// Cell values that stand in for a missing review.
    pub placeholders: Vec<String>,
    /// Rows must be strictly longer than this many chars.
    pub min_chars: usize,
}

pub const PRESET_NAMES: [&str; 4] = ["amazon", "starbucks", "hotels", "restaurants"];

// name, file, column, placeholders, min_chars
const PRESETS: [(&str, &str, &str, &[&str], usize); 4] = [
    ("amazon", "amazon_reviews.csv", "reviews.text", &[], 0),
    ("starbucks", "starbucks_reviews.csv", "Review", &["No Review Text"], 0),
    ("hotels", "hotel_reviews.csv", "Review", &[], 0),
    ("restaurants", "restaurant_reviews.csv", "Review", &[], 50),
];

impl DatasetSpec {
    /// Custom CSV input with only the empty-row filter.
    pub fn custom(path: impl Into<PathBuf>, column: impl Into<String>) -> Self {
        let path = path.into();
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "custom".to_string());
        Self {
            name,
            path,
            column: column.into(),
            placeholders: Vec::new(),
            min_chars: 0,
        }
    }

    /// One of the bundled review corpora, resolved under `data_dir`.
    pub fn preset(name: &str, data_dir: &Path) -> Result<Self> {
        let (_, file, column, placeholders, min_chars) = PRESETS
            .iter()
            .find(|(preset, ..)| *preset == name)
            .ok_or_else(|| AttackError::Dataset {
                message: format!(
                    "unknown dataset '{}' (expected one of: {})",
                    name,
                    PRESET_NAMES.join(", ")
                ),
            })?;
        Ok(Self {
            name: name.to_string(),
            path: data_dir.join(file),
            column: column.to_string(),
            placeholders: placeholders.iter().map(|s| s.to_string()).collect(),
            min_chars: *min_chars,
        })
    }

    pub fn keeps(&self, text: &str) -> bool {
        let trimmed = text.trim();
        !trimmed.is_empty()
            && !self.placeholders.iter().any(|p| p == trimmed)
            && trimmed.chars().count() > self.min_chars
    }

    /// Review texts of the configured column that pass the row filter,
    /// in file order, at most `limit` of them.
    pub fn load_texts(&self, limit: Option<usize>) -> Result<Vec<String>> {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(&self.path)
            .map_err(|e| AttackError::Dataset {
                message: format!("cannot open {}: {}", self.path.display(), e),
            })?;
        let headers = reader.headers()?.clone();
        let column = headers
            .iter()
            .position(|h| h == self.column)
            .ok_or_else(|| AttackError::Dataset {
                message: format!(
                    "column '{}' not found in {}",
                    self.column,
                    self.path.display()
                ),
            })?;

        let mut texts = Vec::new();
        let mut dropped = 0usize;
        for record in reader.records() {
            let record = record?;
            let text = record.get(column).unwrap_or_default();
            if self.keeps(text) {
                texts.push(text.to_string());
                if limit.is_some_and(|n| texts.len() >= n) {
                    break;
                }
            } else {
                dropped += 1;
            }
        }
        info!(
            "dataset {}: {} usable rows, {} dropped",
            self.name,
            texts.len(),
            dropped
        );
        Ok(texts)
    }
}

/// Presets whose file is missing under `data_dir`.
pub fn check_datasets(data_dir: &Path) -> Vec<DatasetSpec> {
    PRESET_NAMES
        .iter()
        .filter_map(|name| DatasetSpec::preset(name, data_dir).ok())
        .filter(|spec| {
            let exists = spec.path.is_file();
            if !exists {
                warn!("dataset {} missing at {}", spec.name, spec.path.display());
            }
            !exists
        })
        .collect()
}
