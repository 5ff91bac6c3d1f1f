//! Success measures over attacked datasets.

pub mod stats;

use crate::batch::AttackRow;
use crate::emotion::{Emotion, Polarity};
use crate::error::{AttackError, Result};
use prettytable::{Table, row};
use serde::Serialize;

/// Shift of a polarity share in the dominant set that counts as a
/// business-relevant change.
pub const BUSINESS_SHIFT: f64 = 0.5;
pub const SIGNIFICANCE: f64 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EqualityTest {
    Wilcoxon,
    PairedT,
}

/// Per-emotion comparison of the pre- and post-attack shares.
#[derive(Debug, Clone, Serialize)]
pub struct EmotionTest {
    pub emotion: Emotion,
    pub normality_pvalue: f64,
    pub test: EqualityTest,
    pub equality_pvalue: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatasetReport {
    pub name: String,
    pub rows: usize,
    pub attack_rate: f64,
    pub business_success: f64,
    pub tests: Vec<EmotionTest>,
}

/// Share of rows for which an attack was found, the failure share rounded
/// to three decimals first.
pub fn attack_rate(rows: &[AttackRow]) -> f64 {
    if rows.is_empty() {
        return 0.0;
    }
    let failed = rows.iter().filter(|r| !r.attack_found()).count();
    let fail_rate = (failed as f64 / rows.len() as f64 * 1000.0).round() / 1000.0;
    1.0 - fail_rate
}

/// Whether an attacked row moved the negative or positive share of its
/// dominant set by at least [`BUSINESS_SHIFT`].
pub fn is_business_success(row: &AttackRow) -> Result<bool> {
    if !row.attack_found() {
        return Ok(false);
    }
    let before = row.original_dominant()?;
    let after = row.new_dominant()?;
    let moved = |p: Polarity| (after.polarity_share(p) - before.polarity_share(p)).abs();
    Ok(moved(Polarity::Negative) >= BUSINESS_SHIFT || moved(Polarity::Positive) >= BUSINESS_SHIFT)
}

/// Fraction of all rows that are business successes.
pub fn business_success(rows: &[AttackRow]) -> Result<f64> {
    if rows.is_empty() {
        return Ok(0.0);
    }
    let mut hits = 0usize;
    for row in rows {
        if is_business_success(row)? {
            hits += 1;
        }
    }
    Ok(hits as f64 / rows.len() as f64)
}

/// Per emotion: Shapiro-Wilk on the pooled pre/post shares decides between
/// a Wilcoxon signed-rank test and a paired t-test.
pub fn analytical_success(rows: &[AttackRow]) -> Result<Vec<EmotionTest>> {
    if rows.len() < 2 {
        return Err(AttackError::Validation {
            message: format!("need at least 2 rows for statistical tests, got {}", rows.len()),
        });
    }
    Emotion::ALL
        .into_iter()
        .map(|emotion| {
            let before: Vec<f64> = rows.iter().map(|r| r.original_share(emotion)).collect();
            let after: Vec<f64> = rows.iter().map(|r| r.new_share(emotion)).collect();
            let pooled: Vec<f64> = before.iter().chain(&after).copied().collect();
            let normality = stats::shapiro_wilk(&pooled)?;
            let (test, equality) = if normality.pvalue < SIGNIFICANCE {
                (EqualityTest::Wilcoxon, stats::wilcoxon(&before, &after)?)
            } else {
                (EqualityTest::PairedT, stats::ttest_rel(&before, &after)?)
            };
            Ok(EmotionTest {
                emotion,
                normality_pvalue: normality.pvalue,
                test,
                equality_pvalue: equality.pvalue,
            })
        })
        .collect()
}

pub fn analyze(name: impl Into<String>, rows: &[AttackRow]) -> Result<DatasetReport> {
    Ok(DatasetReport {
        name: name.into(),
        rows: rows.len(),
        attack_rate: attack_rate(rows),
        business_success: business_success(rows)?,
        tests: analytical_success(rows)?,
    })
}

/// Overview table, one line per dataset and emotion.
pub fn analysis_overview(reports: &[DatasetReport]) -> Table {
    let mut table = Table::new();
    table.add_row(row![
        "dataset",
        "rows",
        "attack rate",
        "business success",
        "emotion",
        "normality p",
        "test",
        "equality p"
    ]);
    for report in reports {
        for (i, test) in report.tests.iter().enumerate() {
            let (name, rows, rate, business) = if i == 0 {
                (
                    report.name.clone(),
                    report.rows.to_string(),
                    format!("{:.3}", report.attack_rate),
                    format!("{:.3}", report.business_success),
                )
            } else {
                Default::default()
            };
            let test_name = match test.test {
                EqualityTest::Wilcoxon => "wilcoxon",
                EqualityTest::PairedT => "paired t",
            };
            table.add_row(row![
                name,
                rows,
                rate,
                business,
                test.emotion,
                format!("{:.4}", test.normality_pvalue),
                test_name,
                format!("{:.4}", test.equality_pvalue)
            ]);
        }
    }
    table
}
