//! Hypothesis tests used by the success analysis.
//!
//! - Shapiro-Wilk normality test (Royston's approximation)
//! - Wilcoxon signed-rank test (normal approximation, tie corrected)
//! - Paired t-test
//!
//! All p-values are two-sided.

use crate::error::{AttackError, Result};
use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TestResult {
    pub statistic: f64,
    pub pvalue: f64,
}

/// Shapiro-Wilk test of normality. Needs at least three observations.
///
/// Constant samples are reported as `W = 1`, `p = 1`.
pub fn shapiro_wilk(sample: &[f64]) -> Result<TestResult> {
    let n = sample.len();
    if n < 3 {
        return Err(AttackError::Validation {
            message: format!("Shapiro-Wilk needs at least 3 observations, got {}", n),
        });
    }
    let mut x = sample.to_vec();
    x.sort_by(|a, b| a.total_cmp(b));
    let range = x[n - 1] - x[0];
    if range.abs() < 1e-12 {
        return Ok(TestResult {
            statistic: 1.0,
            pvalue: 1.0,
        });
    }

    let a = shapiro_coefficients(n);
    let mean = x.iter().sum::<f64>() / n as f64;
    let ssq: f64 = x.iter().map(|v| (v - mean).powi(2)).sum();
    let num: f64 = a.iter().zip(&x).map(|(ai, xi)| ai * xi).sum();
    let w = (num * num / ssq).clamp(0.0, 1.0);

    let pvalue = if n == 3 {
        let p = 6.0 / PI * (w.sqrt().asin() - 0.75f64.sqrt().asin());
        p.clamp(0.0, 1.0)
    } else if n <= 11 {
        let nf = n as f64;
        let gamma = 0.459 * nf - 2.273;
        let mu = 0.5440 - 0.39978 * nf + 0.025054 * nf.powi(2) - 0.0006714 * nf.powi(3);
        let sigma =
            (1.3822 - 0.77857 * nf + 0.062767 * nf.powi(2) - 0.0020322 * nf.powi(3)).exp();
        let m = -(gamma - (1.0 - w).ln()).ln();
        1.0 - normal_cdf((m - mu) / sigma)
    } else {
        let ln_n = (n as f64).ln();
        let mu = 0.0038915 * ln_n.powi(3) - 0.083751 * ln_n.powi(2) - 0.31082 * ln_n - 1.5861;
        let sigma = (0.0030302 * ln_n.powi(2) - 0.082676 * ln_n - 0.4803).exp();
        1.0 - normal_cdf(((1.0 - w).ln() - mu) / sigma)
    };

    Ok(TestResult {
        statistic: w,
        pvalue: pvalue.clamp(0.0, 1.0),
    })
}

/// Royston's weights for sorted samples of size `n` (antisymmetric).
fn shapiro_coefficients(n: usize) -> Vec<f64> {
    if n == 3 {
        let r = 0.5f64.sqrt();
        return vec![-r, 0.0, r];
    }
    let nf = n as f64;
    let m: Vec<f64> = (1..=n)
        .map(|i| inverse_normal_cdf((i as f64 - 0.375) / (nf + 0.25)))
        .collect();
    let mm: f64 = m.iter().map(|v| v * v).sum();
    let u = 1.0 / nf.sqrt();
    let poly = |c: [f64; 6]| c[0] + u * (c[1] + u * (c[2] + u * (c[3] + u * (c[4] + u * c[5]))));

    let mut a = vec![0.0; n];
    let an = poly([m[n - 1] / mm.sqrt(), 0.221157, -0.147981, -2.071190, 4.434685, -2.706056]);
    a[n - 1] = an;
    a[0] = -an;

    if n > 5 {
        let an1 = poly([m[n - 2] / mm.sqrt(), 0.042981, -0.293762, -1.752461, 5.682633, -3.582633]);
        let phi = (mm - 2.0 * m[n - 1].powi(2) - 2.0 * m[n - 2].powi(2))
            / (1.0 - 2.0 * an.powi(2) - 2.0 * an1.powi(2));
        a[n - 2] = an1;
        a[1] = -an1;
        for i in 2..n - 2 {
            a[i] = m[i] / phi.sqrt();
        }
    } else {
        let phi = (mm - 2.0 * m[n - 1].powi(2)) / (1.0 - 2.0 * an.powi(2));
        for i in 1..n - 1 {
            a[i] = m[i] / phi.sqrt();
        }
    }
    a
}

/// Wilcoxon signed-rank test on paired samples.
///
/// Zero differences are dropped. When nothing remains the samples are
/// identical and `p = 1`.
pub fn wilcoxon(before: &[f64], after: &[f64]) -> Result<TestResult> {
    check_paired(before, after)?;
    let mut diffs: Vec<f64> = before
        .iter()
        .zip(after)
        .map(|(b, a)| b - a)
        .filter(|d| *d != 0.0)
        .collect();
    let n = diffs.len();
    if n == 0 {
        return Ok(TestResult {
            statistic: 0.0,
            pvalue: 1.0,
        });
    }
    diffs.sort_by(|a, b| a.abs().total_cmp(&b.abs()));

    // Average ranks over ties in |d|.
    let mut ranks = vec![0.0; n];
    let mut tie_term = 0.0;
    let mut i = 0;
    while i < n {
        let mut j = i + 1;
        while j < n && diffs[j].abs() == diffs[i].abs() {
            j += 1;
        }
        let avg = (i + j + 1) as f64 / 2.0;
        ranks[i..j].iter_mut().for_each(|r| *r = avg);
        let t = (j - i) as f64;
        tie_term += t * t * t - t;
        i = j;
    }

    let r_plus: f64 = diffs
        .iter()
        .zip(&ranks)
        .filter(|(d, _)| **d > 0.0)
        .map(|(_, r)| r)
        .sum();
    let r_minus: f64 = ranks.iter().sum::<f64>() - r_plus;
    let statistic = r_plus.min(r_minus);

    let nf = n as f64;
    let mean = nf * (nf + 1.0) / 4.0;
    let var = nf * (nf + 1.0) * (2.0 * nf + 1.0) / 24.0 - tie_term / 48.0;
    let pvalue = if var <= 0.0 {
        1.0
    } else {
        let z = (statistic - mean) / var.sqrt();
        (2.0 * normal_cdf(-z.abs())).clamp(0.0, 1.0)
    };
    Ok(TestResult { statistic, pvalue })
}

/// Paired t-test, computed as a one-sample test on the differences.
pub fn ttest_rel(before: &[f64], after: &[f64]) -> Result<TestResult> {
    check_paired(before, after)?;
    let n = before.len();
    if n < 2 {
        return Err(AttackError::Validation {
            message: "paired t-test needs at least 2 pairs".into(),
        });
    }
    let diffs: Vec<f64> = before.iter().zip(after).map(|(b, a)| b - a).collect();
    let nf = n as f64;
    let mean = diffs.iter().sum::<f64>() / nf;
    let var = diffs.iter().map(|d| (d - mean).powi(2)).sum::<f64>() / (nf - 1.0);
    if var <= 0.0 {
        // Constant differences: either no shift at all or a perfectly consistent one.
        let pvalue = if mean == 0.0 { 1.0 } else { 0.0 };
        return Ok(TestResult {
            statistic: if mean == 0.0 { 0.0 } else { f64::INFINITY.copysign(mean) },
            pvalue,
        });
    }
    let t = mean / (var / nf).sqrt();
    Ok(TestResult {
        statistic: t,
        pvalue: t_distribution_pvalue(t, nf - 1.0),
    })
}

fn check_paired(before: &[f64], after: &[f64]) -> Result<()> {
    if before.len() != after.len() {
        return Err(AttackError::Validation {
            message: format!(
                "paired samples differ in length: {} vs {}",
                before.len(),
                after.len()
            ),
        });
    }
    Ok(())
}

/// Two-sided p-value of Student's t.
fn t_distribution_pvalue(t: f64, df: f64) -> f64 {
    if df > 30.0 {
        return (2.0 * normal_cdf(-t.abs())).clamp(0.0, 1.0);
    }
    let x = df / (df + t * t);
    incomplete_beta(df / 2.0, 0.5, x).clamp(0.0, 1.0)
}

pub fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / 2f64.sqrt()))
}

/// Abramowitz and Stegun 7.1.26, absolute error below 1.5e-7.
fn erf(x: f64) -> f64 {
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + 0.3275911 * x);
    let y = 1.0
        - (((((1.061405429 * t - 1.453152027) * t) + 1.421413741) * t - 0.284496736) * t
            + 0.254829592)
            * t
            * (-x * x).exp();
    sign * y
}

/// Acklam's rational approximation of the standard normal quantile.
pub fn inverse_normal_cdf(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969683028665376e+01,
        2.209460984245205e+02,
        -2.759285104469687e+02,
        1.383577518672690e+02,
        -3.066479806614716e+01,
        2.506628277459239e+00,
    ];
    const B: [f64; 5] = [
        -5.447609879822406e+01,
        1.615858368580409e+02,
        -1.556989798598866e+02,
        6.680131188771972e+01,
        -1.328068155288572e+01,
    ];
    const C: [f64; 6] = [
        -7.784894002430293e-03,
        -3.223964580411365e-01,
        -2.400758277161838e+00,
        -2.549732539343734e+00,
        4.374664141464968e+00,
        2.938163982698783e+00,
    ];
    const D: [f64; 4] = [
        7.784695709041462e-03,
        3.224671290700398e-01,
        2.445134137142996e+00,
        3.754408661907416e+00,
    ];
    const P_LOW: f64 = 0.02425;

    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= 1.0 - P_LOW {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        -inverse_normal_cdf(1.0 - p)
    }
}

/// Regularized incomplete beta I_x(a, b).
fn incomplete_beta(a: f64, b: f64, x: f64) -> f64 {
    if x <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    let ln_bt = ln_gamma(a + b) - ln_gamma(a) - ln_gamma(b) + a * x.ln() + b * (1.0 - x).ln();
    let bt = ln_bt.exp();
    if x < (a + 1.0) / (a + b + 2.0) {
        bt * beta_continued_fraction(a, b, x) / a
    } else {
        1.0 - bt * beta_continued_fraction(b, a, 1.0 - x) / b
    }
}

/// Continued fraction for the incomplete beta (Lentz).
fn beta_continued_fraction(a: f64, b: f64, x: f64) -> f64 {
    const TINY: f64 = 1e-30;
    let qab = a + b;
    let qap = a + 1.0;
    let qam = a - 1.0;

    let mut c = 1.0;
    let mut d = 1.0 - qab * x / qap;
    if d.abs() < TINY {
        d = TINY;
    }
    d = 1.0 / d;
    let mut h = d;

    for m in 1..=200 {
        let m = m as f64;
        let m2 = 2.0 * m;

        let aa = m * (b - m) * x / ((qam + m2) * (a + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        h *= d * c;

        let aa = -(a + m) * (qab + m) * x / ((a + m2) * (qap + m2));
        d = 1.0 + aa * d;
        if d.abs() < TINY {
            d = TINY;
        }
        c = 1.0 + aa / c;
        if c.abs() < TINY {
            c = TINY;
        }
        d = 1.0 / d;
        let del = d * c;
        h *= del;
        if (del - 1.0).abs() < 1e-12 {
            break;
        }
    }
    h
}

/// Lanczos approximation of ln Γ(z) for z > 0.
fn ln_gamma(z: f64) -> f64 {
    const G: f64 = 7.0;
    const COEF: [f64; 9] = [
        0.999_999_999_999_809_9,
        676.520_368_121_885_1,
        -1_259.139_216_722_402_8,
        771.323_428_777_653_1,
        -176.615_029_162_140_6,
        12.507_343_278_686_905,
        -0.138_571_095_265_720_12,
        9.984_369_578_019_572e-6,
        1.505_632_735_149_311_6e-7,
    ];
    if z < 0.5 {
        // Reflection.
        return (PI / (PI * z).sin()).ln() - ln_gamma(1.0 - z);
    }
    let z = z - 1.0;
    let mut x = COEF[0];
    for (i, c) in COEF.iter().enumerate().skip(1) {
        x += c / (z + i as f64);
    }
    let t = z + G + 0.5;
    0.5 * (2.0 * PI).ln() + (z + 0.5) * t.ln() - t + x.ln()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn normal_cdf_and_quantile_agree() {
        assert!(close(normal_cdf(0.0), 0.5, 1e-7));
        assert!(close(normal_cdf(1.96), 0.975, 1e-3));
        assert!(close(inverse_normal_cdf(0.975), 1.959964, 1e-5));
        assert!(close(inverse_normal_cdf(0.01), -2.326348, 1e-5));
    }

    #[test]
    fn ln_gamma_matches_factorials() {
        assert!(close(ln_gamma(5.0), 24f64.ln(), 1e-9));
        assert!(close(ln_gamma(0.5), PI.sqrt().ln(), 1e-9));
    }

    #[test]
    fn shapiro_accepts_symmetric_sample() {
        let sample: Vec<f64> = (1..=20).map(|i| inverse_normal_cdf(i as f64 / 21.0)).collect();
        let result = shapiro_wilk(&sample).unwrap();
        assert!(result.statistic > 0.95);
        assert!(result.pvalue > 0.05);
    }

    #[test]
    fn shapiro_rejects_skewed_sample() {
        let mut sample = vec![0.0; 30];
        sample.extend([1.0, 1.0, 5.0, 20.0]);
        let result = shapiro_wilk(&sample).unwrap();
        assert!(result.pvalue < 0.05);
    }

    #[test]
    fn shapiro_needs_three_values() {
        assert!(shapiro_wilk(&[1.0, 2.0]).is_err());
        assert_eq!(shapiro_wilk(&[2.0, 2.0, 2.0]).unwrap().pvalue, 1.0);
    }

    #[test]
    fn wilcoxon_detects_consistent_shift() {
        let before: Vec<f64> = (0..30).map(|i| i as f64 / 10.0).collect();
        let after: Vec<f64> = before.iter().enumerate().map(|(i, v)| v + 1.0 + i as f64 * 0.01).collect();
        let result = wilcoxon(&before, &after).unwrap();
        assert_eq!(result.statistic, 0.0);
        assert!(result.pvalue < 0.001);
    }

    #[test]
    fn wilcoxon_identical_samples_give_one() {
        let xs = [0.2, 0.4, 0.5];
        assert_eq!(wilcoxon(&xs, &xs).unwrap().pvalue, 1.0);
    }

    #[test]
    fn paired_ttest_small_sample() {
        // differences 1, 2, 3, 4, 5: mean 3, sd sqrt(2.5), t = 4.2426, df 4
        let before = [2.0, 4.0, 6.0, 8.0, 10.0];
        let after = [1.0, 2.0, 3.0, 4.0, 5.0];
        let result = ttest_rel(&before, &after).unwrap();
        assert!(close(result.statistic, 4.2426, 1e-3));
        assert!(close(result.pvalue, 0.01324, 1e-3));
    }

    #[test]
    fn paired_ttest_rejects_mismatched_lengths() {
        assert!(ttest_rel(&[1.0, 2.0], &[1.0]).is_err());
    }
}
