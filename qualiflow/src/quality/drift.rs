//! Distribution-drift detection between two datasets.
//!
//! Each numeric column present in both datasets is compared with a
//! two-sample Kolmogorov-Smirnov test plus a relative mean-shift check.
//! Columns missing from either side are excluded rather than failing the
//! comparison.

use crate::dataset::stats::mean;
use crate::dataset::Dataset;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Drift-detection policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftConfig {
    /// KS-test p-value below which a column is flagged as drifted.
    pub p_value_threshold: f64,
    /// Relative mean shift (percent) above which a column is flagged as a
    /// significant change.
    pub mean_shift_pct: f64,
    /// Columns excluded from comparison (identifiers).
    pub exclude_columns: Vec<String>,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            p_value_threshold: 0.05,
            mean_shift_pct: 10.0,
            exclude_columns: vec!["id".to_string()],
        }
    }
}

/// Per-column drift result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDrift {
    /// KS statistic (max CDF distance).
    pub statistic: f64,
    /// Asymptotic p-value of the KS test.
    pub p_value: f64,
    /// True iff `p_value` is below the configured threshold.
    pub drift_detected: bool,
    /// Mean of the reference sample.
    pub reference_mean: f64,
    /// Mean of the current sample.
    pub current_mean: f64,
    /// Relative mean shift, in percent of the reference mean.
    pub mean_diff_pct: f64,
    /// True iff the relative mean shift exceeds the configured limit.
    pub significant_change: bool,
}

/// Drift comparison result for a dataset pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct DriftReport {
    /// Per-column results, keyed by column name.
    pub per_feature: BTreeMap<String, FeatureDrift>,
    /// Columns where the KS test flagged drift.
    pub affected_features: Vec<String>,
    /// True iff at least one column is flagged.
    pub drift_detected: bool,
}

/// Statistical comparison of a reference dataset against a current one.
///
/// Stateless: the report is recomputable from the dataset pair alone.
#[derive(Debug, Clone, Default)]
pub struct DriftDetector {
    config: DriftConfig,
}

impl DriftDetector {
    /// Creates a detector with the given policy.
    #[must_use]
    pub fn new(config: DriftConfig) -> Self {
        Self { config }
    }

    /// Compares `current` against `reference`, column by column.
    #[must_use]
    pub fn compare(&self, reference: &Dataset, current: &Dataset) -> DriftReport {
        let mut report = DriftReport::default();

        for col in reference.columns() {
            if self.config.exclude_columns.iter().any(|c| c == &col.name) {
                continue;
            }
            let Some(ref_values) = col.numeric_values() else {
                continue;
            };
            let Some(cur_values) = current.column(&col.name).and_then(|c| c.numeric_values())
            else {
                continue;
            };
            if ref_values.is_empty() || cur_values.is_empty() {
                continue;
            }

            let (statistic, p_value) = ks_2samp(&ref_values, &cur_values);
            let drift_detected = p_value < self.config.p_value_threshold;

            let reference_mean = mean(&ref_values).unwrap_or(0.0);
            let current_mean = mean(&cur_values).unwrap_or(0.0);
            let mean_diff_pct = if reference_mean == 0.0 {
                0.0
            } else {
                ((current_mean - reference_mean) / reference_mean).abs() * 100.0
            };
            let significant_change = mean_diff_pct > self.config.mean_shift_pct;

            if drift_detected {
                report.affected_features.push(col.name.clone());
                report.drift_detected = true;
            }
            report.per_feature.insert(
                col.name.clone(),
                FeatureDrift {
                    statistic,
                    p_value,
                    drift_detected,
                    reference_mean,
                    current_mean,
                    mean_diff_pct,
                    significant_change,
                },
            );
        }

        info!(
            compared = report.per_feature.len(),
            affected = report.affected_features.len(),
            "drift comparison finished"
        );
        report
    }
}

/// Two-sample Kolmogorov-Smirnov test.
///
/// Returns `(statistic, p_value)`. The p-value uses the asymptotic
/// Kolmogorov distribution with the standard small-sample effective-n
/// correction; identical samples yield exactly `(0.0, 1.0)`.
#[must_use]
pub fn ks_2samp(sample1: &[f64], sample2: &[f64]) -> (f64, f64) {
    if sample1.is_empty() || sample2.is_empty() {
        return (0.0, 1.0);
    }
    let mut a = sample1.to_vec();
    let mut b = sample2.to_vec();
    a.sort_by(|x, y| x.partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal));
    b.sort_by(|x, y| x.partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal));

    #[allow(clippy::cast_precision_loss)]
    let en1 = a.len() as f64;
    #[allow(clippy::cast_precision_loss)]
    let en2 = b.len() as f64;

    let mut i = 0usize;
    let mut j = 0usize;
    let mut fn1 = 0.0;
    let mut fn2 = 0.0;
    let mut d: f64 = 0.0;
    while i < a.len() && j < b.len() {
        let d1 = a[i];
        let d2 = b[j];
        if d1 <= d2 {
            while i < a.len() && a[i] == d1 {
                i += 1;
            }
            #[allow(clippy::cast_precision_loss)]
            {
                fn1 = i as f64 / en1;
            }
        }
        if d2 <= d1 {
            while j < b.len() && b[j] == d2 {
                j += 1;
            }
            #[allow(clippy::cast_precision_loss)]
            {
                fn2 = j as f64 / en2;
            }
        }
        d = d.max((fn1 - fn2).abs());
    }

    if d == 0.0 {
        return (0.0, 1.0);
    }
    let en = (en1 * en2 / (en1 + en2)).sqrt();
    let lambda = (en + 0.12 + 0.11 / en) * d;
    (d, kolmogorov_survival(lambda))
}

/// Survival function of the Kolmogorov distribution,
/// `Q(lambda) = 2 * sum_{k>=1} (-1)^{k-1} exp(-2 k^2 lambda^2)`.
fn kolmogorov_survival(lambda: f64) -> f64 {
    if lambda <= 0.0 {
        return 1.0;
    }
    let a2 = -2.0 * lambda * lambda;
    let mut sum = 0.0;
    let mut sign = 2.0;
    let mut prev_term = 0.0f64;
    for k in 1..=100 {
        let term = sign * (a2 * f64::from(k * k)).exp();
        sum += term;
        if term.abs() <= 1e-3 * prev_term || term.abs() <= 1e-8 * sum.abs() {
            return sum.clamp(0.0, 1.0);
        }
        sign = -sign;
        prev_term = term.abs();
    }
    // Series did not converge; the distributions are effectively identical.
    1.0
}
