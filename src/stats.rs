//! Reference statistics and the outlier rule applied to every rate.
//!
//! Undefined statistics are represented as `f64::NAN` and are never
//! coerced to zero. A NaN mean or standard deviation makes every rate
//! compare as invalid, so an empty baseline filters out everything.

use serde::Serialize;

/// Default width of the acceptance band, in standard deviations.
pub const DEFAULT_THRESHOLD: f64 = 2.0;

/// Mean and population standard deviation of a baseline population.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReferenceStats {
    pub mean: f64,
    pub std_dev: f64,
}

impl ReferenceStats {
    /// Lower and upper acceptance bounds for `threshold` standard deviations.
    pub fn bounds(&self, threshold: f64) -> (f64, f64) {
        let spread = threshold * self.std_dev;
        (self.mean - spread, self.mean + spread)
    }

    /// Returns `true` if either statistic is undefined.
    pub fn is_undefined(&self) -> bool {
        self.mean.is_nan() || self.std_dev.is_nan()
    }

    /// Checks `rate` against these stats. See [`is_rate_valid`].
    pub fn accepts(&self, rate: Option<f64>, threshold: f64) -> bool {
        is_rate_valid(rate, self.mean, self.std_dev, threshold)
    }
}

/// Computes the arithmetic mean of a slice of values. Returns NaN for empty input.
fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Computes the population standard deviation given a pre-computed mean.
/// Returns NaN for empty input.
fn stddev(values: &[f64], mean: f64) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;

    variance.sqrt()
}

/// Computes mean and population standard deviation over the present samples.
///
/// `None` and NaN entries are skipped. If nothing is left, both fields are NaN.
pub fn calculate_stats(samples: &[Option<f64>]) -> ReferenceStats {
    let present: Vec<f64> = samples
        .iter()
        .filter_map(|s| s.filter(|v| !v.is_nan()))
        .collect();

    let mean = mean(&present);
    ReferenceStats {
        mean,
        std_dev: stddev(&present, mean),
    }
}

/// Returns `true` if `rate` lies within `mean ± threshold * std_dev`, bounds included.
///
/// A missing rate is never valid.
pub fn is_rate_valid(rate: Option<f64>, mean: f64, std_dev: f64, threshold: f64) -> bool {
    let Some(rate) = rate else {
        return false;
    };
    rate >= mean - threshold * std_dev && rate <= mean + threshold * std_dev
}

/// The baseline population after filtering it against its own bounds.
#[derive(Debug, Clone, Serialize)]
pub struct BaselineSummary {
    pub stats: ReferenceStats,
    /// Baseline values with outliers replaced by `None`, in input order.
    pub filtered: Vec<Option<f64>>,
    /// Mean of the values that survived filtering (NaN if none did).
    pub filtered_mean: f64,
}

impl BaselineSummary {
    pub fn new(baseline: &[f64], threshold: f64) -> Self {
        let samples: Vec<Option<f64>> = baseline.iter().copied().map(Some).collect();
        let stats = calculate_stats(&samples);

        let filtered: Vec<Option<f64>> = samples
            .into_iter()
            .map(|rate| rate.filter(|_| stats.accepts(rate, threshold)))
            .collect();

        let kept: Vec<f64> = filtered.iter().flatten().copied().collect();

        Self {
            stats,
            filtered,
            filtered_mean: mean(&kept),
        }
    }

    /// Number of baseline values rejected as outliers.
    pub fn rejected(&self) -> usize {
        self.filtered.iter().filter(|v| v.is_none()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_BASELINE: [f64; 32] = [
        0.1, 0.5, 0.2, 0.4, 0.3, 0.6, 1.0, 0.8, 0.9, 0.7, 1.1, 1.2, 0.3, 0.4, 0.5, 0.6, 0.3, 0.2,
        0.4, 0.3, 0.8, 0.5, 0.6, 0.4, 0.7, 0.8, 0.9, 1.0, 0.2, 0.4, 0.3, 0.7,
    ];

    fn some(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().copied().map(Some).collect()
    }

    #[test]
    fn test_calculate_stats_sample_baseline() {
        let stats = calculate_stats(&some(&SAMPLE_BASELINE));

        assert!((stats.mean - 0.565625).abs() < 1e-9);
        assert!((stats.std_dev - 0.287).abs() < 5e-4);
    }

    #[test]
    fn test_calculate_stats_uses_population_formula() {
        let stats = calculate_stats(&some(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]));

        assert_eq!(stats.mean, 5.0);
        assert_eq!(stats.std_dev, 2.0);
    }

    #[test]
    fn test_calculate_stats_skips_missing() {
        let stats = calculate_stats(&[Some(1.0), None, Some(3.0), Some(f64::NAN)]);

        assert_eq!(stats.mean, 2.0);
        assert_eq!(stats.std_dev, 1.0);
    }

    #[test]
    fn test_calculate_stats_all_missing_is_undefined() {
        let stats = calculate_stats(&[None, None, Some(f64::NAN)]);
        assert!(stats.mean.is_nan());
        assert!(stats.std_dev.is_nan());
        assert!(stats.is_undefined());

        assert!(calculate_stats(&[]).is_undefined());
    }

    #[test]
    fn test_mean_is_always_valid() {
        for (m, s, t) in [(0.5, 0.2, 2.0), (0.0, 0.0, 0.0), (-3.0, 1.5, 0.5), (10.0, 0.0, 2.0)] {
            assert!(is_rate_valid(Some(m), m, s, t));
        }
    }

    #[test]
    fn test_bounds_are_inclusive() {
        assert!(is_rate_valid(Some(0.0), 1.0, 0.5, 2.0));
        assert!(is_rate_valid(Some(2.0), 1.0, 0.5, 2.0));
        assert!(!is_rate_valid(Some(-0.001), 1.0, 0.5, 2.0));
        assert!(!is_rate_valid(Some(2.001), 1.0, 0.5, 2.0));
    }

    #[test]
    fn test_threshold_widens_band() {
        assert!(!is_rate_valid(Some(2.5), 1.0, 0.5, 2.0));
        assert!(is_rate_valid(Some(2.5), 1.0, 0.5, 3.0));
    }

    #[test]
    fn test_missing_rate_is_invalid() {
        assert!(!is_rate_valid(None, 1.0, 0.5, 2.0));
        assert!(!is_rate_valid(Some(f64::NAN), 1.0, 0.5, 2.0));
    }

    #[test]
    fn test_undefined_stats_reject_everything() {
        let stats = calculate_stats(&[]);
        assert!(!stats.accepts(Some(0.0), DEFAULT_THRESHOLD));
    }

    #[test]
    fn test_sample_rate_within_upper_bound() {
        let stats = calculate_stats(&some(&SAMPLE_BASELINE));
        let (low, high) = stats.bounds(DEFAULT_THRESHOLD);

        assert!((high - 1.139).abs() < 1e-3);
        assert!(low < 0.0);
        assert!(stats.accepts(Some(1.0), DEFAULT_THRESHOLD));
        assert!(!stats.accepts(Some(1.2), DEFAULT_THRESHOLD));
    }

    #[test]
    fn test_baseline_summary_filters_own_outliers() {
        let summary = BaselineSummary::new(&SAMPLE_BASELINE, DEFAULT_THRESHOLD);

        assert_eq!(summary.filtered.len(), 32);
        assert_eq!(summary.rejected(), 1);
        assert_eq!(summary.filtered[11], None);
        assert!((summary.filtered_mean - 16.9 / 31.0).abs() < 1e-9);
    }

    #[test]
    fn test_baseline_summary_empty() {
        let summary = BaselineSummary::new(&[], DEFAULT_THRESHOLD);
        assert!(summary.stats.is_undefined());
        assert!(summary.filtered_mean.is_nan());
    }
}
