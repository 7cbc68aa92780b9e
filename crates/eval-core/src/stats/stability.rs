//! Spread of scores across repeated trials.

use serde::{Deserialize, Serialize};

use super::{mean, sample_variance};
use crate::domain::EvalResult;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct StabilityMetrics {
    /// Sample variance (ddof = 1); 0 for a single result.
    pub variance: f64,
    pub std_dev: f64,
    /// `std_dev / mean`, 0 when the mean is not positive.
    pub coefficient_of_variation: f64,
    pub min_score: f64,
    pub max_score: f64,
    pub score_range: f64,
}

pub fn calculate_stability(results: &[EvalResult]) -> StabilityMetrics {
    let scores: Vec<f64> = results.iter().map(|r| r.overall_score).collect();
    stability_of(&scores)
}

/// Stability of raw scores; all zeros for an empty slice.
pub fn stability_of(scores: &[f64]) -> StabilityMetrics {
    if scores.is_empty() {
        return StabilityMetrics::default();
    }

    let variance = sample_variance(scores);
    let std_dev = variance.sqrt();
    let m = mean(scores);
    let coefficient_of_variation = if m > 0.0 { std_dev / m } else { 0.0 };
    let min_score = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let max_score = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    StabilityMetrics {
        variance,
        std_dev,
        coefficient_of_variation,
        min_score,
        max_score,
        score_range: max_score - min_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_scores_have_no_spread() {
        let s = stability_of(&[0.7; 5]);
        assert_eq!(s.variance, 0.0);
        assert_eq!(s.coefficient_of_variation, 0.0);
        assert_eq!(s.score_range, 0.0);
    }

    #[test]
    fn varying_scores() {
        let s = stability_of(&[0.2, 0.4, 0.6, 0.8, 1.0]);
        assert!((s.score_range - 0.8).abs() < 1e-12);
        assert!((s.variance - 0.1).abs() < 1e-12);
        assert!((s.coefficient_of_variation - 0.1f64.sqrt() / 0.6).abs() < 1e-12);
    }

    #[test]
    fn single_and_empty() {
        let one = stability_of(&[0.4]);
        assert_eq!(one.variance, 0.0);
        assert_eq!(one.min_score, 0.4);
        assert_eq!(stability_of(&[]), StabilityMetrics::default());
    }

    #[test]
    fn zero_mean_has_zero_cv() {
        assert_eq!(stability_of(&[0.0, 0.0]).coefficient_of_variation, 0.0);
    }
}
