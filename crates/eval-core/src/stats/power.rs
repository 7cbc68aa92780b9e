//! Sample-size recommendation for detecting a pass-rate change.

use serde::{Deserialize, Serialize};

use super::distribution::normal_ppf;
use crate::config::StatsConfig;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PowerAnalysisResult {
    pub baseline_rate: f64,
    pub min_detectable_effect: f64,
    /// Runs needed per configuration.
    pub recommended_sample_size: u32,
    pub power: f64,
    pub alpha: f64,
    pub notes: String,
}

fn in_open_unit(x: f64) -> bool {
    x > 0.0 && x < 1.0
}

/// Runs per group needed to detect a change of `min_effect` in a pass rate
/// of `baseline_rate` with a two-sided two-proportion z-test.
///
/// Invalid inputs never fail; they return the configured fallback size
/// with a note saying why.
pub fn minimum_sample_size(
    baseline_rate: f64,
    min_effect: f64,
    power: f64,
    alpha: f64,
    config: &StatsConfig,
) -> PowerAnalysisResult {
    let result = |n: u32, notes: String| PowerAnalysisResult {
        baseline_rate,
        min_detectable_effect: min_effect,
        recommended_sample_size: n,
        power,
        alpha,
        notes,
    };
    let fallback = config.fallback_sample_size;

    if !in_open_unit(baseline_rate) {
        return result(
            fallback,
            format!("Invalid baseline rate. Using minimum sample size of {fallback}."),
        );
    }
    if !in_open_unit(power) {
        return result(
            fallback,
            format!("Invalid power. Using minimum sample size of {fallback}."),
        );
    }
    if !in_open_unit(alpha) {
        return result(
            fallback,
            format!("Invalid alpha. Using minimum sample size of {fallback}."),
        );
    }
    if !min_effect.is_finite() {
        return result(
            fallback,
            format!("Invalid effect size. Using minimum sample size of {fallback}."),
        );
    }

    let p1 = baseline_rate;
    let p2 = (baseline_rate + min_effect).clamp(config.rate_floor, config.rate_ceiling);
    let denominator = (p1 - p2).powi(2);
    if denominator == 0.0 {
        return result(
            fallback,
            format!("Effect size is 0. Using minimum sample size of {fallback}."),
        );
    }

    let pooled = (p1 + p2) / 2.0;
    let z_alpha = normal_ppf(1.0 - alpha / 2.0);
    let z_power = normal_ppf(power);
    let numerator = (z_alpha * (2.0 * pooled * (1.0 - pooled)).sqrt()
        + z_power * (p1 * (1.0 - p1) + p2 * (1.0 - p2)).sqrt())
    .powi(2);

    let n = ((numerator / denominator).ceil() as u32).max(config.min_sample_size);
    result(
        n,
        format!(
            "Sample size provides {:.0}% power to detect {:.0}% change.",
            power * 100.0,
            min_effect * 100.0
        ),
    )
}
