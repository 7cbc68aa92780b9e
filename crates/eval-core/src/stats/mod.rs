//! Statistics over groups of evaluation results.
//!
//! Everything here is synchronous and pure. Degenerate inputs (empty groups,
//! zero variance, invalid rates) take explicit branches and never error.

pub mod compare;
pub mod distribution;
pub mod mann_whitney;
pub mod pass_at_k;
pub mod power;
pub mod stability;

pub use compare::{
    cohens_d, compare_configs, compare_efficiency, compare_scores, ComparisonResult,
    EffectMagnitude, EfficiencyComparison,
};
pub use mann_whitney::{mann_whitney_u, MannWhitney, UMethod};
pub use pass_at_k::{pass_at_k_counts, pass_at_k_unbiased};
pub use power::{minimum_sample_size, PowerAnalysisResult};
pub use stability::{calculate_stability, stability_of, StabilityMetrics};

/// Arithmetic mean; 0 for an empty slice.
pub(crate) fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

/// Sample variance (ddof = 1); 0 for fewer than two values.
pub(crate) fn sample_variance(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64
}
