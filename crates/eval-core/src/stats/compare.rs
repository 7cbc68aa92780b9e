//! Comparing two groups of results: score significance and efficiency.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::mann_whitney::mann_whitney_u;
use super::{mean, sample_variance};
use crate::config::StatsConfig;
use crate::domain::{CostMetrics, EvalResult, PricingTable};

/// p-value below which an efficiency difference gets a double marker.
const STRONG_SIGNIFICANCE: f64 = 0.01;

/// Qualitative bucket of Cohen's d.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum EffectMagnitude {
    Negligible,
    Small,
    Medium,
    Large,
}

impl EffectMagnitude {
    pub fn classify(effect_size: f64, config: &StatsConfig) -> Self {
        if effect_size < config.effect_negligible {
            EffectMagnitude::Negligible
        } else if effect_size < config.effect_small {
            EffectMagnitude::Small
        } else if effect_size < config.effect_medium {
            EffectMagnitude::Medium
        } else {
            EffectMagnitude::Large
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EffectMagnitude::Negligible => "negligible",
            EffectMagnitude::Small => "small",
            EffectMagnitude::Medium => "medium",
            EffectMagnitude::Large => "large",
        }
    }
}

impl fmt::Display for EffectMagnitude {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Significance and effect size of B versus A.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComparisonResult {
    pub mean_a: f64,
    pub mean_b: f64,
    pub n_a: usize,
    pub n_b: usize,
    /// Mann-Whitney U for sample A.
    pub statistic: f64,
    pub p_value: f64,
    pub is_significant: bool,
    /// Cohen's d, always non-negative.
    pub effect_size: f64,
    pub effect_magnitude: EffectMagnitude,
    /// `mean_b - mean_a`.
    pub delta: f64,
    /// `delta / mean_a * 100`, or 0 when `mean_a` is not positive.
    pub relative_change: f64,
    pub recommendation: String,
}

/// |mean difference| over the pooled sample standard deviation; 0 when the
/// pooled deviation is 0.
pub fn cohens_d(a: &[f64], b: &[f64]) -> f64 {
    let (n_a, n_b) = (a.len() as f64, b.len() as f64);
    if n_a + n_b <= 2.0 {
        return 0.0;
    }
    let pooled_var =
        ((n_a - 1.0) * sample_variance(a) + (n_b - 1.0) * sample_variance(b)) / (n_a + n_b - 2.0);
    let pooled_std = pooled_var.sqrt();
    if pooled_std > 0.0 {
        (mean(b) - mean(a)).abs() / pooled_std
    } else {
        0.0
    }
}

/// Compare the overall scores of two result groups.
pub fn compare_configs(a: &[EvalResult], b: &[EvalResult], config: &StatsConfig) -> ComparisonResult {
    let scores_a: Vec<f64> = a.iter().map(|r| r.overall_score).collect();
    let scores_b: Vec<f64> = b.iter().map(|r| r.overall_score).collect();
    compare_scores(&scores_a, &scores_b, config)
}

/// Compare two score samples.
pub fn compare_scores(a: &[f64], b: &[f64], config: &StatsConfig) -> ComparisonResult {
    let (n_a, n_b) = (a.len(), b.len());
    let (mean_a, mean_b) = (mean(a), mean(b));
    let delta = mean_b - mean_a;

    if n_a < config.min_samples || n_b < config.min_samples {
        return ComparisonResult {
            mean_a,
            mean_b,
            n_a,
            n_b,
            statistic: 0.0,
            p_value: 1.0,
            is_significant: false,
            effect_size: 0.0,
            effect_magnitude: EffectMagnitude::Negligible,
            delta,
            relative_change: 0.0,
            recommendation: format!(
                "Insufficient samples for statistical comparison (need at least {} per group).",
                config.min_samples
            ),
        };
    }

    let test = mann_whitney_u(a, b);
    let effect_size = cohens_d(a, b);
    let effect_magnitude = EffectMagnitude::classify(effect_size, config);
    let is_significant = test.p_value < config.alpha;
    let relative_change = if mean_a > 0.0 {
        delta / mean_a * 100.0
    } else {
        0.0
    };

    let recommendation = recommend(
        delta,
        test.p_value,
        effect_magnitude,
        is_significant,
        n_a.min(n_b),
        config,
    );

    ComparisonResult {
        mean_a,
        mean_b,
        n_a,
        n_b,
        statistic: test.u,
        p_value: test.p_value,
        is_significant,
        effect_size,
        effect_magnitude,
        delta,
        relative_change,
        recommendation,
    }
}

fn recommend(
    delta: f64,
    p_value: f64,
    magnitude: EffectMagnitude,
    is_significant: bool,
    min_n: usize,
    config: &StatsConfig,
) -> String {
    if min_n < config.reliable_samples {
        return format!(
            "Sample size too small (n={min_n}). Collect at least {} runs per configuration \
             for reliable comparison.",
            config.reliable_samples
        );
    }

    if !is_significant {
        let tail = if min_n < config.adequate_samples {
            "Consider increasing sample size for more statistical power."
        } else {
            "The configurations appear equivalent."
        };
        return format!("No significant difference detected (p={p_value:.3}). {tail}");
    }

    let direction = if delta > 0.0 { "improvement" } else { "regression" };
    match magnitude {
        EffectMagnitude::Negligible => format!(
            "Statistically significant but negligible {direction} (p={p_value:.3}, d={magnitude}). \
             The practical difference is minimal."
        ),
        EffectMagnitude::Small => format!(
            "Statistically significant small {direction} (p={p_value:.3}, d={magnitude}). \
             Consider whether this is practically meaningful."
        ),
        EffectMagnitude::Medium => format!(
            "Significant medium {direction} detected (p={p_value:.3}, d={magnitude}). \
             This is a meaningful difference."
        ),
        EffectMagnitude::Large => format!(
            "Significant large {direction} detected (p={p_value:.3}, d={magnitude}). \
             This is a substantial difference."
        ),
    }
}

/// Token, duration, and cost comparison of B versus A.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EfficiencyComparison {
    pub tokens_a_mean: f64,
    pub tokens_b_mean: f64,
    pub tokens_delta: f64,
    pub tokens_delta_pct: f64,

    pub duration_a_mean: f64,
    pub duration_b_mean: f64,
    pub duration_delta: f64,
    pub duration_delta_pct: f64,

    pub cost_a_mean: f64,
    pub cost_b_mean: f64,
    pub cost_delta: f64,
    pub cost_delta_pct: f64,

    /// Rank test on token totals; `None` with fewer than the minimum samples.
    pub tokens_p_value: Option<f64>,
    pub duration_p_value: Option<f64>,

    pub recommendation: String,
}

fn percent_change(delta: f64, base: f64) -> f64 {
    if base > 0.0 {
        delta / base * 100.0
    } else {
        0.0
    }
}

/// Compare resource usage. Cost is derived from tokens, so it gets no test
/// of its own.
pub fn compare_efficiency(
    a: &[EvalResult],
    b: &[EvalResult],
    pricing: &PricingTable,
    config: &StatsConfig,
) -> EfficiencyComparison {
    let tokens = |rs: &[EvalResult]| -> Vec<f64> {
        rs.iter()
            .map(|r| r.trace.usage.total_tokens() as f64)
            .collect()
    };
    let durations = |rs: &[EvalResult]| -> Vec<f64> {
        rs.iter().map(|r| r.trace.duration_seconds).collect()
    };
    let costs = |rs: &[EvalResult]| -> Vec<f64> {
        rs.iter()
            .map(|r| CostMetrics::from_usage(&r.trace.usage, &pricing.for_model(&r.model)).total_cost_usd)
            .collect()
    };

    let (tokens_a, tokens_b) = (tokens(a), tokens(b));
    let (durations_a, durations_b) = (durations(a), durations(b));

    let tokens_a_mean = mean(&tokens_a);
    let tokens_b_mean = mean(&tokens_b);
    let duration_a_mean = mean(&durations_a);
    let duration_b_mean = mean(&durations_b);
    let cost_a_mean = mean(&costs(a));
    let cost_b_mean = mean(&costs(b));

    let tokens_delta = tokens_b_mean - tokens_a_mean;
    let duration_delta = duration_b_mean - duration_a_mean;
    let cost_delta = cost_b_mean - cost_a_mean;

    let enough = a.len() >= config.min_samples && b.len() >= config.min_samples;
    let (tokens_p_value, duration_p_value) = if enough {
        (
            Some(mann_whitney_u(&tokens_a, &tokens_b).p_value),
            Some(mann_whitney_u(&durations_a, &durations_b).p_value),
        )
    } else {
        (None, None)
    };

    let mut comparison = EfficiencyComparison {
        tokens_a_mean,
        tokens_b_mean,
        tokens_delta,
        tokens_delta_pct: percent_change(tokens_delta, tokens_a_mean),
        duration_a_mean,
        duration_b_mean,
        duration_delta,
        duration_delta_pct: percent_change(duration_delta, duration_a_mean),
        cost_a_mean,
        cost_b_mean,
        cost_delta,
        cost_delta_pct: percent_change(cost_delta, cost_a_mean),
        tokens_p_value,
        duration_p_value,
        recommendation: String::new(),
    };
    comparison.recommendation = efficiency_recommendation(&comparison, a.len().min(b.len()), config);
    comparison
}

fn significance_marker(p_value: Option<f64>, alpha: f64) -> &'static str {
    match p_value {
        Some(p) if p < STRONG_SIGNIFICANCE => "**",
        Some(p) if p < alpha => "*",
        _ => "",
    }
}

fn efficiency_recommendation(c: &EfficiencyComparison, min_n: usize, config: &StatsConfig) -> String {
    if min_n < config.min_samples {
        return format!(
            "Insufficient samples for efficiency comparison (need at least {} per group).",
            config.min_samples
        );
    }

    let cutoff = config.efficiency_delta_pct;
    let mut parts = Vec::new();
    let mut marked = false;

    if c.tokens_delta_pct.abs() > cutoff {
        let direction = if c.tokens_delta_pct < 0.0 { "fewer" } else { "more" };
        let marker = significance_marker(c.tokens_p_value, config.alpha);
        marked |= !marker.is_empty();
        parts.push(format!(
            "B uses {:.0}% {direction} tokens{marker}.",
            c.tokens_delta_pct.abs()
        ));
    }

    if c.duration_delta_pct.abs() > cutoff {
        let direction = if c.duration_delta_pct < 0.0 { "faster" } else { "slower" };
        let marker = significance_marker(c.duration_p_value, config.alpha);
        marked |= !marker.is_empty();
        parts.push(format!(
            "B is {:.0}% {direction}{marker}.",
            c.duration_delta_pct.abs()
        ));
    }

    if parts.is_empty() {
        return "No significant efficiency differences detected between configurations."
            .to_string();
    }

    if c.tokens_delta_pct < -cutoff && c.duration_delta_pct < -cutoff {
        parts.push("B is more efficient overall.".to_string());
    } else if c.tokens_delta_pct > cutoff && c.duration_delta_pct > cutoff {
        parts.push("B is less efficient overall.".to_string());
    }

    if marked {
        parts.push(format!("(* p<{}, ** p<{STRONG_SIGNIFICANCE})", config.alpha));
    }
    parts.join(" ")
}
