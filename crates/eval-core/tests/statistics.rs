//! Statistical properties of comparison, pass@k, stability and power analysis.

mod common;

use common::{result, results};
use eval_core::stats::{mann_whitney_u, UMethod};
use eval_core::{
    calculate_stability, compare_configs, compare_efficiency, minimum_sample_size,
    pass_at_k_unbiased, CostMetrics, EffectMagnitude, EvalResult, ModelPricing, PricingTable,
    StatsConfig, TokenUsage,
};

fn with_scores(scores: &[f64]) -> Vec<EvalResult> {
    scores
        .iter()
        .map(|&s| result("t", "c", s >= 0.7, s))
        .collect()
}

#[test]
fn cost_is_linear_and_additive() {
    let pricing = ModelPricing::default();
    for (input, output) in [(0, 0), (1, 0), (0, 1), (12_345, 6_789), (2_000_000, 1_000_000)] {
        let usage = TokenUsage::new(input, output);
        let cost = CostMetrics::from_usage(&usage, &pricing);
        assert!(cost.input_cost_usd >= 0.0 && cost.output_cost_usd >= 0.0);
        assert!((cost.total_cost_usd - (cost.input_cost_usd + cost.output_cost_usd)).abs() < 1e-12);

        let doubled = CostMetrics::from_usage(&TokenUsage::new(input * 2, output * 2), &pricing);
        assert!((doubled.total_cost_usd - 2.0 * cost.total_cost_usd).abs() < 1e-9);
    }
}

#[test]
fn pass_at_k_saturates_at_the_extremes() {
    let all = results("t", "c", true, 1.0, 6);
    let none = results("t", "c", false, 0.0, 6);
    for k in 1..=6 {
        assert_eq!(pass_at_k_unbiased(&all, k), 1.0);
        assert_eq!(pass_at_k_unbiased(&none, k), 0.0);
    }
    assert_eq!(pass_at_k_unbiased(&[], 3), 0.0);
}

#[test]
fn pass_at_k_grows_with_k() {
    let mut half = results("t", "c", true, 1.0, 5);
    half.extend(results("t", "c", false, 0.0, 5));

    let p1 = pass_at_k_unbiased(&half, 1);
    let p5 = pass_at_k_unbiased(&half, 5);
    assert!((p1 - 0.5).abs() < 1e-12);
    assert!(p5 > p1);
}

#[test]
fn identical_samples_are_not_significant() {
    let a = results("t", "c", true, 0.8, 10);
    let b = results("t", "c", true, 0.8, 10);
    let cmp = compare_configs(&a, &b, &StatsConfig::default());
    assert!(cmp.delta.abs() < 1e-12);
    assert!(!cmp.is_significant);
    assert_eq!(cmp.p_value, 1.0);
}

#[test]
fn separated_samples_are_significant_and_large() {
    let low: Vec<f64> = (0..20).map(|i| if i % 2 == 0 { 0.25 } else { 0.35 }).collect();
    let high: Vec<f64> = (0..20).map(|i| if i % 2 == 0 { 0.85 } else { 0.95 }).collect();
    let cmp = compare_configs(&with_scores(&low), &with_scores(&high), &StatsConfig::default());

    assert!(cmp.is_significant);
    assert!(cmp.p_value < 0.001);
    assert_eq!(cmp.effect_magnitude, EffectMagnitude::Large);
    assert!(cmp.delta > 0.5);
    assert!(cmp.recommendation.contains("improvement"));
}

#[test]
fn strongly_separated_constant_groups_are_large() {
    let cmp = compare_configs(
        &results("t", "c", false, 0.3, 20),
        &results("t", "c", true, 0.9, 20),
        &StatsConfig::default(),
    );
    assert!(cmp.is_significant);
    assert_eq!(cmp.effect_magnitude, EffectMagnitude::Large);
    assert!(cmp.delta > 0.5);
}

#[test]
fn tiny_groups_are_insufficient() {
    for (a, b) in [(1, 10), (10, 1), (0, 0)] {
        let cmp = compare_configs(
            &results("t", "c", true, 0.9, a),
            &results("t", "c", false, 0.1, b),
            &StatsConfig::default(),
        );
        assert!(!cmp.is_significant);
        assert!(cmp.recommendation.to_lowercase().contains("insufficient"));
    }
}

#[test]
fn small_samples_use_the_exact_distribution() {
    let u = mann_whitney_u(&[1.0, 2.0, 3.0, 4.0], &[5.0, 6.0, 7.0, 8.0]);
    assert_eq!(u.method, UMethod::Exact);
    assert_eq!(u.u, 0.0);
    // two-sided: 2 / C(8, 4)
    assert!((u.p_value - 2.0 / 70.0).abs() < 1e-12);

    let tied = mann_whitney_u(&[0.9; 10], &[0.5; 10]);
    assert_eq!(tied.method, UMethod::Asymptotic);
    assert!(tied.p_value < 0.001);
}

#[test]
fn efficiency_flags_large_token_growth() {
    let a = results("t", "c", true, 1.0, 6);
    let mut b = results("t", "c", true, 1.0, 6);
    for (i, r) in b.iter_mut().enumerate() {
        r.trace.usage = TokenUsage::new(4_000 + i as u64, 1_000);
    }
    let eff = compare_efficiency(&a, &b, &PricingTable::default(), &StatsConfig::default());

    assert!(eff.tokens_delta_pct > 90.0);
    assert!(eff.cost_delta > 0.0);
    assert!(eff.tokens_p_value.is_some_and(|p| p < 0.01));
    assert!(eff.recommendation.contains("**"));
}

#[test]
fn power_needs_more_runs_for_smaller_effects() {
    let cfg = StatsConfig::default();
    let big = minimum_sample_size(0.7, 0.2, 0.8, 0.05, &cfg);
    let small = minimum_sample_size(0.7, 0.05, 0.8, 0.05, &cfg);
    assert!(big.recommended_sample_size < small.recommended_sample_size);

    let invalid = minimum_sample_size(1.5, 0.1, 0.8, 0.05, &cfg);
    assert_eq!(invalid.recommended_sample_size, 30);
    assert!(invalid.notes.contains("Invalid"));
}

#[test]
fn stability_of_constant_and_varying_samples() {
    let constant = calculate_stability(&results("t", "c", true, 0.75, 8));
    assert_eq!(constant.variance, 0.0);
    assert_eq!(constant.coefficient_of_variation, 0.0);

    let varying = calculate_stability(&with_scores(&[0.2, 0.4, 0.6, 0.8, 1.0]));
    assert!((varying.score_range - 0.8).abs() < 1e-12);
    assert!(varying.variance > 0.0);
}
