//! Per-group summary metrics over repeated trials.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::StatsConfig;
use crate::domain::{CostMetrics, EvalResult, PricingTable, ResultKey};
use crate::stats::{calculate_stability, pass_at_k_unbiased, StabilityMetrics};

/// Summary of one group of trials.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AggregatedMetrics {
    pub total_runs: usize,
    pub passed: usize,
    pub failed: usize,
    pub pass_rate: f64,
    pub avg_score: f64,
    /// Mean of input plus output tokens, truncated.
    pub avg_tokens: u64,
    /// Mean wall-clock seconds.
    pub avg_duration: f64,
    /// Mean USD cost derived from token usage.
    pub avg_cost: f64,
    /// k to pass@k.
    pub pass_at_k: BTreeMap<u32, f64>,
    pub stability: StabilityMetrics,
}

/// Aggregate a group of results. An empty group yields all zeros.
pub fn aggregate(
    results: &[EvalResult],
    pricing: &PricingTable,
    config: &StatsConfig,
) -> AggregatedMetrics {
    let total = results.len();
    if total == 0 {
        return AggregatedMetrics {
            pass_at_k: config.pass_at_k.iter().map(|&k| (k, 0.0)).collect(),
            ..AggregatedMetrics::default()
        };
    }

    let n = total as f64;
    let passed = results.iter().filter(|r| r.passed).count();
    let total_tokens: u64 = results.iter().map(|r| r.trace.usage.total_tokens()).sum();
    let total_duration: f64 = results.iter().map(|r| r.trace.duration_seconds).sum();
    let total_cost: f64 = results
        .iter()
        .map(|r| CostMetrics::from_usage(&r.trace.usage, &pricing.for_model(&r.model)).total_cost_usd)
        .sum();

    AggregatedMetrics {
        total_runs: total,
        passed,
        failed: total - passed,
        pass_rate: passed as f64 / n,
        avg_score: results.iter().map(|r| r.overall_score).sum::<f64>() / n,
        avg_tokens: total_tokens / total as u64,
        avg_duration: total_duration / n,
        avg_cost: total_cost / n,
        pass_at_k: config
            .pass_at_k
            .iter()
            .map(|&k| (k, pass_at_k_unbiased(results, k as usize)))
            .collect(),
        stability: calculate_stability(results),
    }
}

/// Group results by (task, config[, model]) in key order.
pub fn group_results(
    results: &[EvalResult],
    include_model: bool,
) -> BTreeMap<ResultKey, Vec<EvalResult>> {
    let mut grouped: BTreeMap<ResultKey, Vec<EvalResult>> = BTreeMap::new();
    for result in results {
        grouped
            .entry(result.key(include_model))
            .or_default()
            .push(result.clone());
    }
    grouped
}

/// Aggregate every group.
pub fn aggregate_groups(
    groups: &BTreeMap<ResultKey, Vec<EvalResult>>,
    pricing: &PricingTable,
    config: &StatsConfig,
) -> BTreeMap<ResultKey, AggregatedMetrics> {
    groups
        .iter()
        .map(|(key, results)| (key.clone(), aggregate(results, pricing, config)))
        .collect()
}
