//! Regression gate: compare a current run against a stored baseline.
//!
//! Both sides are grouped by (task, config[, model]). A group regresses when
//! its pass rate drops by more than the policy threshold and, when the policy
//! requires it and both sides have runs, the score comparison is
//! statistically significant.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::aggregate::group_results;
use crate::config::{RegressionPolicy, StatsConfig};
use crate::domain::{EvalResult, ResultKey};
use crate::obs;
use crate::stats::{compare_configs, ComparisonResult};

/// Verdict for one group.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GroupStatus {
    Regression,
    Improvement,
    Unchanged,
}

impl GroupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupStatus::Regression => "regression",
            GroupStatus::Improvement => "improvement",
            GroupStatus::Unchanged => "unchanged",
        }
    }
}

impl fmt::Display for GroupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Baseline versus current for one group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GroupComparison {
    pub key: ResultKey,
    pub baseline_runs: usize,
    pub current_runs: usize,
    /// 0 when the side has no runs.
    pub baseline_pass_rate: f64,
    pub current_pass_rate: f64,
    /// `current_pass_rate - baseline_pass_rate`.
    pub delta: f64,
    /// Percent change of mean tokens; `None` without a positive baseline.
    pub tokens_delta_pct: Option<f64>,
    /// Percent change of mean duration; `None` without a positive baseline.
    pub duration_delta_pct: Option<f64>,
    /// Present only when both sides have runs.
    pub comparison: Option<ComparisonResult>,
    pub status: GroupStatus,
}

impl GroupComparison {
    pub fn p_value(&self) -> Option<f64> {
        self.comparison.as_ref().map(|c| c.p_value)
    }

    pub fn is_significant(&self) -> bool {
        self.comparison.as_ref().is_some_and(|c| c.is_significant)
    }

    /// Tokens or duration grew by more than `limit_pct` percent.
    pub fn efficiency_regressed(&self, limit_pct: f64) -> bool {
        [self.tokens_delta_pct, self.duration_delta_pct]
            .into_iter()
            .flatten()
            .any(|pct| pct > limit_pct)
    }
}

/// Outcome of the regression gate.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RegressionReport {
    pub has_regression: bool,
    pub regression_count: usize,
    pub improvement_count: usize,
    /// Groups whose tokens or duration grew past the efficiency limit.
    pub efficiency_regression_count: usize,
    pub threshold: f64,
    pub require_significance: bool,
    /// Every group from either side, in key order.
    pub groups: Vec<GroupComparison>,
}

impl RegressionReport {
    pub fn regressions(&self) -> impl Iterator<Item = &GroupComparison> {
        self.groups
            .iter()
            .filter(|g| g.status == GroupStatus::Regression)
    }

    pub fn improvements(&self) -> impl Iterator<Item = &GroupComparison> {
        self.groups
            .iter()
            .filter(|g| g.status == GroupStatus::Improvement)
    }
}

struct SideSummary {
    runs: usize,
    pass_rate: f64,
    avg_tokens: f64,
    avg_duration: f64,
}

impl SideSummary {
    fn of(results: &[EvalResult]) -> Self {
        if results.is_empty() {
            return Self {
                runs: 0,
                pass_rate: 0.0,
                avg_tokens: 0.0,
                avg_duration: 0.0,
            };
        }
        let n = results.len() as f64;
        Self {
            runs: results.len(),
            pass_rate: results.iter().filter(|r| r.passed).count() as f64 / n,
            avg_tokens: results
                .iter()
                .map(|r| r.trace.usage.total_tokens() as f64)
                .sum::<f64>()
                / n,
            avg_duration: results.iter().map(|r| r.trace.duration_seconds).sum::<f64>() / n,
        }
    }
}

fn pct_change(before: f64, after: f64) -> Option<f64> {
    (before > 0.0).then(|| (after - before) / before * 100.0)
}

/// Gate `current` against `baseline`.
pub fn check_regression(
    baseline: &[EvalResult],
    current: &[EvalResult],
    policy: &RegressionPolicy,
    stats: &StatsConfig,
) -> RegressionReport {
    let baseline_groups = group_results(baseline, policy.include_model);
    let current_groups = group_results(current, policy.include_model);
    let keys: BTreeSet<&ResultKey> = baseline_groups.keys().chain(current_groups.keys()).collect();

    let mut groups = Vec::with_capacity(keys.len());
    for key in keys {
        let before = baseline_groups.get(key).map(Vec::as_slice).unwrap_or_default();
        let after = current_groups.get(key).map(Vec::as_slice).unwrap_or_default();
        let (b, c) = (SideSummary::of(before), SideSummary::of(after));
        let delta = c.pass_rate - b.pass_rate;

        let comparison = (!before.is_empty() && !after.is_empty()).then(|| {
            let cmp = compare_configs(before, after, stats);
            obs::emit_comparison_computed(
                &key.to_string(),
                cmp.p_value,
                cmp.effect_size,
                cmp.is_significant,
            );
            cmp
        });

        // A one-sided group has no test to pass, so only the delta counts.
        let significant = comparison.as_ref().map_or(true, |c| c.is_significant);
        let gate = |moved: bool| moved && (!policy.require_significance || significant);
        let status = if gate(delta < -policy.threshold) {
            GroupStatus::Regression
        } else if gate(delta > policy.threshold) {
            GroupStatus::Improvement
        } else {
            GroupStatus::Unchanged
        };

        groups.push(GroupComparison {
            key: key.clone(),
            baseline_runs: b.runs,
            current_runs: c.runs,
            baseline_pass_rate: b.pass_rate,
            current_pass_rate: c.pass_rate,
            delta,
            tokens_delta_pct: pct_change(b.avg_tokens, c.avg_tokens),
            duration_delta_pct: pct_change(b.avg_duration, c.avg_duration),
            comparison,
            status,
        });
    }

    let count = |status| groups.iter().filter(|g| g.status == status).count();
    let regression_count = count(GroupStatus::Regression);
    let improvement_count = count(GroupStatus::Improvement);
    let efficiency_regression_count = groups
        .iter()
        .filter(|g| g.efficiency_regressed(stats.efficiency_delta_pct))
        .count();
    let has_regression = regression_count > 0;

    obs::emit_regression_checked(groups.len(), regression_count, improvement_count, has_regression);

    RegressionReport {
        has_regression,
        regression_count,
        improvement_count,
        efficiency_regression_count,
        threshold: policy.threshold,
        require_significance: policy.require_significance,
        groups,
    }
}

/// Single-group gate on the mean score rather than the pass rate.
///
/// Returns the verdict with the comparison it was based on.
pub fn is_regression(
    baseline: &[EvalResult],
    current: &[EvalResult],
    policy: &RegressionPolicy,
    stats: &StatsConfig,
) -> (bool, ComparisonResult) {
    let comparison = compare_configs(baseline, current, stats);
    let regressed = comparison.delta < -policy.threshold
        && (!policy.require_significance || comparison.is_significant);
    (regressed, comparison)
}
