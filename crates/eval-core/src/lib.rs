//! Evaluation core for coding agents.
//!
//! Grades agent runs against task assertions, aggregates repeated trials, and
//! decides with rank-based significance tests whether a change regressed.

pub mod aggregate;
pub mod config;
pub mod domain;
pub mod executor;
pub mod grading;
pub mod obs;
pub mod persistence;
pub mod regression;
pub mod reporting;
pub mod stats;
pub mod telemetry;

pub use aggregate::{aggregate, aggregate_groups, group_results, AggregatedMetrics};
pub use config::{DifficultyThresholds, EvalConfig, GradingConfig, RegressionPolicy, StatsConfig};
pub use domain::{
    scored_results, Assertion, CheckKind, CodeCheck, CostMetrics, Difficulty, EvalError,
    EvalResult, ExecutionTrace, GradeResult, LlmAssertion, ModelPricing, PricingTable, Result,
    ResultKey, RunConfig, Task, TaskCategory, TokenUsage, TrialOutcome,
};
pub use executor::{run_trial, Executor, Trial};
pub use grading::{CompositeGrader, Environment, Grading, Judge, LocalEnvironment};
pub use persistence::{read_results_json, write_results_json, ResultsDocument, ResultsSummary};
pub use regression::{check_regression, is_regression, GroupComparison, GroupStatus, RegressionReport};
pub use reporting::{render_regression_md, render_summary_md};
pub use stats::{
    calculate_stability, compare_configs, compare_efficiency, mann_whitney_u, minimum_sample_size,
    pass_at_k_unbiased, ComparisonResult, EffectMagnitude, EfficiencyComparison,
    PowerAnalysisResult, StabilityMetrics,
};
