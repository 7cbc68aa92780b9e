//! Structured observability hooks for evaluation lifecycle events.
//!
//! This module provides:
//! - Task-scoped tracing spans, either as the `GradeSpan` RAII guard for
//!   synchronous code or via [`grade_span`] for `Instrument`-ing futures
//! - Emission functions for key events: trial graded, comparison computed,
//!   regression checked, grade degraded
//!
//! Events are emitted at `info!` level except degraded grades, which warn.

use tracing::info;

use crate::domain::ResultKey;

/// RAII guard that enters a task-scoped span.
///
/// Not `Send`; inside async code use [`grade_span`] with `Instrument`.
///
/// # Example
///
/// ```ignore
/// let _span = GradeSpan::enter("fix-auth-bypass");
/// // tracing calls now carry task_id = "fix-auth-bypass"
/// ```
pub struct GradeSpan {
    _span: tracing::span::EnteredSpan,
}

impl GradeSpan {
    pub fn enter(task_id: &str) -> Self {
        Self {
            _span: grade_span(task_id).entered(),
        }
    }
}

/// The span used while grading one task.
pub fn grade_span(task_id: &str) -> tracing::Span {
    tracing::info_span!("eval.grade", task_id = %task_id)
}

/// Emit event: one trial finished grading.
pub fn emit_trial_graded(key: &ResultKey, run_index: u32, score: f64, passed: bool) {
    info!(
        event = "trial.graded",
        key = %key,
        run_index = run_index,
        score = score,
        passed = passed,
    );
}

/// Emit event: a statistical comparison between two groups.
pub fn emit_comparison_computed(label: &str, p_value: f64, effect_size: f64, significant: bool) {
    info!(
        event = "comparison.computed",
        label = %label,
        p_value = p_value,
        effect_size = effect_size,
        significant = significant,
    );
}

/// Emit event: regression gate evaluated.
pub fn emit_regression_checked(
    groups: usize,
    regressions: usize,
    improvements: usize,
    has_regression: bool,
) {
    info!(
        event = "regression.checked",
        groups = groups,
        regressions = regressions,
        improvements = improvements,
        has_regression = has_regression,
    );
}

/// Emit event: a grader hit an operational failure and scored zero (warning level).
pub fn emit_grade_degraded(assertion: &str, reason: &str) {
    tracing::warn!(event = "grade.degraded", assertion = %assertion, reason = %reason);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grade_span_enter_does_not_panic() {
        let _span = GradeSpan::enter("task-1");
        emit_grade_degraded("tests_pass", "timed out");
        emit_trial_graded(&ResultKey::new("t", "c"), 0, 0.5, false);
    }
}
