//! Regression gate over grouped baseline and current results.

mod common;

use common::results;
use eval_core::{
    check_regression, render_regression_md, GroupStatus, RegressionPolicy, StatsConfig,
};

fn policy(threshold: f64) -> RegressionPolicy {
    RegressionPolicy {
        threshold,
        ..RegressionPolicy::default()
    }
}

#[test]
fn drop_from_all_passing_to_all_failing_regresses() {
    let baseline = results("fix-auth", "default", true, 0.9, 10);
    let current = results("fix-auth", "default", false, 0.5, 10);

    let report = check_regression(&baseline, &current, &policy(0.1), &StatsConfig::default());
    assert!(report.has_regression);
    assert_eq!(report.regression_count, 1);

    let swapped = check_regression(&current, &baseline, &policy(0.1), &StatsConfig::default());
    assert!(!swapped.has_regression);
    assert_eq!(swapped.improvement_count, 1);
}

#[test]
fn unaffected_groups_stay_unchanged() {
    let mut baseline = results("fix-auth", "default", true, 0.9, 10);
    baseline.extend(results("add-docs", "default", true, 0.95, 10));
    let mut current = results("fix-auth", "default", false, 0.5, 10);
    current.extend(results("add-docs", "default", true, 0.95, 10));

    let report = check_regression(&baseline, &current, &policy(0.05), &StatsConfig::default());
    assert!(report.has_regression);
    assert_eq!(report.groups.len(), 2);

    let statuses: Vec<(String, GroupStatus)> = report
        .groups
        .iter()
        .map(|g| (g.key.task_id.clone(), g.status))
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("add-docs".to_string(), GroupStatus::Unchanged),
            ("fix-auth".to_string(), GroupStatus::Regression),
        ]
    );
    let docs = &report.groups[0];
    assert_eq!(docs.p_value(), Some(1.0));
    assert!(docs
        .comparison
        .as_ref()
        .is_some_and(|c| c.recommendation.contains("No significant difference")));
}

#[test]
fn model_can_be_left_out_of_the_key() {
    let baseline = results("t", "default", true, 0.9, 10);
    let mut current = results("t", "default", false, 0.5, 10);
    for r in &mut current {
        r.model = "haiku".to_string();
    }

    let by_model = check_regression(&baseline, &current, &policy(0.05), &StatsConfig::default());
    assert_eq!(by_model.groups.len(), 2);
    assert!(by_model.groups.iter().all(|g| g.comparison.is_none()));
    let statuses: Vec<GroupStatus> = by_model.groups.iter().map(|g| g.status).collect();
    assert_eq!(statuses, vec![GroupStatus::Unchanged, GroupStatus::Regression]);

    let pooled = RegressionPolicy {
        include_model: false,
        ..policy(0.05)
    };
    let report = check_regression(&baseline, &current, &pooled, &StatsConfig::default());
    assert_eq!(report.groups.len(), 1);
    assert!(report.groups[0].is_significant());
    assert!(report.has_regression);
}

#[test]
fn vanished_group_fails_the_gate() {
    let mut baseline = results("fix-auth", "default", true, 0.9, 10);
    baseline.extend(results("add-docs", "default", true, 0.95, 10));
    let current = results("fix-auth", "default", true, 0.9, 10);

    let report = check_regression(
        &baseline,
        &current,
        &RegressionPolicy::default(),
        &StatsConfig::default(),
    );
    assert!(report.has_regression);
    assert_eq!(report.regression_count, 1);

    let docs = &report.groups[0];
    assert_eq!(docs.key.task_id, "add-docs");
    assert_eq!(docs.current_runs, 0);
    assert!((docs.delta + 1.0).abs() < 1e-12);
    assert!(docs.comparison.is_none());
    assert_eq!(docs.status, GroupStatus::Regression);
    assert_eq!(report.groups[1].status, GroupStatus::Unchanged);
}

#[test]
fn report_renders_for_ci() {
    let report = check_regression(
        &results("fix-auth", "default", true, 0.9, 10),
        &results("fix-auth", "default", false, 0.5, 10),
        &policy(0.1),
        &StatsConfig::default(),
    );
    let md = render_regression_md(&report);
    assert!(md.contains("**Result:** FAIL"));
    assert!(md.contains("| fix-auth | default | sonnet | 100% | 0% | -100% |"));
    assert!(md.contains("## Regressions"));
}
