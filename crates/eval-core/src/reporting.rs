//! Markdown rendering for CI comments and check output.
//!
//! Rendering is deterministic: groups appear in key order and numbers use
//! fixed precision, so the output can be diffed between runs.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::Path;

use anyhow::{Context, Result};

use crate::aggregate::AggregatedMetrics;
use crate::domain::ResultKey;
use crate::regression::{GroupComparison, RegressionReport};

fn percent(rate: f64) -> String {
    format!("{:.0}%", rate * 100.0)
}

fn signed_percent(rate: f64) -> String {
    format!("{:+.0}%", rate * 100.0)
}

fn delta_pct(pct: Option<f64>) -> String {
    pct.map_or_else(|| "N/A".to_string(), |p| format!("{p:+.0}%"))
}

fn model_cell(key: &ResultKey) -> &str {
    key.model.as_deref().unwrap_or("-")
}

fn comparison_row(out: &mut String, group: &GroupComparison) {
    let rate = |runs: usize, rate: f64| {
        if runs == 0 {
            "N/A".to_string()
        } else {
            percent(rate)
        }
    };
    let (p_value, effect) = match &group.comparison {
        Some(c) => (format!("{:.4}", c.p_value), c.effect_magnitude.to_string()),
        None => ("-".to_string(), "-".to_string()),
    };
    let _ = writeln!(
        out,
        "| {} | {} | {} | {} | {} | {} | {} | {} | {} | {} | {} |",
        group.key.task_id,
        group.key.config_name,
        model_cell(&group.key),
        rate(group.baseline_runs, group.baseline_pass_rate),
        rate(group.current_runs, group.current_pass_rate),
        signed_percent(group.delta),
        p_value,
        effect,
        delta_pct(group.tokens_delta_pct),
        delta_pct(group.duration_delta_pct),
        group.status,
    );
}

/// Render a regression report.
pub fn render_regression_md(report: &RegressionReport) -> String {
    let mut out = String::new();
    out.push_str("# Regression Check\n\n");
    let verdict = if report.has_regression { "FAIL" } else { "PASS" };
    let _ = writeln!(out, "**Result:** {verdict}\n");
    let _ = writeln!(
        out,
        "- threshold: {}\n- require significance: {}\n- groups: {}\n- regressions: {}\n- improvements: {}\n- efficiency regressions: {}\n",
        percent(report.threshold),
        report.require_significance,
        report.groups.len(),
        report.regression_count,
        report.improvement_count,
        report.efficiency_regression_count,
    );

    if !report.groups.is_empty() {
        out.push_str("| Task | Config | Model | Baseline | Current | Delta | p-value | Effect | Tok Δ | Dur Δ | Status |\n");
        out.push_str("|---|---|---|---|---|---|---|---|---|---|---|\n");
        for group in &report.groups {
            comparison_row(&mut out, group);
        }
        out.push('\n');
    }

    let regressions: Vec<&GroupComparison> = report.regressions().collect();
    if !regressions.is_empty() {
        out.push_str("## Regressions\n");
        for group in regressions {
            let _ = write!(out, "- `{}`: {}", group.key, signed_percent(group.delta));
            if let Some(c) = &group.comparison {
                let _ = write!(out, " (p={:.4}, {} effect) {}", c.p_value, c.effect_magnitude, c.recommendation);
            }
            out.push('\n');
        }
        out.push('\n');
    }

    if report.regression_count == 0 && report.improvement_count == 0 {
        out.push_str("No significant changes detected.\n");
    }
    out
}

/// Render per-group aggregated metrics.
pub fn render_summary_md(groups: &BTreeMap<ResultKey, AggregatedMetrics>) -> String {
    let mut out = String::new();
    out.push_str("# Evaluation Summary\n\n");
    if groups.is_empty() {
        out.push_str("No results.\n");
        return out;
    }

    let ks: Vec<u32> = groups
        .values()
        .flat_map(|m| m.pass_at_k.keys().copied())
        .collect::<std::collections::BTreeSet<_>>()
        .into_iter()
        .collect();

    out.push_str("| Task | Config | Model | Runs | Pass rate | Avg score |");
    for k in &ks {
        let _ = write!(out, " pass@{k} |");
    }
    out.push_str(" Std dev | Avg tokens | Avg duration | Avg cost |\n");
    out.push_str("|---|---|---|---|---|---|");
    for _ in &ks {
        out.push_str("---|");
    }
    out.push_str("---|---|---|---|\n");

    for (key, m) in groups {
        let _ = write!(
            out,
            "| {} | {} | {} | {} | {} | {:.2} |",
            key.task_id,
            key.config_name,
            model_cell(key),
            m.total_runs,
            percent(m.pass_rate),
            m.avg_score,
        );
        for k in &ks {
            match m.pass_at_k.get(k) {
                Some(p) => {
                    let _ = write!(out, " {} |", percent(*p));
                }
                None => out.push_str(" - |"),
            }
        }
        let _ = writeln!(
            out,
            " {:.3} | {} | {:.1}s | ${:.4} |",
            m.stability.std_dev, m.avg_tokens, m.avg_duration, m.avg_cost,
        );
    }

    let total_runs: usize = groups.values().map(|m| m.total_runs).sum();
    let passed: usize = groups.values().map(|m| m.passed).sum();
    let rate = if total_runs > 0 {
        passed as f64 / total_runs as f64
    } else {
        0.0
    };
    let _ = writeln!(out, "\n**Overall:** {passed}/{total_runs} passed ({})", percent(rate));
    out
}

/// Write rendered Markdown to `path`.
pub fn write_markdown(path: &Path, markdown: &str) -> Result<()> {
    std::fs::write(path, markdown).with_context(|| format!("write {:?}", path))?;
    Ok(())
}
