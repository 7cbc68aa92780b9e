//! agent-eval - statistical analysis of coding-agent evaluation runs
//!
//! The `agent-eval` command works on persisted results documents.
//!
//! ## Commands
//!
//! - `regression`: gate current results against a baseline (exit 1 on regression)
//! - `compare`: significance, effect size and efficiency of B versus A
//! - `power`: runs per configuration needed to detect a pass-rate change
//! - `summary`: per-group aggregated metrics
//! - `validate-task`: check a task definition before running it

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use eval_core::aggregate::{aggregate_groups, group_results};
use eval_core::{
    check_regression, compare_configs, compare_efficiency, minimum_sample_size, read_results_json,
    render_regression_md, render_summary_md, ComparisonResult, EfficiencyComparison, EvalConfig,
    EvalError, EvalResult, RegressionReport, Task,
};

#[derive(Parser)]
#[command(name = "agent-eval")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Statistical analysis of coding-agent evaluations", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON: log lines on stderr and results on stdout
    #[arg(long, global = true)]
    json: bool,

    /// Evaluation config (TOML); defaults apply when omitted
    #[arg(long, global = true, env = "AGENT_EVAL_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compare current results against a baseline; exits 1 on regression
    Regression {
        /// Baseline results document
        #[arg(short, long)]
        baseline: PathBuf,

        /// Current results document
        #[arg(short, long)]
        current: PathBuf,

        /// Maximum acceptable pass-rate drop (overrides config)
        #[arg(short, long)]
        threshold: Option<f64>,

        /// Flag drops past the threshold even without statistical significance
        #[arg(long)]
        no_significance: bool,

        /// Pool all models of a task/config into one group
        #[arg(long)]
        pool_models: bool,

        /// Also write the report as Markdown
        #[arg(long)]
        markdown: Option<PathBuf>,
    },

    /// Compare two result sets side by side
    Compare {
        /// Results document for A
        a: PathBuf,

        /// Results document for B
        b: PathBuf,

        /// Only compare results of this task
        #[arg(short, long)]
        task: Option<String>,

        /// Label for A
        #[arg(long, default_value = "A")]
        label_a: String,

        /// Label for B
        #[arg(long, default_value = "B")]
        label_b: String,
    },

    /// Recommend a sample size per configuration
    Power {
        /// Current pass rate, in (0, 1)
        #[arg(long)]
        baseline_rate: f64,

        /// Smallest pass-rate change worth detecting
        #[arg(long, default_value = "0.1")]
        effect: f64,

        /// Desired statistical power (default from config)
        #[arg(long)]
        power: Option<f64>,

        /// Significance level (default from config)
        #[arg(long)]
        alpha: Option<f64>,
    },

    /// Summarize a results document per task/config/model
    Summary {
        /// Results document
        results: PathBuf,

        /// Pool all models of a task/config into one group
        #[arg(long)]
        pool_models: bool,

        /// Also write the summary as Markdown
        #[arg(long)]
        markdown: Option<PathBuf>,
    },

    /// Validate a task definition (JSON or TOML)
    ValidateTask {
        /// Task file
        task: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = eval_core::telemetry::level_for(cli.verbose);
    eval_core::telemetry::init_tracing(cli.json, level);

    match run(cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(cli.config.as_deref())?;
    let json = cli.json;

    match cli.command {
        Commands::Regression {
            baseline,
            current,
            threshold,
            no_significance,
            pool_models,
            markdown,
        } => {
            let mut config = config;
            if let Some(threshold) = threshold {
                config.regression.threshold = threshold;
            }
            if no_significance {
                config.regression.require_significance = false;
            }
            if pool_models {
                config.regression.include_model = false;
            }
            config.validate().context("invalid regression options")?;

            let report = cmd_regression(&config, &baseline, &current)?;
            print_regression(&report, json)?;
            if let Some(path) = markdown {
                eval_core::reporting::write_markdown(&path, &render_regression_md(&report))?;
            }
            Ok(if report.has_regression {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        Commands::Compare {
            a,
            b,
            task,
            label_a,
            label_b,
        } => {
            let comparison = cmd_compare(&config, &a, &b, task.as_deref())?;
            print_comparison(&comparison, &label_a, &label_b, json)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Power {
            baseline_rate,
            effect,
            power,
            alpha,
        } => {
            let result = minimum_sample_size(
                baseline_rate,
                effect,
                power.unwrap_or(config.stats.power),
                alpha.unwrap_or(config.stats.alpha),
                &config.stats,
            );
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("Recommended runs per configuration: {}", result.recommended_sample_size);
                println!("  baseline rate: {:.2}", result.baseline_rate);
                println!("  detectable effect: {:+.2}", result.min_detectable_effect);
                println!("  power: {:.2}, alpha: {:.3}", result.power, result.alpha);
                println!("  {}", result.notes);
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::Summary {
            results,
            pool_models,
            markdown,
        } => {
            let results = load_results(&results)?;
            let groups = aggregate_groups(
                &group_results(&results, !pool_models),
                &config.pricing,
                &config.stats,
            );
            let md = render_summary_md(&groups);
            if json {
                let rows: Vec<_> = groups
                    .iter()
                    .map(|(key, metrics)| serde_json::json!({ "key": key, "metrics": metrics }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&rows)?);
            } else {
                print!("{md}");
            }
            if let Some(path) = markdown {
                eval_core::reporting::write_markdown(&path, &md)?;
            }
            Ok(ExitCode::SUCCESS)
        }
        Commands::ValidateTask { task } => {
            let task = cmd_validate_task(&task)?;
            println!("Task '{}' is valid", task.id);
            println!("  Category: {:?}", task.category);
            println!("  Difficulty: {:?}", task.difficulty);
            println!("  Assertions: {}", task.assertions.len());
            println!("  Code assertions: {}", task.code_checks().count());
            println!("  LLM assertions: {}", task.llm_assertions().count());
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<EvalConfig> {
    match path {
        Some(path) => {
            EvalConfig::load(path).with_context(|| format!("Failed to load config {:?}", path))
        }
        None => Ok(EvalConfig::default()),
    }
}

fn load_results(path: &Path) -> Result<Vec<EvalResult>> {
    let results = read_results_json(path)?;
    info!(path = %path.display(), results = results.len(), "loaded results");
    Ok(results)
}

fn cmd_regression(config: &EvalConfig, baseline: &Path, current: &Path) -> Result<RegressionReport> {
    let baseline = load_results(baseline)?;
    let current = load_results(current)?;
    Ok(check_regression(
        &baseline,
        &current,
        &config.regression,
        &config.stats,
    ))
}

#[derive(Debug, Serialize)]
struct SideBySide {
    scores: ComparisonResult,
    efficiency: EfficiencyComparison,
}

fn cmd_compare(config: &EvalConfig, a: &Path, b: &Path, task: Option<&str>) -> Result<SideBySide> {
    let keep = |results: Vec<EvalResult>| -> Vec<EvalResult> {
        results
            .into_iter()
            .filter(|r| task.map_or(true, |t| r.task_id == t))
            .collect()
    };
    let a = keep(load_results(a)?);
    let b = keep(load_results(b)?);
    Ok(SideBySide {
        scores: compare_configs(&a, &b, &config.stats),
        efficiency: compare_efficiency(&a, &b, &config.pricing, &config.stats),
    })
}

fn cmd_validate_task(path: &Path) -> Result<Task> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read task file: {:?}", path))?;
    let task: Task = match path.extension().and_then(|e| e.to_str()) {
        Some("toml") => {
            toml::from_str(&raw).with_context(|| format!("Invalid TOML in {:?}", path))?
        }
        _ => serde_json::from_str(&raw).with_context(|| format!("Invalid JSON in {:?}", path))?,
    };
    task.validate().map_err(|source| EvalError::InvalidTask {
        task_id: task.id.clone(),
        source,
    })?;
    Ok(task)
}

fn print_regression(report: &RegressionReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!("REGRESSION COMPARISON");
    println!("{}", "=".repeat(60));
    for group in &report.groups {
        let rate = |runs: usize, rate: f64| {
            if runs == 0 {
                "N/A".to_string()
            } else {
                format!("{:.0}%", rate * 100.0)
            }
        };
        let stats = group
            .comparison
            .as_ref()
            .map(|c| format!("  p={:.4} effect={}", c.p_value, c.effect_magnitude))
            .unwrap_or_default();
        println!(
            "{:<40} {:>5} -> {:<5} {:>+5.0}%  {}{}",
            group.key.to_string(),
            rate(group.baseline_runs, group.baseline_pass_rate),
            rate(group.current_runs, group.current_pass_rate),
            group.delta * 100.0,
            group.status,
            stats,
        );
    }
    println!();

    if report.require_significance {
        println!("Using statistical significance testing");
    }
    if report.efficiency_regression_count > 0 {
        println!(
            "Efficiency regressions: {} group(s) grew in tokens or duration",
            report.efficiency_regression_count
        );
    }
    if report.has_regression {
        println!("REGRESSION DETECTED: {} group(s)", report.regression_count);
        for group in report.regressions() {
            println!("  - {}: {:+.0}%", group.key, group.delta * 100.0);
            if let Some(c) = &group.comparison {
                println!("    p-value: {:.4}, effect: {}", c.p_value, c.effect_magnitude);
            }
        }
    } else {
        println!("No regressions detected");
    }
    Ok(())
}

fn print_comparison(side: &SideBySide, label_a: &str, label_b: &str, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(side)?);
        return Ok(());
    }

    let c = &side.scores;
    let e = &side.efficiency;
    println!("STATISTICAL COMPARISON: {label_a} vs {label_b}");
    println!("{}", "=".repeat(60));
    println!("{:<12} {:>10} {:>10} {:>10}", "Metric", label_a, label_b, "Delta");
    println!(
        "{:<12} {:>10.3} {:>10.3} {:>+10.3}",
        "Mean score", c.mean_a, c.mean_b, c.delta
    );
    println!("{:<12} {:>10} {:>10}", "Samples", c.n_a, c.n_b);

    println!("\nStatistical test (Mann-Whitney U)");
    println!("  U-statistic: {:.2}", c.statistic);
    println!("  p-value: {:.4}", c.p_value);
    println!(
        "  Significant: {}",
        if c.is_significant { "Yes" } else { "No" }
    );

    println!("\nEffect size (Cohen's d)");
    println!("  Effect size: {:.3}", c.effect_size);
    println!("  Magnitude: {}", c.effect_magnitude);

    let p = |p: Option<f64>| p.map_or_else(|| "p=N/A".to_string(), |p| format!("p={p:.3}"));
    println!("\nEfficiency");
    println!(
        "  Tokens:   {:.0} -> {:.0} ({:+.1}%, {})",
        e.tokens_a_mean,
        e.tokens_b_mean,
        e.tokens_delta_pct,
        p(e.tokens_p_value)
    );
    println!(
        "  Duration: {:.1}s -> {:.1}s ({:+.1}%, {})",
        e.duration_a_mean,
        e.duration_b_mean,
        e.duration_delta_pct,
        p(e.duration_p_value)
    );
    println!(
        "  Cost:     ${:.4} -> ${:.4} ({:+.1}%)",
        e.cost_a_mean, e.cost_b_mean, e.cost_delta_pct
    );

    println!("\nRecommendation");
    println!("  {}", c.recommendation);
    println!("  {}", e.recommendation);
    Ok(())
}
