//! Policy configuration for grading, statistics, and regression gating.
//!
//! Every numeric policy constant lives here so it can be overridden from a
//! TOML file or in tests. Each section is `#[serde(default)]`, so a file only
//! needs to name the values it changes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{Difficulty, EvalError, PricingTable, Result};

/// Pass thresholds indexed by task difficulty.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DifficultyThresholds {
    pub easy: f64,
    pub medium: f64,
    pub hard: f64,
}

impl Default for DifficultyThresholds {
    fn default() -> Self {
        Self {
            easy: 0.85,
            medium: 0.70,
            hard: 0.55,
        }
    }
}

impl DifficultyThresholds {
    pub fn for_difficulty(&self, difficulty: Difficulty) -> f64 {
        match difficulty {
            Difficulty::Easy => self.easy,
            Difficulty::Medium => self.medium,
            Difficulty::Hard => self.hard,
        }
    }
}

/// Grading policy: timeouts, partial-credit rates, thresholds, tool commands.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GradingConfig {
    pub test_timeout_secs: u64,
    pub command_timeout_secs: u64,
    pub lint_timeout_secs: u64,
    pub type_check_timeout_secs: u64,
    pub judge_timeout_secs: u64,

    /// Pass ratio at which `tests_pass` passes despite a non-zero exit.
    pub tests_pass_threshold: f64,
    pub lint_penalty_per_violation: f64,
    pub type_check_penalty_per_error: f64,
    /// Score at which lint and type-check grades pass.
    pub static_pass_threshold: f64,

    pub difficulty_thresholds: DifficultyThresholds,

    /// Score ceiling applied when the judge reports a regression.
    pub regression_score_cap: f64,
    /// Pass cut-off when the judge omits an explicit `passed` flag.
    pub judge_default_pass_score: f64,
    /// Scores used by the keyword fallback for unparseable judge replies.
    pub heuristic_pass_score: f64,
    pub heuristic_fail_score: f64,

    pub max_detail_chars: usize,
    pub max_content_chars: usize,
    pub snapshot_max_files: usize,
    pub snapshot_extensions: Vec<String>,

    pub default_test_command: String,
    pub lint_program: String,
    pub lint_args: Vec<String>,
    pub type_check_program: String,
    pub type_check_args: Vec<String>,
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            test_timeout_secs: 120,
            command_timeout_secs: 60,
            lint_timeout_secs: 60,
            type_check_timeout_secs: 120,
            judge_timeout_secs: 120,
            tests_pass_threshold: 0.8,
            lint_penalty_per_violation: 0.1,
            type_check_penalty_per_error: 0.05,
            static_pass_threshold: 0.7,
            difficulty_thresholds: DifficultyThresholds::default(),
            regression_score_cap: 0.5,
            judge_default_pass_score: 0.7,
            heuristic_pass_score: 0.7,
            heuristic_fail_score: 0.3,
            max_detail_chars: 2000,
            max_content_chars: 5000,
            snapshot_max_files: 10,
            snapshot_extensions: ["py", "js", "ts", "java", "go", "rs"]
                .into_iter()
                .map(String::from)
                .collect(),
            default_test_command: "pytest".to_string(),
            lint_program: "ruff".to_string(),
            lint_args: vec![
                "check".to_string(),
                "--output-format".to_string(),
                "json".to_string(),
            ],
            type_check_program: "mypy".to_string(),
            type_check_args: vec!["--no-error-summary".to_string()],
        }
    }
}

/// Statistical policy for comparisons, pass@k, and power analysis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StatsConfig {
    pub alpha: f64,
    /// Cohen's d cut-offs: below `negligible` is negligible, and so on.
    pub effect_negligible: f64,
    pub effect_small: f64,
    pub effect_medium: f64,
    /// Below this per-group size no test is attempted.
    pub min_samples: usize,
    /// Below this per-group size the recommendation asks for more data.
    pub reliable_samples: usize,
    /// Below this per-group size a null result suggests more samples.
    pub adequate_samples: usize,
    /// Percent change in tokens or duration worth reporting.
    pub efficiency_delta_pct: f64,
    pub pass_at_k: Vec<u32>,
    pub power: f64,
    pub fallback_sample_size: u32,
    pub min_sample_size: u32,
    pub rate_floor: f64,
    pub rate_ceiling: f64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            effect_negligible: 0.2,
            effect_small: 0.5,
            effect_medium: 0.8,
            min_samples: 2,
            reliable_samples: 5,
            adequate_samples: 10,
            efficiency_delta_pct: 10.0,
            pass_at_k: vec![1, 3, 5],
            power: 0.8,
            fallback_sample_size: 30,
            min_sample_size: 5,
            rate_floor: 0.01,
            rate_ceiling: 0.99,
        }
    }
}

/// CI gating policy for baseline-vs-current comparisons.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RegressionPolicy {
    /// Minimum absolute pass-rate change that counts.
    pub threshold: f64,
    pub require_significance: bool,
    pub include_model: bool,
}

impl Default for RegressionPolicy {
    fn default() -> Self {
        Self {
            threshold: 0.05,
            require_significance: true,
            include_model: true,
        }
    }
}

/// Complete evaluation configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EvalConfig {
    pub grading: GradingConfig,
    pub stats: StatsConfig,
    pub regression: RegressionPolicy,
    pub pricing: PricingTable,
}

impl EvalConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: EvalConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&raw)?;
        tracing::debug!(path = %path.display(), "loaded eval config");
        Ok(config)
    }

    /// Reject values that would make grading or statistics meaningless.
    pub fn validate(&self) -> Result<()> {
        let g = &self.grading;
        let s = &self.stats;

        let unit = [
            ("grading.tests_pass_threshold", g.tests_pass_threshold),
            ("grading.static_pass_threshold", g.static_pass_threshold),
            ("grading.regression_score_cap", g.regression_score_cap),
            ("grading.judge_default_pass_score", g.judge_default_pass_score),
            ("grading.heuristic_pass_score", g.heuristic_pass_score),
            ("grading.heuristic_fail_score", g.heuristic_fail_score),
            ("grading.difficulty_thresholds.easy", g.difficulty_thresholds.easy),
            ("grading.difficulty_thresholds.medium", g.difficulty_thresholds.medium),
            ("grading.difficulty_thresholds.hard", g.difficulty_thresholds.hard),
            ("regression.threshold", self.regression.threshold),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(EvalError::InvalidConfig(format!(
                    "{name} must be within [0, 1], got {value}"
                )));
            }
        }

        let open_unit = [
            ("stats.alpha", s.alpha),
            ("stats.power", s.power),
            ("stats.rate_floor", s.rate_floor),
            ("stats.rate_ceiling", s.rate_ceiling),
        ];
        for (name, value) in open_unit {
            if !(value > 0.0 && value < 1.0) {
                return Err(EvalError::InvalidConfig(format!(
                    "{name} must be within (0, 1), got {value}"
                )));
            }
        }
        if s.rate_floor >= s.rate_ceiling {
            return Err(EvalError::InvalidConfig(
                "stats.rate_floor must be below stats.rate_ceiling".to_string(),
            ));
        }

        for (name, value) in [
            ("grading.lint_penalty_per_violation", g.lint_penalty_per_violation),
            ("grading.type_check_penalty_per_error", g.type_check_penalty_per_error),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(EvalError::InvalidConfig(format!(
                    "{name} must be non-negative, got {value}"
                )));
            }
        }

        if !(s.effect_negligible <= s.effect_small && s.effect_small <= s.effect_medium) {
            return Err(EvalError::InvalidConfig(
                "stats effect cut-offs must be non-decreasing".to_string(),
            ));
        }
        if s.min_samples < 2 {
            return Err(EvalError::InvalidConfig(
                "stats.min_samples must be at least 2".to_string(),
            ));
        }
        if s.pass_at_k.iter().any(|k| *k == 0) {
            return Err(EvalError::InvalidConfig(
                "stats.pass_at_k values must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
