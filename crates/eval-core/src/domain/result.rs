//! Per-trial evaluation results.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::grade::GradeResult;
use super::trace::ExecutionTrace;

/// One graded (task, configuration, model, run-index) trial.
///
/// Created once after grading completes and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvalResult {
    pub task_id: String,
    pub config_name: String,
    pub model: String,
    pub run_index: u32,
    pub timestamp: DateTime<Utc>,
    pub trace: ExecutionTrace,
    #[serde(default)]
    pub grades: Vec<GradeResult>,
    #[serde(default)]
    pub overall_score: f64,
    #[serde(default)]
    pub passed: bool,
}

impl EvalResult {
    pub fn key(&self, include_model: bool) -> ResultKey {
        ResultKey {
            task_id: self.task_id.clone(),
            config_name: self.config_name.clone(),
            model: include_model.then(|| self.model.clone()),
        }
    }
}

/// Grouping key for comparisons: (task, config[, model]).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResultKey {
    pub task_id: String,
    pub config_name: String,
    #[serde(default)]
    pub model: Option<String>,
}

impl ResultKey {
    pub fn new(task_id: impl Into<String>, config_name: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            config_name: config_name.into(),
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

impl fmt::Display for ResultKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.model {
            Some(model) => write!(f, "{}/{}/{}", self.task_id, self.config_name, model),
            None => write!(f, "{}/{}", self.task_id, self.config_name),
        }
    }
}

/// A trial is either fully scored or excluded from statistics entirely.
#[derive(Debug, Clone, PartialEq)]
pub enum TrialOutcome {
    Scored(EvalResult),
    Aborted { key: ResultKey, run_index: u32, reason: String },
}

impl TrialOutcome {
    pub fn is_scored(&self) -> bool {
        matches!(self, TrialOutcome::Scored(_))
    }
}

/// Keep only fully scored trials, dropping aborted ones.
pub fn scored_results(outcomes: impl IntoIterator<Item = TrialOutcome>) -> Vec<EvalResult> {
    outcomes
        .into_iter()
        .filter_map(|o| match o {
            TrialOutcome::Scored(result) => Some(result),
            TrialOutcome::Aborted { key, run_index, reason } => {
                tracing::debug!(key = %key, run_index, reason = %reason, "excluding aborted trial");
                None
            }
        })
        .collect()
}
