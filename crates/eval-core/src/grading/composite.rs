//! Composite grading: every assertion of a task against one run.
//!
//! Scoring weights are declared as string keys in `Task::scoring` and parsed
//! once into [`WeightSelector`]s. The most specific selector matching a grade
//! decides its weight:
//!
//! | key                 | selector  | matches                         |
//! |---------------------|-----------|---------------------------------|
//! | `code_1_tests_pass` | exact     | that assertion only             |
//! | `code_1`, `llm_0`   | position  | n-th assertion of that kind     |
//! | `tests_pass`        | check     | every check of that kind        |
//! | `code`, `llm`       | kind      | every assertion of that kind    |

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::Instrument;

use super::code::CodeGrader;
use super::environment::Environment;
use super::judge::{Judge, LlmGrader};
use crate::config::GradingConfig;
use crate::domain::{
    AssertionKind, CheckKind, ExecutionTrace, GradeResult, GradeTag, Task,
};
use crate::obs;

/// A parsed scoring-weight key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeightSelector {
    Kind(AssertionKind),
    Check(CheckKind),
    Position { kind: AssertionKind, index: usize },
    Exact(GradeTag),
}

impl WeightSelector {
    /// Parse a weight key, `None` if it names nothing a grade can carry.
    pub fn parse(key: &str) -> Option<Self> {
        let key = key.trim();
        let kind_of = |s: &str| match s {
            "code" => Some(AssertionKind::Code),
            "llm" => Some(AssertionKind::Llm),
            _ => None,
        };

        if let Some(kind) = kind_of(key) {
            return Some(WeightSelector::Kind(kind));
        }
        if let Some(check) = CheckKind::from_name(key) {
            return Some(WeightSelector::Check(check));
        }

        let (prefix, rest) = key.split_once('_')?;
        let kind = kind_of(prefix)?;
        let (index, check) = match rest.split_once('_') {
            Some((index, check)) => (index, Some(check)),
            None => (rest, None),
        };
        let index: usize = index.parse().ok()?;

        match (kind, check) {
            (_, None) => Some(WeightSelector::Position { kind, index }),
            (AssertionKind::Code, Some(check)) => {
                let check = CheckKind::from_name(check)?;
                Some(WeightSelector::Exact(GradeTag::code(index, check)))
            }
            (AssertionKind::Llm, Some(_)) => None,
        }
    }

    /// Higher is more specific.
    fn specificity(&self) -> u8 {
        match self {
            WeightSelector::Kind(_) => 0,
            WeightSelector::Check(_) => 1,
            WeightSelector::Position { .. } => 2,
            WeightSelector::Exact(_) => 3,
        }
    }

    pub fn matches(&self, tag: &GradeTag) -> bool {
        match self {
            WeightSelector::Kind(kind) => tag.kind == *kind,
            WeightSelector::Check(check) => tag.check == Some(*check),
            WeightSelector::Position { kind, index } => tag.kind == *kind && tag.index == *index,
            WeightSelector::Exact(exact) => exact == tag,
        }
    }
}

/// Weight selectors parsed from a task's scoring map.
#[derive(Debug, Clone, Default)]
pub struct WeightTable {
    entries: Vec<(WeightSelector, f64)>,
}

impl WeightTable {
    /// Parse every key; unrecognized keys are logged and dropped.
    pub fn from_scoring(scoring: &BTreeMap<String, f64>) -> Self {
        let entries = scoring
            .iter()
            .filter_map(|(key, weight)| match WeightSelector::parse(key) {
                Some(selector) => Some((selector, *weight)),
                None => {
                    tracing::warn!(key = %key, "ignoring unrecognized scoring weight key");
                    None
                }
            })
            .collect();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Weight of the most specific matching selector; 1.0 when nothing
    /// matches or the matched weight is not a positive finite number.
    pub fn weight_for(&self, tag: &GradeTag) -> f64 {
        self.entries
            .iter()
            .filter(|(selector, _)| selector.matches(tag))
            .max_by_key(|(selector, _)| selector.specificity())
            .map(|(_, weight)| *weight)
            .filter(|w| w.is_finite() && *w > 0.0)
            .unwrap_or(1.0)
    }

    /// Weighted mean of grade scores; 0.0 for no grades.
    pub fn weighted_score(&self, grades: &[GradeResult]) -> f64 {
        if grades.is_empty() {
            return 0.0;
        }
        let (sum, total) = grades.iter().fold((0.0, 0.0), |(sum, total), g| {
            let w = g.tag.as_ref().map_or(1.0, |tag| self.weight_for(tag));
            (sum + g.score * w, total + w)
        });
        if total > 0.0 {
            sum / total
        } else {
            0.0
        }
    }
}

/// Verdict for one run of one task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Grading {
    pub grades: Vec<GradeResult>,
    pub overall_score: f64,
    pub passed: bool,
    pub threshold: f64,
}

/// Pass if the weighted score meets the threshold, or if the task has code
/// checks and all of them passed.
pub fn verdict(grades: &[GradeResult], overall_score: f64, threshold: f64) -> bool {
    let mut code = grades.iter().filter(|g| g.is_code()).peekable();
    let has_code = code.peek().is_some();
    let all_code_passed = code.all(|g| g.passed);
    overall_score >= threshold || (has_code && all_code_passed)
}

/// Runs code checks and rubric judging, then combines the grades.
#[derive(Clone)]
pub struct CompositeGrader {
    code: CodeGrader,
    llm: Option<LlmGrader>,
    config: GradingConfig,
}

impl CompositeGrader {
    /// A grader without a judge; LLM assertions grade as failures.
    pub fn new(config: GradingConfig) -> Self {
        Self {
            code: CodeGrader::new(config.clone()),
            llm: None,
            config,
        }
    }

    pub fn with_judge(mut self, judge: Arc<dyn Judge>) -> Self {
        self.llm = Some(LlmGrader::new(judge, self.config.clone()));
        self
    }

    /// `task.pass_threshold` if set, else the difficulty default.
    pub fn threshold_for(&self, task: &Task) -> f64 {
        task.pass_threshold.unwrap_or_else(|| {
            self.config
                .difficulty_thresholds
                .for_difficulty(task.difficulty)
        })
    }

    /// Grade every assertion of `task` against one run.
    pub async fn grade(
        &self,
        task: &Task,
        trace: &ExecutionTrace,
        env: &dyn Environment,
    ) -> Grading {
        self.grade_inner(task, trace, env)
            .instrument(obs::grade_span(&task.id))
            .await
    }

    async fn grade_inner(
        &self,
        task: &Task,
        trace: &ExecutionTrace,
        env: &dyn Environment,
    ) -> Grading {
        let mut grades = Vec::with_capacity(task.assertions.len());

        for (index, check) in task.code_checks().enumerate() {
            let grade = self.code.grade(check, env).await;
            grades.push(grade.tagged(GradeTag::code(index, check.kind())));
        }

        for (index, assertion) in task.llm_assertions().enumerate() {
            let grade = match &self.llm {
                Some(llm) => llm.grade(assertion, task, trace, env).await,
                None => {
                    let grade = GradeResult::llm(false, 0.0, "LLM grading failed: no judge configured");
                    obs::emit_grade_degraded(&grade.assertion_name, &grade.details);
                    grade
                }
            };
            grades.push(grade.tagged(GradeTag::llm(index)));
        }

        let weights = WeightTable::from_scoring(&task.scoring);
        let overall_score = weights.weighted_score(&grades);
        let threshold = self.threshold_for(task);
        let passed = verdict(&grades, overall_score, threshold);

        tracing::debug!(
            grades = grades.len(),
            overall_score,
            threshold,
            passed,
            "task graded"
        );

        Grading {
            grades,
            overall_score,
            passed,
            threshold,
        }
    }
}
