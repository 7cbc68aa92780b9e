//! Grade results for individual assertions.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::task::CheckKind;

/// Whether a grade came from an objective check or an LLM judge.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum AssertionKind {
    Code,
    Llm,
}

impl AssertionKind {
    pub fn name(&self) -> &'static str {
        match self {
            AssertionKind::Code => "code",
            AssertionKind::Llm => "llm",
        }
    }
}

impl fmt::Display for AssertionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Structured identity of a grade within its task.
///
/// `index` counts assertions of the same kind in declaration order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct GradeTag {
    pub kind: AssertionKind,
    pub index: usize,
    #[serde(default)]
    pub check: Option<CheckKind>,
}

impl GradeTag {
    pub fn code(index: usize, check: CheckKind) -> Self {
        Self {
            kind: AssertionKind::Code,
            index,
            check: Some(check),
        }
    }

    pub fn llm(index: usize) -> Self {
        Self {
            kind: AssertionKind::Llm,
            index,
            check: None,
        }
    }

    /// Stable id: `code_<index>_<check>` or `llm_<index>`.
    pub fn id(&self) -> String {
        match self.check {
            Some(check) => format!("{}_{}_{}", self.kind, self.index, check),
            None => format!("{}_{}", self.kind, self.index),
        }
    }
}

/// Score for a single rubric criterion.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CriterionScore {
    pub criterion: String,
    pub score: f64,
    #[serde(default)]
    pub reasoning: String,
}

impl CriterionScore {
    pub fn new(criterion: impl Into<String>, score: f64, reasoning: impl Into<String>) -> Self {
        Self {
            criterion: criterion.into(),
            score: clamp_unit(score),
            reasoning: reasoning.into(),
        }
    }
}

/// Outcome of grading one assertion against one run.
///
/// `score` is always within `[0, 1]`. `passed` is decided by the grader and
/// need not equal any threshold applied to `score`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GradeResult {
    #[serde(default)]
    pub assertion_id: String,
    pub assertion_type: AssertionKind,
    #[serde(default)]
    pub assertion_name: String,
    pub passed: bool,
    pub score: f64,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default)]
    pub full_output: Option<String>,
    #[serde(default)]
    pub criteria_scores: Vec<CriterionScore>,
    #[serde(default)]
    pub tag: Option<GradeTag>,
}

impl GradeResult {
    pub fn new(
        kind: AssertionKind,
        name: impl Into<String>,
        passed: bool,
        score: f64,
        details: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            assertion_id: name.clone(),
            assertion_type: kind,
            assertion_name: name,
            passed,
            score: clamp_unit(score),
            details: details.into(),
            reasoning: String::new(),
            full_output: None,
            criteria_scores: Vec::new(),
            tag: None,
        }
    }

    /// A code-check grade.
    pub fn code(check: CheckKind, passed: bool, score: f64, details: impl Into<String>) -> Self {
        Self::new(AssertionKind::Code, check.name(), passed, score, details)
    }

    /// A failing code-check grade with score 0.
    pub fn code_failure(check: CheckKind, details: impl Into<String>) -> Self {
        Self::code(check, false, 0.0, details)
    }

    /// An LLM-judged grade.
    pub fn llm(passed: bool, score: f64, details: impl Into<String>) -> Self {
        Self::new(AssertionKind::Llm, "llm_quality", passed, score, details)
    }

    pub fn with_full_output(mut self, output: impl Into<String>) -> Self {
        self.full_output = Some(output.into());
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = reasoning.into();
        self
    }

    pub fn with_criteria(mut self, criteria: Vec<CriterionScore>) -> Self {
        self.criteria_scores = criteria;
        self
    }

    /// Attach the structured tag and derive the id from it.
    pub fn tagged(mut self, tag: GradeTag) -> Self {
        self.assertion_id = tag.id();
        self.tag = Some(tag);
        self
    }

    pub fn is_code(&self) -> bool {
        self.assertion_type == AssertionKind::Code
    }
}

/// Clamp to `[0, 1]`, mapping NaN to 0.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_is_clamped() {
        assert_eq!(GradeResult::llm(true, 1.7, "").score, 1.0);
        assert_eq!(GradeResult::llm(false, -0.2, "").score, 0.0);
        assert_eq!(GradeResult::llm(false, f64::NAN, "").score, 0.0);
        assert_eq!(CriterionScore::new("c", 3.0, "").score, 1.0);
    }

    #[test]
    fn tag_ids_encode_position_and_kind() {
        assert_eq!(GradeTag::code(0, CheckKind::TestsPass).id(), "code_0_tests_pass");
        assert_eq!(GradeTag::llm(2).id(), "llm_2");
    }

    #[test]
    fn tagged_grade_takes_id_from_tag() {
        let grade = GradeResult::code(CheckKind::FileExists, true, 1.0, "File exists: a.py")
            .tagged(GradeTag::code(3, CheckKind::FileExists));
        assert_eq!(grade.assertion_id, "code_3_file_exists");
        assert_eq!(grade.assertion_name, "file_exists");
        assert!(grade.is_code());
    }
}
