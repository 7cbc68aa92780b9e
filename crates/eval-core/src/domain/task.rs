//! Task and assertion definitions.
//!
//! Tasks are loaded once from declarative definitions and are immutable
//! afterwards. Assertion parameters are encoded in the variant shape, so a
//! `file_contains` check without a pattern cannot be deserialized at all.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::error::DeclarationError;

/// Category of an evaluation task.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskCategory {
    Coding,
    Refactoring,
    Exploration,
}

/// Difficulty level, used to pick the default pass threshold.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

/// Discriminant of a [`CodeCheck`], used in grade ids and weight keys.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    TestsPass,
    FileContains,
    FileExists,
    FileNotContains,
    CommandSucceeds,
    LintClean,
    TypeCheckClean,
}

impl CheckKind {
    pub const ALL: [CheckKind; 7] = [
        CheckKind::TestsPass,
        CheckKind::FileContains,
        CheckKind::FileExists,
        CheckKind::FileNotContains,
        CheckKind::CommandSucceeds,
        CheckKind::LintClean,
        CheckKind::TypeCheckClean,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            CheckKind::TestsPass => "tests_pass",
            CheckKind::FileContains => "file_contains",
            CheckKind::FileExists => "file_exists",
            CheckKind::FileNotContains => "file_not_contains",
            CheckKind::CommandSucceeds => "command_succeeds",
            CheckKind::LintClean => "lint_clean",
            CheckKind::TypeCheckClean => "type_check_clean",
        }
    }

    /// Parse a check name as written in task files and weight maps.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.name() == name)
    }
}

impl fmt::Display for CheckKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// An objective check against the evaluation environment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum CodeCheck {
    /// Run the test command; partial credit from the pass ratio.
    TestsPass {
        #[serde(default)]
        command: Option<String>,
    },
    /// Regex must match the file content.
    FileContains { file: String, pattern: String },
    /// File must exist.
    FileExists { file: String },
    /// Regex must not match the file content.
    FileNotContains { file: String, pattern: String },
    /// Command must exit with status 0.
    CommandSucceeds { command: String },
    /// Linter must report no violations; partial credit per violation.
    LintClean {
        #[serde(default)]
        config: Option<String>,
    },
    /// Type checker must report no errors; partial credit per error.
    TypeCheckClean {
        #[serde(default)]
        config: Option<String>,
    },
}

impl CodeCheck {
    pub fn kind(&self) -> CheckKind {
        match self {
            CodeCheck::TestsPass { .. } => CheckKind::TestsPass,
            CodeCheck::FileContains { .. } => CheckKind::FileContains,
            CodeCheck::FileExists { .. } => CheckKind::FileExists,
            CodeCheck::FileNotContains { .. } => CheckKind::FileNotContains,
            CodeCheck::CommandSucceeds { .. } => CheckKind::CommandSucceeds,
            CodeCheck::LintClean { .. } => CheckKind::LintClean,
            CodeCheck::TypeCheckClean { .. } => CheckKind::TypeCheckClean,
        }
    }

    /// Report the first required parameter that is present but blank.
    pub fn validate(&self) -> Result<(), DeclarationError> {
        let check = self.kind().name();
        let blank = |field: &'static str, value: &str| {
            if value.trim().is_empty() {
                Err(DeclarationError::MissingParameter { check, field })
            } else {
                Ok(())
            }
        };

        match self {
            CodeCheck::FileContains { file, pattern }
            | CodeCheck::FileNotContains { file, pattern } => {
                blank("file", file)?;
                blank("pattern", pattern)
            }
            CodeCheck::FileExists { file } => blank("file", file),
            CodeCheck::CommandSucceeds { command } => blank("command", command),
            CodeCheck::TestsPass { .. }
            | CodeCheck::LintClean { .. }
            | CodeCheck::TypeCheckClean { .. } => Ok(()),
        }
    }
}

/// A rubric judged by an LLM, with optional calibration anchors.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct LlmAssertion {
    pub rubric: String,
    #[serde(default)]
    pub passing_example: Option<String>,
    #[serde(default)]
    pub failing_example: Option<String>,
    #[serde(default)]
    pub borderline_example: Option<String>,
}

impl LlmAssertion {
    pub fn new(rubric: impl Into<String>) -> Self {
        Self {
            rubric: rubric.into(),
            ..Self::default()
        }
    }

    pub fn has_calibration(&self) -> bool {
        self.passing_example.is_some()
            || self.failing_example.is_some()
            || self.borderline_example.is_some()
    }
}

/// A single check applied to one run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Assertion {
    Code(CodeCheck),
    Llm(LlmAssertion),
}

/// Definition of an evaluation task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: String,
    pub category: TaskCategory,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub description: String,
    pub prompt: String,
    #[serde(default)]
    pub assertions: Vec<Assertion>,
    /// Weight selectors (see `grading::composite::WeightSelector`) to weights.
    #[serde(default)]
    pub scoring: BTreeMap<String, f64>,
    #[serde(default)]
    pub fixture_path: Option<PathBuf>,
    /// Overrides the difficulty-based threshold when set.
    #[serde(default)]
    pub pass_threshold: Option<f64>,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
}

fn default_timeout_seconds() -> u64 {
    300
}

impl Task {
    /// Create a task with no assertions and default scoring.
    pub fn new(id: impl Into<String>, category: TaskCategory, prompt: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            category,
            difficulty: Difficulty::default(),
            description: String::new(),
            prompt: prompt.into(),
            assertions: Vec::new(),
            scoring: BTreeMap::new(),
            fixture_path: None,
            pass_threshold: None,
            timeout_seconds: default_timeout_seconds(),
        }
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_assertion(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }

    pub fn with_weight(mut self, key: impl Into<String>, weight: f64) -> Self {
        self.scoring.insert(key.into(), weight);
        self
    }

    pub fn with_pass_threshold(mut self, threshold: f64) -> Self {
        self.pass_threshold = Some(threshold);
        self
    }

    /// Code checks in declaration order.
    pub fn code_checks(&self) -> impl Iterator<Item = &CodeCheck> {
        self.assertions.iter().filter_map(|a| match a {
            Assertion::Code(check) => Some(check),
            Assertion::Llm(_) => None,
        })
    }

    /// LLM assertions in declaration order.
    pub fn llm_assertions(&self) -> impl Iterator<Item = &LlmAssertion> {
        self.assertions.iter().filter_map(|a| match a {
            Assertion::Llm(llm) => Some(llm),
            Assertion::Code(_) => None,
        })
    }

    /// Check the declaration-time invariants the type system cannot express.
    pub fn validate(&self) -> Result<(), DeclarationError> {
        if self.id.trim().is_empty() {
            return Err(DeclarationError::EmptyTaskId);
        }
        if let Some(t) = self.pass_threshold {
            if !(0.0..=1.0).contains(&t) {
                return Err(DeclarationError::ThresholdOutOfRange(t));
            }
        }
        for (key, weight) in &self.scoring {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(DeclarationError::InvalidWeight {
                    key: key.clone(),
                    weight: *weight,
                });
            }
        }
        for check in self.code_checks() {
            check.validate()?;
        }
        for (index, llm) in self.llm_assertions().enumerate() {
            if llm.rubric.trim().is_empty() {
                return Err(DeclarationError::EmptyRubric { index });
            }
        }
        Ok(())
    }
}

/// A configuration variant under evaluation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Extra system-prompt material appended for this variant.
    #[serde(default)]
    pub prompt_addendum: Option<String>,
    pub model: String,
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,
    /// `None` means every tool is allowed.
    #[serde(default)]
    pub allowed_tools: Option<Vec<String>>,
}

fn default_max_turns() -> u32 {
    10
}

impl RunConfig {
    pub fn new(name: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            prompt_addendum: None,
            model: model.into(),
            max_turns: default_max_turns(),
            allowed_tools: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assertions_deserialize_from_tagged_json() {
        let raw = serde_json::json!([
            {"type": "code", "check": "file_contains", "file": "src/auth.py", "pattern": "bcrypt"},
            {"type": "code", "check": "tests_pass"},
            {"type": "llm", "rubric": "Fix is minimal", "passing_example": "one-line change"}
        ]);
        let assertions: Vec<Assertion> = serde_json::from_value(raw).expect("deserialize");

        assert_eq!(
            assertions[0],
            Assertion::Code(CodeCheck::FileContains {
                file: "src/auth.py".to_string(),
                pattern: "bcrypt".to_string(),
            })
        );
        assert_eq!(
            assertions[1],
            Assertion::Code(CodeCheck::TestsPass { command: None })
        );
        match &assertions[2] {
            Assertion::Llm(llm) => {
                assert_eq!(llm.rubric, "Fix is minimal");
                assert!(llm.has_calibration());
            }
            other => panic!("expected llm assertion, got {other:?}"),
        }
    }

    #[test]
    fn file_contains_without_pattern_is_rejected_at_load() {
        let raw = serde_json::json!({"type": "code", "check": "file_contains", "file": "a.py"});
        assert!(serde_json::from_value::<Assertion>(raw).is_err());
    }

    #[test]
    fn blank_parameters_fail_validation() {
        let task = Task::new("t1", TaskCategory::Coding, "fix it").with_assertion(
            Assertion::Code(CodeCheck::FileContains {
                file: "a.py".to_string(),
                pattern: "  ".to_string(),
            }),
        );
        assert_eq!(
            task.validate(),
            Err(DeclarationError::MissingParameter {
                check: "file_contains",
                field: "pattern",
            })
        );
    }

    #[test]
    fn validate_rejects_out_of_range_threshold_and_negative_weight() {
        let task = Task::new("t1", TaskCategory::Coding, "p").with_pass_threshold(1.2);
        assert!(matches!(
            task.validate(),
            Err(DeclarationError::ThresholdOutOfRange(_))
        ));

        let task = Task::new("t1", TaskCategory::Coding, "p").with_weight("code", -1.0);
        assert!(matches!(
            task.validate(),
            Err(DeclarationError::InvalidWeight { .. })
        ));
    }

    #[test]
    fn check_kind_names_round_trip() {
        for kind in CheckKind::ALL {
            assert_eq!(CheckKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(CheckKind::from_name("ruff_clean"), None);
    }

    #[test]
    fn task_defaults_apply_when_fields_missing() {
        let raw = serde_json::json!({"id": "t", "category": "coding", "prompt": "do it"});
        let task: Task = serde_json::from_value(raw).expect("deserialize");
        assert_eq!(task.difficulty, Difficulty::Medium);
        assert_eq!(task.timeout_seconds, 300);
        assert!(task.assertions.is_empty());
        assert!(task.pass_threshold.is_none());
    }
}
