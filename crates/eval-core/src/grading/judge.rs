//! LLM-judged rubric grading.
//!
//! The transport is external: anything implementing [`Judge`] can score a
//! run. This module owns the prompt, the timeout, and the parsing of the
//! judge's structured reply into a [`GradeResult`].

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::environment::{Environment, SourceFile};
use super::truncate_chars;
use crate::config::GradingConfig;
use crate::domain::{CriterionScore, ExecutionTrace, GradeResult, JudgeError, LlmAssertion, Task};
use crate::obs;

/// Characters of an unparseable reply kept as reasoning.
const FALLBACK_REASONING_CHARS: usize = 500;
/// Changes listed in the details before the rest are counted.
const CHANGES_SHOWN: usize = 3;

/// An LLM that completes a grading prompt.
#[async_trait]
pub trait Judge: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String, JudgeError>;
}

const EVALUATION_RULES: &str = "\
EVALUATION RULES:
- Judge correctness and completeness, not length or verbosity.
- A short correct fix beats a verbose, over-engineered one.
- Ignore formatting differences that do not change behavior.
- Do not favor a solution because it appears first.";

const OUTPUT_FORMAT: &str = r#"## Evaluation Steps
1. Identify the changes the assistant made, quoting the relevant code.
2. For each rubric criterion, quote the evidence, explain whether it is met,
   and score it from 0.0 to 1.0.
3. Check that no existing behavior was broken.
4. Combine the criterion scores into an overall score.

## Output Format
Return only JSON of this shape:
{
  "step1_changes": ["description of a change"],
  "criteria_scores": [
    {"criterion": "...", "evidence": "...", "score": 0.0, "reasoning": "..."}
  ],
  "regression_check": {"passed": true, "notes": "..."},
  "overall_score": 0.0,
  "overall_reasoning": "...",
  "passed": true
}"#;

/// Build the grading prompt for one rubric.
pub fn build_prompt(
    task: &Task,
    assertion: &LlmAssertion,
    trace: &ExecutionTrace,
    files: &[SourceFile],
) -> String {
    let mut prompt = String::new();
    let _ = writeln!(prompt, "You are evaluating an AI coding assistant's work on a task.\n");
    let _ = writeln!(prompt, "{EVALUATION_RULES}\n");
    let _ = writeln!(prompt, "## Task Description\n{}\n", task.description);
    let _ = writeln!(prompt, "## Task Prompt Given to the Assistant\n{}\n", task.prompt);
    let _ = writeln!(prompt, "## Evaluation Rubric\n{}\n", assertion.rubric);

    if assertion.has_calibration() {
        let _ = writeln!(prompt, "## Calibration Examples");
        let anchors = [
            ("PASSING example (score 0.9-1.0)", &assertion.passing_example),
            ("FAILING example (score 0.0-0.3)", &assertion.failing_example),
            ("BORDERLINE example (score 0.5-0.6)", &assertion.borderline_example),
        ];
        for (label, example) in anchors {
            if let Some(example) = example {
                let _ = writeln!(prompt, "### {label}\n{example}\n");
            }
        }
    }

    let _ = writeln!(prompt, "## Assistant's Output\n{}\n", trace.result);
    let _ = writeln!(prompt, "## Final Code State\n{}\n", render_files(files));
    prompt.push_str(OUTPUT_FORMAT);
    prompt
}

fn render_files(files: &[SourceFile]) -> String {
    if files.is_empty() {
        return "(No source files found)".to_string();
    }
    files
        .iter()
        .map(|f| format!("### {}\n```\n{}\n```", f.path, f.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[derive(Debug, Deserialize)]
struct JudgeReply {
    #[serde(default)]
    overall_score: f64,
    #[serde(default)]
    passed: Option<bool>,
    #[serde(default)]
    overall_reasoning: String,
    #[serde(default)]
    criteria_scores: Vec<JudgeCriterion>,
    #[serde(default)]
    step1_changes: Vec<String>,
    #[serde(default)]
    regression_check: Option<RegressionCheck>,
}

#[derive(Debug, Deserialize)]
struct JudgeCriterion {
    #[serde(default = "unknown_criterion")]
    criterion: String,
    #[serde(default)]
    evidence: String,
    #[serde(default)]
    score: f64,
    #[serde(default)]
    reasoning: String,
}

fn unknown_criterion() -> String {
    "unknown".to_string()
}

#[derive(Debug, Deserialize)]
struct RegressionCheck {
    #[serde(default = "default_true")]
    passed: bool,
    #[serde(default)]
    notes: String,
}

fn default_true() -> bool {
    true
}

/// Body of the first fenced block if the reply starts with a fence.
fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    if !text.starts_with("```") {
        return text;
    }
    let Some(open_end) = text.find('\n') else {
        return "";
    };
    let body = &text[open_end + 1..];
    let close = std::iter::once(0)
        .chain(body.match_indices('\n').map(|(i, _)| i + 1))
        .find(|&start| body[start..].starts_with("```"));
    match close {
        Some(end) => body[..end].trim_end(),
        None => body,
    }
}

/// Turn a judge reply into a grade.
///
/// Malformed JSON falls back to a keyword check: a reply mentioning
/// "passed" or "success" passes with `heuristic_pass_score`.
pub fn parse_judge_response(text: &str, config: &GradingConfig) -> GradeResult {
    let reply: JudgeReply = match serde_json::from_str(strip_code_fence(text)) {
        Ok(reply) => reply,
        Err(e) => {
            let lower = text.to_lowercase();
            let passed = lower.contains("passed") || lower.contains("success");
            let score = if passed {
                config.heuristic_pass_score
            } else {
                config.heuristic_fail_score
            };
            tracing::debug!(error = %e, "judge reply was not valid JSON, using keyword fallback");
            return GradeResult::llm(
                passed,
                score,
                format!("Could not parse structured response: {e}"),
            )
            .with_reasoning(truncate_chars(text, FALLBACK_REASONING_CHARS));
        }
    };

    let mut score = reply.overall_score;
    let mut passed = reply
        .passed
        .unwrap_or(score >= config.judge_default_pass_score);

    let mut details: Vec<String> = Vec::new();
    if !reply.step1_changes.is_empty() {
        let shown: Vec<&str> = reply
            .step1_changes
            .iter()
            .take(CHANGES_SHOWN)
            .map(String::as_str)
            .collect();
        let mut line = format!("Changes identified: {}", shown.join("; "));
        if reply.step1_changes.len() > CHANGES_SHOWN {
            line.push_str(&format!(
                " (+{} more)",
                reply.step1_changes.len() - CHANGES_SHOWN
            ));
        }
        details.push(line);
    }

    let mut criteria = Vec::with_capacity(reply.criteria_scores.len());
    for c in reply.criteria_scores {
        let reasoning = if c.evidence.is_empty() {
            details.push(format!("- {}: {:.2} - {}", c.criterion, c.score, c.reasoning));
            c.reasoning
        } else {
            details.push(format!(
                "- {}: {:.2}\n  Evidence: {}\n  Reasoning: {}",
                c.criterion, c.score, c.evidence, c.reasoning
            ));
            format!("{}\n{}", c.evidence, c.reasoning)
        };
        criteria.push(CriterionScore::new(c.criterion, c.score, reasoning));
    }

    if let Some(regression) = reply.regression_check {
        if !regression.passed {
            details.push(format!("REGRESSION WARNING: {}", regression.notes));
            score = score.min(config.regression_score_cap);
            passed = false;
        }
    }

    let details = if details.is_empty() {
        reply.overall_reasoning.clone()
    } else {
        details.join("\n")
    };

    GradeResult::llm(passed, score, details)
        .with_reasoning(reply.overall_reasoning)
        .with_criteria(criteria)
}

/// Grades [`LlmAssertion`]s through a [`Judge`].
#[derive(Clone)]
pub struct LlmGrader {
    judge: Arc<dyn Judge>,
    config: GradingConfig,
}

impl LlmGrader {
    pub fn new(judge: Arc<dyn Judge>, config: GradingConfig) -> Self {
        Self { judge, config }
    }

    /// Grade one rubric. Transport failures and timeouts become a failing grade.
    pub async fn grade(
        &self,
        assertion: &LlmAssertion,
        task: &Task,
        trace: &ExecutionTrace,
        env: &dyn Environment,
    ) -> GradeResult {
        let files = env
            .source_snapshot(&self.config.snapshot_extensions, self.config.snapshot_max_files)
            .await;
        let prompt = build_prompt(task, assertion, trace, &files);

        let timeout = Duration::from_secs(self.config.judge_timeout_secs);
        let reply = match tokio::time::timeout(timeout, self.judge.complete(&prompt)).await {
            Ok(reply) => reply,
            Err(_) => Err(JudgeError::Timeout(timeout)),
        };

        match reply {
            Ok(text) => parse_judge_response(&text, &self.config).with_full_output(text),
            Err(e) => {
                let grade = GradeResult::llm(false, 0.0, format!("LLM grading failed: {e}"))
                    .with_full_output(e.to_string());
                obs::emit_grade_degraded(&grade.assertion_name, &grade.details);
                grade
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TaskCategory;

    fn cfg() -> GradingConfig {
        GradingConfig::default()
    }

    #[test]
    fn parses_structured_reply() {
        let reply = r#"{
            "step1_changes": ["a", "b", "c", "d"],
            "criteria_scores": [
                {"criterion": "uses bcrypt", "evidence": "import bcrypt", "score": 0.9, "reasoning": "ok"},
                {"criterion": "minimal", "score": 1.4, "reasoning": "tiny"}
            ],
            "regression_check": {"passed": true, "notes": ""},
            "overall_score": 0.85,
            "overall_reasoning": "good fix"
        }"#;
        let grade = parse_judge_response(reply, &cfg());
        assert!(grade.passed, "0.85 >= default pass score");
        assert!((grade.score - 0.85).abs() < 1e-12);
        assert_eq!(grade.reasoning, "good fix");
        assert_eq!(grade.criteria_scores.len(), 2);
        assert_eq!(grade.criteria_scores[1].score, 1.0);
        assert_eq!(grade.criteria_scores[0].reasoning, "import bcrypt\nok");
        assert!(grade.details.starts_with("Changes identified: a; b; c (+1 more)"));
    }

    #[test]
    fn fenced_json_is_unwrapped() {
        let reply = "```json\n{\"overall_score\": 0.4, \"passed\": true}\n```\ntrailing";
        let grade = parse_judge_response(reply, &cfg());
        assert!(grade.passed, "explicit flag wins over score");
        assert!((grade.score - 0.4).abs() < 1e-12);
    }

    #[test]
    fn failed_regression_caps_score_and_fails() {
        let reply = r#"{"overall_score": 0.95, "passed": true,
            "regression_check": {"passed": false, "notes": "broke login"}}"#;
        let grade = parse_judge_response(reply, &cfg());
        assert!(!grade.passed);
        assert_eq!(grade.score, 0.5);
        assert!(grade.details.contains("REGRESSION WARNING: broke login"));
    }

    #[test]
    fn unparseable_reply_uses_keywords() {
        let grade = parse_judge_response("The change passed every check.", &cfg());
        assert!(grade.passed);
        assert_eq!(grade.score, 0.7);
        assert!(grade.details.starts_with("Could not parse structured response"));

        let grade = parse_judge_response("Nope.", &cfg());
        assert!(!grade.passed);
        assert_eq!(grade.score, 0.3);
    }

    #[test]
    fn out_of_range_overall_score_is_clamped() {
        let grade = parse_judge_response(r#"{"overall_score": 7}"#, &cfg());
        assert_eq!(grade.score, 1.0);
    }

    #[test]
    fn prompt_includes_rubric_calibration_and_files() {
        let task = Task::new("t", TaskCategory::Coding, "Fix the login bug")
            .with_description("Login accepts empty passwords");
        let mut assertion = LlmAssertion::new("Rejects empty passwords");
        assertion.failing_example = Some("no validation added".to_string());
        let trace = ExecutionTrace {
            result: "Added a check".to_string(),
            ..Default::default()
        };
        let files = vec![SourceFile {
            path: "src/auth.py".to_string(),
            content: "def login(): ...".to_string(),
        }];

        let prompt = build_prompt(&task, &assertion, &trace, &files);
        assert!(prompt.contains("Rejects empty passwords"));
        assert!(prompt.contains("FAILING example"));
        assert!(!prompt.contains("PASSING example"));
        assert!(prompt.contains("### src/auth.py"));
        assert!(prompt.contains("Added a check"));

        let empty = build_prompt(&task, &assertion, &trace, &[]);
        assert!(empty.contains("(No source files found)"));
    }

    #[test]
    fn fence_without_close_keeps_body() {
        assert_eq!(strip_code_fence("```\n{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  {\"a\":1}  "), "{\"a\":1}");
    }
}
