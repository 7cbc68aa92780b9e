//! Objective code checks.
//!
//! Each check produces exactly one [`GradeResult`]. Every failure mode (a
//! missing file, a bad regex, a timeout, a missing tool) is reported as a
//! failing grade with score 0 rather than an error.

use std::time::Duration;

use regex::Regex;

use super::environment::{CommandOutput, Environment, Invocation};
use super::static_analysis::{parse_lint_output, parse_type_check_output, penalized_score};
use super::test_output::parse_test_counts;
use super::truncate_chars;
use crate::config::GradingConfig;
use crate::domain::{CheckKind, CodeCheck, CommandError, GradeResult};
use crate::obs;

/// Grades [`CodeCheck`]s against an [`Environment`].
#[derive(Debug, Clone, Default)]
pub struct CodeGrader {
    config: GradingConfig,
}

impl CodeGrader {
    pub fn new(config: GradingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GradingConfig {
        &self.config
    }

    /// Grade one check. Never fails; problems become a failing grade.
    pub async fn grade(&self, check: &CodeCheck, env: &dyn Environment) -> GradeResult {
        if let Err(e) = check.validate() {
            return degraded(GradeResult::code_failure(check.kind(), e.to_string()));
        }

        match check {
            CodeCheck::TestsPass { command } => {
                let command = command
                    .as_deref()
                    .unwrap_or(&self.config.default_test_command);
                self.tests_pass(env, command).await
            }
            CodeCheck::FileContains { file, pattern } => {
                self.file_pattern(env, CheckKind::FileContains, file, pattern)
                    .await
            }
            CodeCheck::FileNotContains { file, pattern } => {
                self.file_pattern(env, CheckKind::FileNotContains, file, pattern)
                    .await
            }
            CodeCheck::FileExists { file } => self.file_exists(env, file).await,
            CodeCheck::CommandSucceeds { command } => self.command_succeeds(env, command).await,
            CodeCheck::LintClean { config } => self.lint_clean(env, config.as_deref()).await,
            CodeCheck::TypeCheckClean { config } => {
                self.type_check_clean(env, config.as_deref()).await
            }
        }
    }

    /// Run the test command; partial credit from the parsed pass ratio.
    pub async fn tests_pass(&self, env: &dyn Environment, command: &str) -> GradeResult {
        let kind = CheckKind::TestsPass;
        let timeout = Duration::from_secs(self.config.test_timeout_secs);

        let out = match env.run(&Invocation::shell(command), timeout).await {
            Ok(out) => out,
            Err(CommandError::Timeout(t)) => {
                return degraded(
                    GradeResult::code_failure(kind, "Test command timed out").with_full_output(
                        format!("Test command timed out after {} seconds", t.as_secs()),
                    ),
                )
            }
            Err(e) => {
                return degraded(
                    GradeResult::code_failure(kind, format!("Error running tests: {e}"))
                        .with_full_output(e.to_string()),
                )
            }
        };

        let full_output = out.combined();
        match parse_test_counts(&full_output) {
            Some(counts) => {
                let total = counts.total();
                let score = counts.pass_ratio().unwrap_or_default();
                let passed = out.success() || score >= self.config.tests_pass_threshold;

                let mut details = format!(
                    "{}/{} tests passed ({:.0}%)",
                    counts.passed,
                    total,
                    score * 100.0
                );
                if counts.errors > 0 {
                    details.push_str(&format!(", {} errors", counts.errors));
                }
                GradeResult::code(kind, passed, score, details).with_full_output(full_output)
            }
            None => {
                let passed = out.success();
                let raw = if passed {
                    out.stdout.clone()
                } else {
                    format!("{}\n{}", out.stdout, out.stderr)
                };
                let details = format!(
                    "could not parse test counts: {}",
                    truncate_chars(raw.trim(), self.config.max_detail_chars)
                );
                GradeResult::code(kind, passed, if passed { 1.0 } else { 0.0 }, details)
                    .with_full_output(full_output)
            }
        }
    }

    /// Regex search of a file; `file_contains` passes on a match and
    /// `file_not_contains` passes on no match.
    pub async fn file_pattern(
        &self,
        env: &dyn Environment,
        kind: CheckKind,
        file: &str,
        pattern: &str,
    ) -> GradeResult {
        let want_match = kind == CheckKind::FileContains;

        if !env.exists(file).await {
            return GradeResult::code_failure(kind, format!("File not found: {file}"))
                .with_full_output(format!("Expected file {file} does not exist"));
        }

        let re = match Regex::new(pattern) {
            Ok(re) => re,
            Err(e) => {
                return degraded(
                    GradeResult::code_failure(kind, format!("Invalid regex pattern: {e}"))
                        .with_full_output(e.to_string()),
                )
            }
        };

        let content = match env.read_to_string(file).await {
            Ok(content) => content,
            Err(e) => {
                return degraded(
                    GradeResult::code_failure(kind, format!("Error reading file: {e}"))
                        .with_full_output(e.to_string()),
                )
            }
        };

        let found = re.is_match(&content);
        let passed = found == want_match;
        let verdict = match (want_match, found) {
            (true, true) | (false, true) => "found",
            (true, false) => "not found",
            (false, false) => "absent",
        };

        GradeResult::code(
            kind,
            passed,
            if passed { 1.0 } else { 0.0 },
            format!("Pattern {verdict}: {pattern}"),
        )
        .with_full_output(truncate_chars(&content, self.config.max_content_chars))
    }

    pub async fn file_exists(&self, env: &dyn Environment, file: &str) -> GradeResult {
        let passed = env.exists(file).await;
        let verdict = if passed { "exists" } else { "not found" };
        GradeResult::code(
            CheckKind::FileExists,
            passed,
            if passed { 1.0 } else { 0.0 },
            format!("File {verdict}: {file}"),
        )
        .with_full_output(format!("Checked path: {file}"))
    }

    pub async fn command_succeeds(&self, env: &dyn Environment, command: &str) -> GradeResult {
        let kind = CheckKind::CommandSucceeds;
        let timeout = Duration::from_secs(self.config.command_timeout_secs);

        match env.run(&Invocation::shell(command), timeout).await {
            Ok(out) => {
                let passed = out.success();
                let shown = if passed { &out.stdout } else { &out.stderr };
                GradeResult::code(
                    kind,
                    passed,
                    if passed { 1.0 } else { 0.0 },
                    truncate_chars(shown, self.config.max_detail_chars),
                )
                .with_full_output(out.combined())
            }
            Err(CommandError::Timeout(t)) => degraded(
                GradeResult::code_failure(kind, "Command timed out")
                    .with_full_output(format!("Command timed out after {} seconds", t.as_secs())),
            ),
            Err(e) => degraded(
                GradeResult::code_failure(kind, format!("Error running command: {e}"))
                    .with_full_output(e.to_string()),
            ),
        }
    }

    /// Run the linter; each violation costs `lint_penalty_per_violation`.
    pub async fn lint_clean(&self, env: &dyn Environment, config: Option<&str>) -> GradeResult {
        let kind = CheckKind::LintClean;
        let program = &self.config.lint_program;
        let mut args = self.config.lint_args.clone();
        if let Some(path) = config {
            args.extend(["--config".to_string(), path.to_string()]);
        }
        args.push(".".to_string());

        let timeout = Duration::from_secs(self.config.lint_timeout_secs);
        let out = match self.run_tool(env, kind, program, args, timeout).await {
            Ok(out) => out,
            Err(grade) => return grade,
        };

        let full_output = if out.stdout.is_empty() {
            out.stderr.clone()
        } else {
            out.stdout.clone()
        };
        let report = parse_lint_output(&out.stdout);
        if report.violations == 0 {
            return GradeResult::code(kind, true, 1.0, "No linting violations")
                .with_full_output(full_output);
        }

        let score = penalized_score(report.violations, self.config.lint_penalty_per_violation);
        GradeResult::code(
            kind,
            score >= self.config.static_pass_threshold,
            score,
            report.summary(),
        )
        .with_full_output(full_output)
    }

    /// Run the type checker; each error costs `type_check_penalty_per_error`.
    pub async fn type_check_clean(
        &self,
        env: &dyn Environment,
        config: Option<&str>,
    ) -> GradeResult {
        let kind = CheckKind::TypeCheckClean;
        let program = &self.config.type_check_program;
        let mut args = self.config.type_check_args.clone();
        if let Some(path) = config {
            args.extend(["--config-file".to_string(), path.to_string()]);
        }
        args.push(".".to_string());

        let timeout = Duration::from_secs(self.config.type_check_timeout_secs);
        let out = match self.run_tool(env, kind, program, args, timeout).await {
            Ok(out) => out,
            Err(grade) => return grade,
        };

        let full_output = out.combined();
        let report = parse_type_check_output(&out.stdout);
        if out.success() || report.errors() == 0 {
            return GradeResult::code(kind, true, 1.0, "No type errors")
                .with_full_output(full_output);
        }

        let score = penalized_score(report.errors(), self.config.type_check_penalty_per_error);
        GradeResult::code(
            kind,
            score >= self.config.static_pass_threshold,
            score,
            report.summary(),
        )
        .with_full_output(full_output)
    }

    /// Run a static-analysis tool, mapping failures to a finished grade.
    async fn run_tool(
        &self,
        env: &dyn Environment,
        kind: CheckKind,
        program: &str,
        args: Vec<String>,
        timeout: Duration,
    ) -> Result<CommandOutput, GradeResult> {
        match env.run(&Invocation::program(program, args), timeout).await {
            Ok(out) => Ok(out),
            Err(CommandError::NotFound { .. }) => Err(degraded(
                GradeResult::code_failure(
                    kind,
                    format!("{program} not found - install with: pip install {program}"),
                )
                .with_full_output(format!("{program} command not found")),
            )),
            Err(CommandError::Timeout(t)) => Err(degraded(
                GradeResult::code_failure(kind, format!("{program} command timed out"))
                    .with_full_output(format!(
                        "{program} command timed out after {} seconds",
                        t.as_secs()
                    )),
            )),
            Err(e) => Err(degraded(
                GradeResult::code_failure(kind, format!("Error running {program}: {e}"))
                    .with_full_output(e.to_string()),
            )),
        }
    }
}

fn degraded(grade: GradeResult) -> GradeResult {
    obs::emit_grade_degraded(&grade.assertion_name, &grade.details);
    grade
}
