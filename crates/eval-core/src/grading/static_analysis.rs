//! Parsing linter and type-checker output into violation counts.

use std::collections::BTreeMap;
use std::sync::OnceLock;

use regex::Regex;

/// Violations seen in the first this-many diagnostics feed the rule summary.
const SUMMARY_SAMPLE: usize = 20;
const SUMMARY_RULES: usize = 5;
const SUMMARY_TYPE_ERRORS: usize = 3;

/// Lint diagnostics: a total plus the rule codes of the leading entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LintReport {
    pub violations: usize,
    pub rule_codes: Vec<String>,
}

impl LintReport {
    /// `"N violations: E501: 2, F401: 1"`, naming at most five rules.
    pub fn summary(&self) -> String {
        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        for code in self.rule_codes.iter().take(SUMMARY_SAMPLE) {
            *counts.entry(code.as_str()).or_default() += 1;
        }
        let parts: Vec<String> = counts
            .iter()
            .map(|(rule, count)| format!("{rule}: {count}"))
            .collect();

        let mut details = format!(
            "{} violations: {}",
            self.violations,
            parts
                .iter()
                .take(SUMMARY_RULES)
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        );
        if parts.len() > SUMMARY_RULES {
            details.push_str(&format!(" (+{} more rules)", parts.len() - SUMMARY_RULES));
        }
        details
    }
}

fn diagnostic_line() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\S+:\d+:\d+:\s*([A-Z]+[0-9]+)?").expect("static regex")
    })
}

/// Count lint violations.
///
/// A JSON array on stdout is one violation per element (rule from `code`).
/// Anything else is read as text, one violation per `path:line:col:` line.
pub fn parse_lint_output(stdout: &str) -> LintReport {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return LintReport::default();
    }

    if let Ok(entries) = serde_json::from_str::<Vec<serde_json::Value>>(trimmed) {
        let rule_codes = entries
            .iter()
            .map(|v| {
                v.get("code")
                    .and_then(|c| c.as_str())
                    .unwrap_or("unknown")
                    .to_string()
            })
            .collect();
        return LintReport {
            violations: entries.len(),
            rule_codes,
        };
    }

    let re = diagnostic_line();
    let mut report = LintReport::default();
    for line in trimmed.lines() {
        if let Some(caps) = re.captures(line) {
            report.violations += 1;
            let code = caps.get(1).map_or("unknown", |m| m.as_str());
            report.rule_codes.push(code.to_string());
        }
    }
    report
}

/// Type-checker error lines (`file.py:12: error: ...`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeCheckReport {
    pub error_lines: Vec<String>,
}

impl TypeCheckReport {
    pub fn errors(&self) -> usize {
        self.error_lines.len()
    }

    /// Lists the first errors when there are only a few, otherwise the count.
    pub fn summary(&self) -> String {
        let n = self.errors();
        if n > SUMMARY_TYPE_ERRORS {
            format!("{n} type errors")
        } else {
            format!("{n} type errors. First few: {}", self.error_lines.join("; "))
        }
    }
}

pub fn parse_type_check_output(stdout: &str) -> TypeCheckReport {
    TypeCheckReport {
        error_lines: stdout
            .lines()
            .filter(|line| line.contains(": error:"))
            .map(str::to_string)
            .collect(),
    }
}

/// `max(0, 1 - count * penalty)`.
pub fn penalized_score(count: usize, penalty: f64) -> f64 {
    (1.0 - count as f64 * penalty).max(0.0)
}
