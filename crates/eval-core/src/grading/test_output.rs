//! Scraping pass/fail counts out of test-runner output.
//!
//! Works on pytest-style summaries (`5 passed, 2 failed, 1 error`) and on
//! cargo's `test result:` lines, since both print `N passed` / `N failed`.

use std::sync::OnceLock;

use regex::Regex;

/// Counts parsed from a test run. Absent counts are zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TestCounts {
    pub passed: u32,
    pub failed: u32,
    pub errors: u32,
}

impl TestCounts {
    pub fn total(&self) -> u32 {
        self.passed
            .saturating_add(self.failed)
            .saturating_add(self.errors)
    }

    /// Fraction of tests that passed, `None` when nothing was counted.
    pub fn pass_ratio(&self) -> Option<f64> {
        match self.total() {
            0 => None,
            total => Some(f64::from(self.passed) / f64::from(total)),
        }
    }
}

fn count_patterns() -> &'static [Regex; 3] {
    static PATTERNS: OnceLock<[Regex; 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"(\d+)\s+passed").expect("static regex"),
            Regex::new(r"(\d+)\s+failed").expect("static regex"),
            Regex::new(r"(\d+)\s+error").expect("static regex"),
        ]
    })
}

fn first_count(re: &Regex, output: &str) -> u32 {
    re.captures(output)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// Parse the first `N passed`, `N failed` and `N error(s)` occurrences.
///
/// Returns `None` when no test was counted, which callers treat as
/// "could not parse" and fall back to the exit code.
pub fn parse_test_counts(output: &str) -> Option<TestCounts> {
    let [passed, failed, errors] = count_patterns();
    let counts = TestCounts {
        passed: first_count(passed, output),
        failed: first_count(failed, output),
        errors: first_count(errors, output),
    };
    (counts.total() > 0).then_some(counts)
}
