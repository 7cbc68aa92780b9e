//! Grading of agent runs.
//!
//! - `code`: objective checks (tests, files, commands, lint, type check)
//! - `judge`: rubric grading through an external LLM judge
//! - `composite`: all assertions of a task combined into one verdict

pub mod code;
pub mod composite;
pub mod environment;
pub mod judge;
pub mod static_analysis;
pub mod test_output;

pub use code::CodeGrader;
pub use composite::{verdict, CompositeGrader, Grading, WeightSelector, WeightTable};
pub use environment::{CommandOutput, Environment, Invocation, LocalEnvironment, SourceFile};
pub use judge::{build_prompt, parse_judge_response, Judge, LlmGrader};

/// First `max_chars` characters of `s`.
pub(crate) fn truncate_chars(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((end, _)) => s[..end].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::{BTreeMap, BTreeSet};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::environment::{CommandOutput, Environment, Invocation, SourceFile};
    use crate::domain::CommandError;

    /// In-memory environment keyed by the rendered command line.
    #[derive(Debug, Default)]
    pub struct FakeEnvironment {
        files: BTreeMap<String, String>,
        commands: BTreeMap<String, CommandOutput>,
        timeouts: BTreeSet<String>,
    }

    impl FakeEnvironment {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_file(mut self, path: &str, content: &str) -> Self {
            self.files.insert(path.to_string(), content.to_string());
            self
        }

        pub fn with_command(mut self, line: &str, output: CommandOutput) -> Self {
            self.commands.insert(line.to_string(), output);
            self
        }

        pub fn with_timeout(mut self, line: &str) -> Self {
            self.timeouts.insert(line.to_string());
            self
        }
    }

    fn render(invocation: &Invocation) -> String {
        match invocation {
            Invocation::Shell(line) => line.clone(),
            Invocation::Program { program, args } => {
                std::iter::once(program.as_str())
                    .chain(args.iter().map(String::as_str))
                    .collect::<Vec<_>>()
                    .join(" ")
            }
        }
    }

    #[async_trait]
    impl Environment for FakeEnvironment {
        async fn read_to_string(&self, path: &str) -> std::io::Result<String> {
            self.files
                .get(path)
                .cloned()
                .ok_or_else(|| std::io::Error::from(std::io::ErrorKind::NotFound))
        }

        async fn exists(&self, path: &str) -> bool {
            self.files.contains_key(path)
        }

        async fn run(
            &self,
            invocation: &Invocation,
            timeout: Duration,
        ) -> Result<CommandOutput, CommandError> {
            let line = render(invocation);
            if self.timeouts.contains(&line) {
                return Err(CommandError::Timeout(timeout));
            }
            self.commands
                .get(&line)
                .cloned()
                .ok_or_else(|| CommandError::NotFound {
                    program: invocation.program_name().to_string(),
                })
        }

        async fn source_snapshot(&self, _extensions: &[String], max_files: usize) -> Vec<SourceFile> {
            self.files
                .iter()
                .take(max_files)
                .map(|(path, content)| SourceFile {
                    path: path.clone(),
                    content: content.clone(),
                })
                .collect()
        }
    }
}
