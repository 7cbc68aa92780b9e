//! Shared fakes and builders for eval-core integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use eval_core::domain::{CommandError, JudgeError};
use eval_core::grading::{CommandOutput, Environment, Invocation, Judge, SourceFile};
use eval_core::{EvalResult, ExecutionTrace, TokenUsage};

/// In-memory files plus scripted command outputs keyed by command line.
#[derive(Debug, Default)]
pub struct ScriptedEnvironment {
    files: BTreeMap<String, String>,
    commands: BTreeMap<String, CommandOutput>,
}

impl ScriptedEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file(mut self, path: &str, content: &str) -> Self {
        self.files.insert(path.to_string(), content.to_string());
        self
    }

    pub fn command(mut self, line: &str, exit_code: i32, stdout: &str) -> Self {
        self.commands.insert(
            line.to_string(),
            CommandOutput {
                exit_code,
                stdout: stdout.to_string(),
                ..CommandOutput::default()
            },
        );
        self
    }
}

fn command_line(invocation: &Invocation) -> String {
    match invocation {
        Invocation::Shell(line) => line.clone(),
        Invocation::Program { program, args } => {
            let mut parts = vec![program.clone()];
            parts.extend(args.iter().cloned());
            parts.join(" ")
        }
    }
}

#[async_trait]
impl Environment for ScriptedEnvironment {
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
        _timeout: Duration,
    ) -> Result<CommandOutput, CommandError> {
        self.commands
            .get(&command_line(invocation))
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

/// Judge that returns a canned reply, optionally after a delay.
pub struct CannedJudge {
    pub reply: Result<String, String>,
    pub delay: Duration,
}

impl CannedJudge {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Ok(text.to_string()),
            delay: Duration::ZERO,
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Err(message.to_string()),
            delay: Duration::ZERO,
        }
    }

    pub fn stalling(delay: Duration) -> Self {
        Self {
            reply: Ok("{}".to_string()),
            delay,
        }
    }
}

#[async_trait]
impl Judge for CannedJudge {
    async fn complete(&self, _prompt: &str) -> Result<String, JudgeError> {
        tokio::time::sleep(self.delay).await;
        self.reply.clone().map_err(JudgeError::Transport)
    }
}

/// A scored result with the given outcome and default usage.
pub fn result(task: &str, config: &str, passed: bool, score: f64) -> EvalResult {
    EvalResult {
        task_id: task.to_string(),
        config_name: config.to_string(),
        model: "sonnet".to_string(),
        run_index: 0,
        timestamp: Utc::now(),
        trace: ExecutionTrace::default()
            .with_usage(TokenUsage::new(2_000, 500))
            .with_duration(30.0),
        grades: Vec::new(),
        overall_score: score,
        passed,
    }
}

/// `n` identical results with sequential run indices.
pub fn results(task: &str, config: &str, passed: bool, score: f64, n: u32) -> Vec<EvalResult> {
    (0..n)
        .map(|i| EvalResult {
            run_index: i,
            ..result(task, config, passed, score)
        })
        .collect()
}
