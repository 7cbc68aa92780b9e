//! Execution traces produced by the external agent executor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Token counts reported by the agent.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenUsage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
    #[serde(default)]
    pub cache_read_tokens: u64,
    #[serde(default)]
    pub cache_creation_tokens: u64,
}

impl TokenUsage {
    pub fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
            ..Self::default()
        }
    }

    /// Input plus output tokens; cache traffic is reported separately.
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// A tool invocation made by the agent.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub input: serde_json::Value,
    #[serde(default)]
    pub output: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

/// What happened to a file during the run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileAction {
    Created,
    Modified,
    Deleted,
}

/// A file modification observed by the environment isolator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileChange {
    pub path: String,
    pub action: FileAction,
    #[serde(default)]
    pub diff: Option<String>,
}

/// Immutable record of one agent run.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ExecutionTrace {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub is_error: bool,
    #[serde(default)]
    pub usage: TokenUsage,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub file_changes: Vec<FileChange>,
    #[serde(default)]
    pub duration_seconds: f64,
    #[serde(default)]
    pub num_turns: u32,
    #[serde(default)]
    pub max_turns: u32,
    #[serde(default)]
    pub hit_turn_limit: bool,
    #[serde(default)]
    pub stderr: String,
}

impl ExecutionTrace {
    /// Trace for a run that the executor had to give up on.
    pub fn failed(reason: impl Into<String>, duration_seconds: f64) -> Self {
        Self {
            result: reason.into(),
            is_error: true,
            duration_seconds,
            ..Self::default()
        }
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_duration(mut self, duration_seconds: f64) -> Self {
        self.duration_seconds = duration_seconds;
        self
    }

    /// Number of tool calls that reported an error.
    pub fn failed_tool_calls(&self) -> usize {
        self.tool_calls.iter().filter(|c| c.error.is_some()).count()
    }
}
