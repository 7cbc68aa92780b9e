//! Error taxonomy for the evaluation core.
//!
//! Grading and statistics never surface these to callers during normal
//! operation; they are converted into failing grades or neutral results at the
//! boundary. `EvalError` is reserved for declaration, configuration, and
//! persistence problems that a caller must fix.

use std::time::Duration;

/// Problems with a task or assertion as declared.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DeclarationError {
    #[error("task id must not be empty")]
    EmptyTaskId,

    #[error("{check} requires {field}")]
    MissingParameter {
        check: &'static str,
        field: &'static str,
    },

    #[error("llm assertion {index} has an empty rubric")]
    EmptyRubric { index: usize },

    #[error("pass_threshold {0} is outside [0, 1]")]
    ThresholdOutOfRange(f64),

    #[error("scoring weight for '{key}' must be finite and non-negative, got {weight}")]
    InvalidWeight { key: String, weight: f64 },
}

/// Failure to run an external command inside an evaluation environment.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("command timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("{program} not found")]
    NotFound { program: String },

    #[error("command must not be empty")]
    EmptyCommand,

    #[error("failed to run command: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure of the external LLM judge.
#[derive(Debug, thiserror::Error)]
pub enum JudgeError {
    #[error("judge timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("judge transport error: {0}")]
    Transport(String),
}

/// Errors a caller of the evaluation core must handle.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("invalid task '{task_id}': {source}")]
    InvalidTask {
        task_id: String,
        #[source]
        source: DeclarationError,
    },

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("malformed results document: {0}")]
    MalformedResults(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for evaluation-core operations.
pub type Result<T> = std::result::Result<T, EvalError>;
