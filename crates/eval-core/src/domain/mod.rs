//! Domain models for agent evaluation.
//!
//! Canonical definitions for the core entities:
//! - `Task` / `Assertion`: what a run is graded against
//! - `ExecutionTrace`: what the agent did
//! - `GradeResult`: outcome of one assertion
//! - `EvalResult`: one graded trial

pub mod cost;
pub mod error;
pub mod grade;
pub mod result;
pub mod task;
pub mod trace;

pub use cost::{CostMetrics, ModelPricing, PricingTable};
pub use error::{CommandError, DeclarationError, EvalError, JudgeError, Result};
pub use grade::{clamp_unit, AssertionKind, CriterionScore, GradeResult, GradeTag};
pub use result::{scored_results, EvalResult, ResultKey, TrialOutcome};
pub use task::{
    Assertion, CheckKind, CodeCheck, Difficulty, LlmAssertion, RunConfig, Task, TaskCategory,
};
pub use trace::{ExecutionTrace, FileAction, FileChange, TokenUsage, ToolCall};
