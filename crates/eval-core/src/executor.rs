//! Running one trial: execute the agent, then grade what it left behind.
//!
//! Driving the agent is an external concern behind the [`Executor`] trait.
//! A trial that misses its overall deadline is reported as
//! [`TrialOutcome::Aborted`] and never produces a partial result.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use crate::domain::{EvalResult, ExecutionTrace, ResultKey, RunConfig, Task, TrialOutcome};
use crate::grading::{CompositeGrader, Environment};
use crate::obs;

/// Drives the agent under test.
#[async_trait]
pub trait Executor: Send + Sync {
    /// Run `prompt` in `workdir` under `config`.
    ///
    /// Must return within roughly `timeout`; on timeout the trace carries
    /// `is_error = true` and a descriptive result rather than an error.
    async fn run(
        &self,
        prompt: &str,
        config: &RunConfig,
        workdir: &Path,
        timeout: Duration,
    ) -> ExecutionTrace;
}

/// Extra time allowed for grading on top of the task's execution timeout.
pub const DEFAULT_GRADING_ALLOWANCE: Duration = Duration::from_secs(600);

/// One (task, config, run index) to execute and grade.
pub struct Trial<'a> {
    pub task: &'a Task,
    pub config: &'a RunConfig,
    pub run_index: u32,
    pub workdir: &'a Path,
    /// Budget for execution plus grading; defaults to the task timeout
    /// plus [`DEFAULT_GRADING_ALLOWANCE`].
    pub deadline: Option<Duration>,
}

impl Trial<'_> {
    fn execution_timeout(&self) -> Duration {
        Duration::from_secs(self.task.timeout_seconds)
    }

    fn deadline(&self) -> Duration {
        self.deadline
            .unwrap_or_else(|| self.execution_timeout() + DEFAULT_GRADING_ALLOWANCE)
    }
}

/// Execute and grade one trial.
pub async fn run_trial(
    trial: &Trial<'_>,
    executor: &dyn Executor,
    grader: &CompositeGrader,
    env: &dyn Environment,
) -> TrialOutcome {
    let deadline = trial.deadline();
    match tokio::time::timeout(deadline, execute_and_grade(trial, executor, grader, env)).await {
        Ok(result) => {
            obs::emit_trial_graded(
                &result.key(true),
                result.run_index,
                result.overall_score,
                result.passed,
            );
            TrialOutcome::Scored(result)
        }
        Err(_) => {
            let reason = format!("trial exceeded its {}s deadline", deadline.as_secs());
            tracing::warn!(
                task_id = %trial.task.id,
                config = %trial.config.name,
                run_index = trial.run_index,
                reason = %reason,
                "trial aborted"
            );
            TrialOutcome::Aborted {
                key: ResultKey::new(&trial.task.id, &trial.config.name)
                    .with_model(&trial.config.model),
                run_index: trial.run_index,
                reason,
            }
        }
    }
}

async fn execute_and_grade(
    trial: &Trial<'_>,
    executor: &dyn Executor,
    grader: &CompositeGrader,
    env: &dyn Environment,
) -> EvalResult {
    let mut trace = executor
        .run(
            &trial.task.prompt,
            trial.config,
            trial.workdir,
            trial.execution_timeout(),
        )
        .await;
    trace.max_turns = trial.config.max_turns;
    trace.hit_turn_limit = trace.num_turns >= trial.config.max_turns;

    let grading = grader.grade(trial.task, &trace, env).await;

    EvalResult {
        task_id: trial.task.id.clone(),
        config_name: trial.config.name.clone(),
        model: trial.config.model.clone(),
        run_index: trial.run_index,
        timestamp: Utc::now(),
        trace,
        grades: grading.grades,
        overall_score: grading.overall_score,
        passed: grading.passed,
    }
}
