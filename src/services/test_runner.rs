use async_trait::async_trait;

use crate::domain::run::RunOptions;
use crate::error::AppResult;

/// Raw result of one runner process.
#[derive(Debug, Clone, Default)]
pub struct RunnerOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

#[async_trait]
pub trait TestRunnerService: Send + Sync {
    /// Runs the suite to completion. `run_id` identifies the process for `cancel`.
    async fn run(&self, run_id: &str, options: &RunOptions) -> AppResult<RunnerOutput>;
    /// Stops every process that is still running.
    async fn cancel_all(&self);
}
