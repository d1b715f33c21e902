use async_trait::async_trait;
use serde::Serialize;

use crate::domain::run::{RunSummary, TestCaseResult};
use crate::error::AppResult;

/// What a failure ticket knows beyond the test result itself.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureContext {
    pub flaky: bool,
    pub success_rate: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteDigest {
    pub run_id: String,
    pub suite_name: String,
    pub summary: RunSummary,
    pub slowest_test: Option<String>,
    pub failed_tests: Vec<String>,
    pub flaky_count: usize,
}

/// Files tickets for test outcomes. Returns the created ticket key when known.
#[async_trait]
pub trait FailureReporter: Send + Sync {
    async fn report_failure(
        &self,
        result: &TestCaseResult,
        context: &FailureContext,
    ) -> AppResult<Option<String>>;

    async fn report_suite(&self, digest: &SuiteDigest) -> AppResult<Option<String>>;
}
