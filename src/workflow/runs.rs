use std::collections::BTreeSet;

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::context::RunnerContext;
use crate::domain::flaky::{flaky_failure_rate, flaky_window, success_rate, success_rate_window};
use crate::domain::report::parse_output;
use crate::domain::run::{RunOptions, RunReport, TestCaseResult, TestStatus};
use crate::error::{AppError, AppResult};
use crate::events::RunEvent;
use crate::services::{FailureContext, SuiteDigest};
use crate::store::RunRecord;

const MANUAL_RUN_ID: &str = "manual";

/// Registers a run and executes it in the background.
pub fn start_run(ctx: &RunnerContext, options: RunOptions) -> AppResult<RunRecord> {
    options.validate()?;
    let run_id = Uuid::new_v4().to_string();
    let record = ctx.store.insert_running(&run_id, options.clone());
    ctx.events.publish(
        &run_id,
        RunEvent::TestRunRequested,
        serde_json::to_value(&options)?,
    );

    let ctx = ctx.clone();
    tokio::spawn(async move {
        execute(&ctx, &run_id, &options).await;
    });
    Ok(record)
}

pub async fn execute(ctx: &RunnerContext, run_id: &str, options: &RunOptions) {
    ctx.events.publish(
        run_id,
        RunEvent::TestExecutionStarted,
        json!({ "args": options.runner_args(), "options": options }),
    );

    let output = match ctx.runner.run(run_id, options).await {
        Ok(output) if output.exit_code.is_none() => {
            Err(AppError::TestRunner("test run was stopped before it finished".to_string()))
        }
        other => other,
    };

    let output = match output {
        Ok(output) => output,
        Err(err) => {
            tracing::error!(run_id, error = %err, "test run failed");
            ctx.store.fail(run_id, err.to_string());
            ctx.events.publish(
                run_id,
                RunEvent::TestExecutionFailed,
                json!({ "error": err.to_string() }),
            );
            return;
        }
    };

    let report = parse_output(&output.stdout, run_id, options);
    if report.fallback && !output.stderr.trim().is_empty() {
        tracing::warn!(run_id, stderr = %output.stderr.trim(), "runner wrote to stderr");
    }
    ctx.store.complete(run_id, report.clone(), output.exit_code);
    ctx.events.publish(
        run_id,
        RunEvent::TestExecutionCompleted,
        json!({ "exitCode": output.exit_code, "results": report.summary }),
    );

    detect_flaky(ctx, run_id, &report);
    if ctx.auto_tickets {
        file_tickets(ctx, run_id, options, &report).await;
    }
}

fn failed_test_names(report: &RunReport) -> BTreeSet<&str> {
    report
        .failures()
        .map(|test| test.test_name.as_str())
        .collect()
}

fn detect_flaky(ctx: &RunnerContext, run_id: &str, report: &RunReport) {
    let since = Utc::now() - flaky_window();
    for name in failed_test_names(report) {
        let outcomes = ctx.store.outcomes_since(name, since);
        if let Some(rate) = flaky_failure_rate(&outcomes) {
            if ctx.store.mark_flaky(name) {
                ctx.events.publish(
                    run_id,
                    RunEvent::FlakyTestDetected,
                    json!({ "testName": name, "failureRate": rate }),
                );
            }
        }
    }
}

fn failure_context(ctx: &RunnerContext, test_name: &str) -> FailureContext {
    let outcomes = ctx
        .store
        .outcomes_since(test_name, Utc::now() - success_rate_window());
    FailureContext {
        flaky: ctx.store.is_flaky(test_name),
        success_rate: success_rate(&outcomes),
    }
}

/// Reporter errors are logged and never change the run's outcome.
async fn file_tickets(ctx: &RunnerContext, run_id: &str, options: &RunOptions, report: &RunReport) {
    for failure in report.failures() {
        let context = failure_context(ctx, &failure.test_name);
        match ctx.reporter.report_failure(failure, &context).await {
            Ok(Some(key)) => {
                tracing::info!(run_id, test = %failure.test_name, key = %key, "filed failure ticket")
            }
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(run_id, test = %failure.test_name, error = %err, "failed to file failure ticket")
            }
        }
    }

    if report.summary.total == 0 {
        return;
    }
    let failed_names = failed_test_names(report);
    let flaky_count = failed_names
        .iter()
        .filter(|name| ctx.store.is_flaky(name))
        .count();
    let digest = SuiteDigest {
        run_id: run_id.to_string(),
        suite_name: options.suite_label(),
        summary: report.summary.clone(),
        slowest_test: report.slowest().map(|test| test.test_name.clone()),
        failed_tests: failed_names.into_iter().map(str::to_string).collect(),
        flaky_count,
    };
    match ctx.reporter.report_suite(&digest).await {
        Ok(Some(key)) => tracing::info!(run_id, key = %key, "filed suite report"),
        Ok(None) => {}
        Err(err) => tracing::warn!(run_id, error = %err, "failed to file suite report"),
    }
}

/// A failure reported by hand rather than observed in a run.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualFailure {
    pub test_name: Option<String>,
    pub test_file: Option<String>,
    pub error: Option<String>,
    pub browser: Option<String>,
    pub screenshot: Option<String>,
}

pub async fn report_failure_manually(
    ctx: &RunnerContext,
    failure: ManualFailure,
) -> AppResult<Option<String>> {
    let test_name = failure
        .test_name
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| AppError::Validation("testName is required".to_string()))?;

    let result = TestCaseResult {
        run_id: MANUAL_RUN_ID.to_string(),
        test_file: failure.test_file.unwrap_or_else(|| "unknown".to_string()),
        status: TestStatus::Failed,
        duration_ms: 0,
        error: failure.error,
        browser: failure
            .browser
            .unwrap_or_else(|| crate::domain::run::DEFAULT_BROWSER.to_string()),
        screenshot: failure.screenshot,
        test_name,
    };
    let context = failure_context(ctx, &result.test_name);
    ctx.reporter.report_failure(&result, &context).await
}

/// Stops every child process; their runs end as failed.
pub async fn shutdown(ctx: &RunnerContext) {
    let running = ctx.store.running().len();
    if running > 0 {
        tracing::info!(running, "stopping active test runs");
    }
    ctx.runner.cancel_all().await;
}

#[cfg(test)]
pub(crate) mod fakes {
    use std::collections::VecDeque;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use crate::domain::run::{RunOptions, TestCaseResult};
    use crate::error::{AppError, AppResult};
    use crate::services::{
        FailureContext, FailureReporter, RunnerOutput, SuiteDigest, TestRunnerService,
    };

    /// Hands out scripted outputs in order; an empty script is a spawn failure.
    #[derive(Default)]
    pub struct ScriptedRunner {
        pub outputs: Mutex<VecDeque<RunnerOutput>>,
        pub cancelled: Mutex<bool>,
    }

    impl ScriptedRunner {
        pub fn with(outputs: impl IntoIterator<Item = RunnerOutput>) -> Self {
            Self {
                outputs: Mutex::new(outputs.into_iter().collect()),
                cancelled: Mutex::new(false),
            }
        }
    }

    #[async_trait]
    impl TestRunnerService for ScriptedRunner {
        async fn run(&self, _run_id: &str, _options: &RunOptions) -> AppResult<RunnerOutput> {
            self.outputs
                .lock()
                .pop_front()
                .ok_or_else(|| AppError::TestRunner("failed to start npx".to_string()))
        }

        async fn cancel_all(&self) {
            *self.cancelled.lock() = true;
        }
    }

    #[derive(Default)]
    pub struct RecordingReporter {
        pub failures: Mutex<Vec<(TestCaseResult, FailureContext)>>,
        pub suites: Mutex<Vec<SuiteDigest>>,
        pub broken: bool,
    }

    #[async_trait]
    impl FailureReporter for RecordingReporter {
        async fn report_failure(
            &self,
            result: &TestCaseResult,
            context: &FailureContext,
        ) -> AppResult<Option<String>> {
            if self.broken {
                return Err(AppError::IssueTracker("ticket service down".to_string()));
            }
            let mut failures = self.failures.lock();
            failures.push((result.clone(), context.clone()));
            Ok(Some(format!("PET-{}", failures.len())))
        }

        async fn report_suite(&self, digest: &SuiteDigest) -> AppResult<Option<String>> {
            if self.broken {
                return Err(AppError::IssueTracker("ticket service down".to_string()));
            }
            self.suites.lock().push(digest.clone());
            Ok(Some("PET-100".to_string()))
        }
    }

    pub fn report_json(outcomes: &[(&str, &str)]) -> String {
        let specs: Vec<String> = outcomes
            .iter()
            .map(|(name, status)| {
                format!(
                    r#"{{"title":"{name}","file":"owners.spec.ts","tests":[{{"projectName":"chromium","results":[{{"status":"{status}","duration":100,"error":{{"message":"Timeout 5000ms exceeded"}}}}]}}]}}"#
                )
            })
            .collect();
        format!(
            r#"Running tests...
{{"suites":[{{"title":"owners.spec.ts","specs":[{}]}}]}}"#,
            specs.join(",")
        )
    }

    pub fn output(stdout: String, exit_code: i32) -> RunnerOutput {
        RunnerOutput {
            exit_code: Some(exit_code),
            stdout,
            stderr: String::new(),
        }
    }
}
