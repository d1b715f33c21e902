use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Local;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::domain::run::{TestCaseResult, error_condition, format_duration};
use crate::error::{AppError, AppResult};
use crate::services::{FailureContext, FailureReporter, SuiteDigest};

const FAILURE_TEMPLATE: &str = "playwright-test-failure";
const SUITE_TEMPLATE: &str = "playwright-suite-report";
const DEFAULT_TEST_URL: &str = "http://localhost:8080";

/// Files tickets through the ticket service's template endpoint.
pub struct TicketServiceClient {
    http: Client,
    base_url: String,
}

impl TicketServiceClient {
    pub fn new(base_url: String) -> Self {
        Self {
            http: Client::new(),
            base_url,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/create-from-template", self.base_url.trim_end_matches('/'))
    }

    async fn submit(&self, request: &TemplateTicketRequest) -> AppResult<Option<String>> {
        let response = self
            .http
            .post(self.endpoint())
            .json(request)
            .send()
            .await
            .map_err(|err| AppError::IssueTracker(format!("failed to call ticket service: {err}")))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Upstream { status, body });
        }

        let created: CreatedTicket = response.json().await.map_err(|err| {
            AppError::IssueTracker(format!("failed to parse ticket service response: {err}"))
        })?;
        Ok(created.ticket.map(|ticket| ticket.key))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TemplateTicketRequest {
    template_id: &'static str,
    title: String,
    replacements: BTreeMap<&'static str, String>,
}

#[derive(Deserialize)]
struct CreatedTicket {
    ticket: Option<CreatedKey>,
}

#[derive(Deserialize)]
struct CreatedKey {
    key: String,
}

fn failure_request(result: &TestCaseResult, context: &FailureContext) -> TemplateTicketRequest {
    let replacements = BTreeMap::from([
        ("test_name", result.test_name.clone()),
        ("test_file", result.test_file.clone()),
        ("browser", result.browser.clone()),
        (
            "error_message",
            result
                .error
                .clone()
                .unwrap_or_else(|| "no error message available".to_string()),
        ),
        (
            "screenshot",
            result
                .screenshot
                .clone()
                .unwrap_or_else(|| "no screenshot available".to_string()),
        ),
        ("execution_time", format_duration(result.duration_ms)),
        ("run_id", result.run_id.clone()),
        ("runner_version", env!("CARGO_PKG_VERSION").to_string()),
        ("test_url", DEFAULT_TEST_URL.to_string()),
        (
            "flaky_status",
            if context.flaky { "FLAKY" } else { "STABLE" }.to_string(),
        ),
        ("success_rate", context.success_rate.clone()),
        (
            "error_condition",
            error_condition(result.error.as_deref()).to_string(),
        ),
    ]);

    TemplateTicketRequest {
        template_id: FAILURE_TEMPLATE,
        title: format!("Test failure: {}", result.test_name),
        replacements,
    }
}

fn suite_request(digest: &SuiteDigest) -> TemplateTicketRequest {
    let summary = &digest.summary;
    let average = if summary.total == 0 {
        0
    } else {
        summary.duration_ms / summary.total
    };
    let failed_list = if digest.failed_tests.is_empty() {
        "none".to_string()
    } else {
        digest.failed_tests.join("\n- ")
    };

    let replacements = BTreeMap::from([
        ("suite_name", digest.suite_name.clone()),
        (
            "execution_date",
            Local::now().format("%d.%m.%Y %H:%M:%S").to_string(),
        ),
        ("run_id", digest.run_id.clone()),
        ("total_tests", summary.total.to_string()),
        ("passed_tests", summary.passed.to_string()),
        ("failed_tests", summary.failed.to_string()),
        ("skipped_tests", summary.skipped.to_string()),
        ("pass_rate", format!("{:.1}", summary.pass_rate())),
        ("total_duration", format_duration(summary.duration_ms)),
        ("avg_test_time", format_duration(average)),
        (
            "slowest_test",
            digest
                .slowest_test
                .clone()
                .unwrap_or_else(|| "not available".to_string()),
        ),
        ("failed_test_list", failed_list),
        ("flaky_count", digest.flaky_count.to_string()),
        ("suite_labels", "playwright, automation".to_string()),
    ]);

    TemplateTicketRequest {
        template_id: SUITE_TEMPLATE,
        title: format!(
            "Test report {}: {}/{} passed",
            digest.suite_name, summary.passed, summary.total
        ),
        replacements,
    }
}

#[async_trait]
impl FailureReporter for TicketServiceClient {
    async fn report_failure(
        &self,
        result: &TestCaseResult,
        context: &FailureContext,
    ) -> AppResult<Option<String>> {
        self.submit(&failure_request(result, context)).await
    }

    async fn report_suite(&self, digest: &SuiteDigest) -> AppResult<Option<String>> {
        self.submit(&suite_request(digest)).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use axum::{Json, Router, extract::State, routing::post};
    use serde_json::{Value, json};

    use super::*;
    use crate::domain::run::{RunSummary, TestStatus};

    fn failed_test() -> TestCaseResult {
        TestCaseResult {
            run_id: "run-9".to_string(),
            test_name: "adds pet type".to_string(),
            test_file: "tests/add-pet-type.spec.ts".to_string(),
            status: TestStatus::Failed,
            duration_ms: 65_000,
            error: Some("locator not visible".to_string()),
            browser: "chromium".to_string(),
            screenshot: None,
        }
    }

    #[test]
    fn failure_request_fills_template_values() {
        let context = FailureContext {
            flaky: true,
            success_rate: "50.0% (1/2)".to_string(),
        };
        let request = failure_request(&failed_test(), &context);
        assert_eq!(request.template_id, "playwright-test-failure");
        assert_eq!(request.title, "Test failure: adds pet type");
        assert_eq!(request.replacements["flaky_status"], "FLAKY");
        assert_eq!(request.replacements["execution_time"], "1m 5s");
        assert_eq!(request.replacements["error_condition"], "element not visible");
        assert_eq!(request.replacements["screenshot"], "no screenshot available");
    }

    #[test]
    fn suite_request_summarises_run() {
        let digest = SuiteDigest {
            run_id: "run-9".to_string(),
            suite_name: "owners".to_string(),
            summary: RunSummary {
                total: 4,
                passed: 3,
                failed: 1,
                skipped: 0,
                duration_ms: 8_000,
            },
            slowest_test: None,
            failed_tests: vec!["a".to_string(), "b".to_string()],
            flaky_count: 0,
        };
        let request = suite_request(&digest);
        assert_eq!(request.template_id, "playwright-suite-report");
        assert_eq!(request.replacements["pass_rate"], "75.0");
        assert_eq!(request.replacements["avg_test_time"], "2s");
        assert_eq!(request.replacements["failed_test_list"], "a\n- b");
    }

    #[tokio::test]
    async fn posts_to_template_endpoint() {
        let seen: Arc<Mutex<Vec<Value>>> = Arc::default();
        let app = Router::new()
            .route(
                "/create-from-template",
                post(|State(seen): State<Arc<Mutex<Vec<Value>>>>, Json(body): Json<Value>| async move {
                    seen.lock().unwrap().push(body);
                    Json(json!({"success": true, "ticket": {"key": "PET-3"}}))
                }),
            )
            .with_state(Arc::clone(&seen));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let client = TicketServiceClient::new(format!("http://{addr}"));
        let context = FailureContext {
            flaky: false,
            success_rate: "new test".to_string(),
        };
        let key = client.report_failure(&failed_test(), &context).await.unwrap();
        assert_eq!(key.as_deref(), Some("PET-3"));

        let seen = seen.lock().unwrap();
        assert_eq!(seen[0]["templateId"], "playwright-test-failure");
        assert_eq!(seen[0]["replacements"]["test_file"], "tests/add-pet-type.spec.ts");
    }
}
