use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    response::Html,
    routing::{get, post},
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};

use crate::context::RunnerContext;
use crate::domain::run::RunOptions;
use crate::http::dashboard;
use crate::http::error::{ApiError, ApiResult, JsonBody};
use crate::http::ws;
use crate::store::{RunRecord, RunStatus};
use crate::workflow::runs::{self, ManualFailure};

pub type SharedRunner = Arc<RunnerContext>;

const DEFAULT_HISTORY_LIMIT: usize = 10;

#[derive(Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<String>,
}

impl HistoryQuery {
    /// Anything that is not a positive number falls back to the default.
    fn limit(&self) -> usize {
        self.limit
            .as_deref()
            .and_then(|raw| raw.trim().parse::<usize>().ok())
            .filter(|limit| *limit > 0)
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
    }
}

pub fn runner_router() -> Router<SharedRunner> {
    Router::new()
        .route("/health", get(health))
        .route("/playwright/run-tests", post(run_tests))
        .route("/playwright/run-suite/{suite}", post(run_suite))
        .route("/playwright/status/{run_id}", get(run_status))
        .route("/playwright/results/{run_id}", get(run_results))
        .route("/playwright/active-runs", get(active_runs))
        .route("/playwright/flaky-tests", get(flaky_tests))
        .route("/playwright/history", get(history))
        .route("/playwright/create-bug-ticket", post(create_bug_ticket))
        .route("/dashboard", get(show_dashboard))
        .route("/ws", get(ws::ws_handler))
}

async fn health(State(ctx): State<SharedRunner>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "test-runner",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now(),
        "activeRuns": ctx.store.running().len(),
        "flakyTests": ctx.store.flaky_tests().len(),
    }))
}

fn parse_options(body: &Bytes) -> ApiResult<RunOptions> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(RunOptions::default());
    }
    serde_json::from_slice(body)
        .map_err(|err| ApiError::BadRequest(format!("invalid run options: {err}")))
}

async fn run_tests(State(ctx): State<SharedRunner>, body: Bytes) -> ApiResult<Json<Value>> {
    let options = parse_options(&body)?;
    let record = runs::start_run(&ctx, options)?;
    Ok(Json(json!({
        "success": true,
        "runId": record.run_id,
        "status": "started",
        "message": "tests started",
        "websocket": "/ws",
    })))
}

async fn run_suite(
    State(ctx): State<SharedRunner>,
    Path(suite): Path<String>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let mut options = parse_options(&body)?;
    options.suite = Some(suite.clone());
    options.tests = None;
    let record = runs::start_run(&ctx, options)?;
    Ok(Json(json!({
        "success": true,
        "runId": record.run_id,
        "suite": suite,
        "status": "started",
    })))
}

fn find_run(ctx: &RunnerContext, run_id: &str) -> ApiResult<RunRecord> {
    ctx.store
        .get(run_id)
        .ok_or_else(|| ApiError::NotFound(format!("test run {run_id} not found")))
}

async fn run_status(
    State(ctx): State<SharedRunner>,
    Path(run_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let record = find_run(&ctx, &run_id)?;
    Ok(Json(json!({
        "runId": record.run_id,
        "status": record.status,
        "startTime": record.started_at,
        "finishedAt": record.finished_at,
        "options": record.options,
        "results": record.report.as_ref().map(|report| &report.summary),
        "error": record.error,
    })))
}

async fn run_results(
    State(ctx): State<SharedRunner>,
    Path(run_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let record = find_run(&ctx, &run_id)?;
    match record.status {
        RunStatus::Running => Err(ApiError::NotFound(format!(
            "results for test run {run_id} are not available yet"
        ))),
        RunStatus::Completed | RunStatus::Failed => Ok(Json(json!({
            "runId": record.run_id,
            "status": record.status,
            "results": record.report,
            "error": record.error,
            "timestamp": record.finished_at,
        }))),
    }
}

async fn active_runs(State(ctx): State<SharedRunner>) -> Json<Value> {
    let runs: Vec<Value> = ctx
        .store
        .running()
        .into_iter()
        .map(|record| {
            json!({
                "runId": record.run_id,
                "status": record.status,
                "startTime": record.started_at,
                "options": record.options,
            })
        })
        .collect();
    Json(json!({ "total": runs.len(), "activeRuns": runs }))
}

async fn flaky_tests(State(ctx): State<SharedRunner>) -> Json<Value> {
    let flaky = ctx.store.flaky_tests();
    Json(json!({ "total": flaky.len(), "flakyTests": flaky }))
}

async fn history(
    State(ctx): State<SharedRunner>,
    Query(query): Query<HistoryQuery>,
) -> Json<Value> {
    let entries: Vec<Value> = ctx
        .store
        .history(query.limit())
        .into_iter()
        .map(|record| {
            json!({
                "runId": record.run_id,
                "status": record.status,
                "timestamp": record.finished_at,
                "summary": record.report.as_ref().map(|report| &report.summary),
                "options": record.options,
            })
        })
        .collect();
    Json(json!({ "history": entries, "total": ctx.store.finished_count() }))
}

async fn create_bug_ticket(
    State(ctx): State<SharedRunner>,
    body: JsonBody<ManualFailure>,
) -> ApiResult<Json<Value>> {
    let Json(failure) = body?;
    let key = runs::report_failure_manually(&ctx, failure).await?;
    Ok(Json(json!({ "success": true, "ticket": key })))
}

async fn show_dashboard(State(ctx): State<SharedRunner>) -> Html<String> {
    Html(dashboard::render(&ctx.store))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::domain::run::RunReport;
    use crate::events::EventBus;
    use crate::store::RunStore;
    use crate::workflow::runs::fakes::{RecordingReporter, ScriptedRunner, output, report_json};

    fn context(runner: ScriptedRunner) -> (SharedRunner, Arc<RecordingReporter>) {
        let reporter = Arc::new(RecordingReporter::default());
        let ctx = Arc::new(RunnerContext {
            store: Arc::new(RunStore::new(chrono::Duration::hours(1), 50)),
            runner: Arc::new(runner),
            reporter: reporter.clone(),
            events: EventBus::new(),
            auto_tickets: false,
        });
        (ctx, reporter)
    }

    async fn send(ctx: &SharedRunner, request: Request<Body>) -> (StatusCode, Value) {
        let app = runner_router().with_state(Arc::clone(ctx));
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn wait_until_finished(ctx: &SharedRunner, run_id: &str) {
        for _ in 0..100 {
            if ctx.store.get(run_id).is_some_and(|run| run.is_finished()) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("run {run_id} did not finish");
    }

    #[test]
    fn history_limit_defaults_to_ten() {
        let query = |limit: Option<&str>| HistoryQuery {
            limit: limit.map(str::to_string),
        };
        assert_eq!(query(None).limit(), 10);
        assert_eq!(query(Some("abc")).limit(), 10);
        assert_eq!(query(Some("0")).limit(), 10);
        assert_eq!(query(Some("3")).limit(), 3);
    }

    #[tokio::test]
    async fn health_reports_counts() {
        let (ctx, _) = context(ScriptedRunner::default());
        ctx.store.insert_running("r1", RunOptions::default());
        ctx.store.mark_flaky("login");
        let (status, body) = send(&ctx, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["activeRuns"], 1);
        assert_eq!(body["flakyTests"], 1);
    }

    #[tokio::test]
    async fn run_tests_starts_a_run_and_exposes_results() {
        let stdout = report_json(&[("lists owners", "passed")]);
        let (ctx, _) = context(ScriptedRunner::with([output(stdout, 0)]));

        let (status, body) = send(&ctx, post("/playwright/run-tests", r#"{"browser":"firefox"}"#)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "started");
        let run_id = body["runId"].as_str().unwrap().to_string();

        wait_until_finished(&ctx, &run_id).await;

        let (status, body) = send(&ctx, get(&format!("/playwright/status/{run_id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "completed");
        assert_eq!(body["options"]["browser"], "firefox");
        assert_eq!(body["results"]["passed"], 1);

        let (status, body) = send(&ctx, get(&format!("/playwright/results/{run_id}"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["results"]["tests"][0]["testName"], "lists owners");

        let (_, body) = send(&ctx, get("/playwright/history?limit=5")).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["history"][0]["runId"], run_id.as_str());
    }

    #[tokio::test]
    async fn run_suite_accepts_empty_body() {
        let (ctx, _) = context(ScriptedRunner::default());
        let request = Request::builder()
            .method("POST")
            .uri("/playwright/run-suite/owners")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&ctx, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["suite"], "owners");

        let run_id = body["runId"].as_str().unwrap().to_string();
        wait_until_finished(&ctx, &run_id).await;
        let record = ctx.store.get(&run_id).unwrap();
        assert_eq!(record.options.suite.as_deref(), Some("owners"));
        assert_eq!(record.status, RunStatus::Failed);
    }

    #[tokio::test]
    async fn rejects_bad_run_options() {
        let (ctx, _) = context(ScriptedRunner::default());
        let (status, _) = send(&ctx, post("/playwright/run-tests", "{not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&ctx, post("/playwright/run-tests", r#"{"browser":"--debug"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("--debug"));
    }

    #[tokio::test]
    async fn unknown_runs_are_404() {
        let (ctx, _) = context(ScriptedRunner::default());
        let (status, _) = send(&ctx, get("/playwright/status/missing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&ctx, get("/playwright/results/missing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        ctx.store.insert_running("live", RunOptions::default());
        let (status, _) = send(&ctx, get("/playwright/results/live")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn lists_active_runs_and_flaky_tests() {
        let (ctx, _) = context(ScriptedRunner::default());
        ctx.store.insert_running("live", RunOptions::default());
        ctx.store.insert_running("done", RunOptions::default());
        ctx.store.complete("done", RunReport::default(), Some(0));
        ctx.store.mark_flaky("adds visit");

        let (_, body) = send(&ctx, get("/playwright/active-runs")).await;
        assert_eq!(body["total"], 1);
        assert_eq!(body["activeRuns"][0]["runId"], "live");

        let (_, body) = send(&ctx, get("/playwright/flaky-tests")).await;
        assert_eq!(body["flakyTests"][0], "adds visit");
    }

    #[tokio::test]
    async fn creates_manual_bug_ticket() {
        let (ctx, reporter) = context(ScriptedRunner::default());
        let (status, body) = send(
            &ctx,
            post(
                "/playwright/create-bug-ticket",
                r#"{"testName":"adds pet","error":"Timeout 30000ms exceeded","browser":"webkit"}"#,
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ticket"], "PET-1");
        assert_eq!(reporter.failures.lock()[0].0.browser, "webkit");

        let (status, _) = send(&ctx, post("/playwright/create-bug-ticket", "{}")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&ctx, post("/playwright/create-bug-ticket", "[1, 2")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn dashboard_renders_html() {
        let (ctx, _) = context(ScriptedRunner::default());
        let app = runner_router().with_state(Arc::clone(&ctx));
        let response = app.oneshot(get("/dashboard")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("<html"));
    }

    #[tokio::test]
    async fn websocket_route_requires_upgrade() {
        let (ctx, _) = context(ScriptedRunner::default());
        let app = runner_router().with_state(Arc::clone(&ctx));
        let response = app.oneshot(get("/ws")).await.unwrap();
        assert!(response.status().is_client_error());
    }
}
