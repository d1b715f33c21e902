//! Parsing of the Playwright JSON reporter output.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use crate::domain::run::{RunOptions, RunReport, RunSummary, TestCaseResult, TestStatus};
use crate::error::{AppError, AppResult};

static PASSED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+) passed").unwrap_or_else(|err| panic!("invalid pattern: {err}"))
});

static FAILED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\d+) failed").unwrap_or_else(|err| panic!("invalid pattern: {err}"))
});

#[derive(Deserialize, Default)]
#[serde(default)]
struct JsonReport {
    stats: Option<JsonStats>,
    suites: Vec<JsonSuite>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct JsonStats {
    total: Option<u64>,
    passed: Option<u64>,
    failed: Option<u64>,
    expected: Option<u64>,
    unexpected: Option<u64>,
    flaky: Option<u64>,
    skipped: Option<u64>,
    duration: Option<f64>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct JsonSuite {
    title: String,
    file: Option<String>,
    specs: Vec<JsonSpec>,
    suites: Vec<JsonSuite>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct JsonSpec {
    title: String,
    file: Option<String>,
    tests: Vec<JsonTest>,
}

#[derive(Deserialize, Default)]
#[serde(default, rename_all = "camelCase")]
struct JsonTest {
    title: Option<String>,
    project_name: Option<String>,
    results: Vec<JsonResult>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct JsonResult {
    status: String,
    duration: f64,
    error: Option<JsonError>,
    attachments: Vec<JsonAttachment>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct JsonError {
    message: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct JsonAttachment {
    name: String,
    path: Option<String>,
}

/// Parses runner stdout, falling back to counting the list reporter's totals.
pub fn parse_output(output: &str, run_id: &str, options: &RunOptions) -> RunReport {
    match parse_json(output, run_id, options) {
        Ok(report) => report,
        Err(err) => {
            tracing::warn!(run_id, error = %err, "runner output is not a JSON report, counting totals");
            count_totals(output)
        }
    }
}

/// Cuts the text down to the outermost braces; the runner may print around the report.
fn json_slice(output: &str) -> Option<&str> {
    let start = output.find('{')?;
    let end = output.rfind('}')?;
    (end > start).then(|| &output[start..=end])
}

fn parse_json(output: &str, run_id: &str, options: &RunOptions) -> AppResult<RunReport> {
    let slice = json_slice(output)
        .ok_or_else(|| AppError::TestRunner("no JSON object in runner output".to_string()))?;
    let report: JsonReport = serde_json::from_str(slice)?;

    let mut tests = Vec::new();
    for suite in &report.suites {
        collect_suite(suite, run_id, options, &mut tests);
    }

    let summary = match &report.stats {
        Some(stats) => summary_from_stats(stats),
        None => summary_from_tests(&tests),
    };

    Ok(RunReport {
        summary,
        tests,
        fallback: false,
    })
}

fn collect_suite(
    suite: &JsonSuite,
    run_id: &str,
    options: &RunOptions,
    out: &mut Vec<TestCaseResult>,
) {
    for spec in &suite.specs {
        let file = spec
            .file
            .clone()
            .or_else(|| suite.file.clone())
            .unwrap_or_else(|| suite.title.clone());
        for test in &spec.tests {
            let test_name = match test.title.as_deref() {
                Some(title) if !title.is_empty() => format!("{} - {}", spec.title, title),
                _ => spec.title.clone(),
            };
            let browser = test
                .project_name
                .clone()
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| options.browser_or_default().to_string());

            for result in &test.results {
                out.push(TestCaseResult {
                    run_id: run_id.to_string(),
                    test_name: test_name.clone(),
                    test_file: file.clone(),
                    status: TestStatus::from_report(&result.status),
                    duration_ms: result.duration.max(0.0).round() as u64,
                    error: result.error.as_ref().and_then(|err| err.message.clone()),
                    browser: browser.clone(),
                    screenshot: result
                        .attachments
                        .iter()
                        .find(|attachment| attachment.name == "screenshot")
                        .and_then(|attachment| attachment.path.clone()),
                });
            }
        }
    }
    for child in &suite.suites {
        collect_suite(child, run_id, options, out);
    }
}

fn summary_from_stats(stats: &JsonStats) -> RunSummary {
    let flaky = stats.flaky.unwrap_or(0);
    let passed = stats
        .passed
        .unwrap_or_else(|| stats.expected.unwrap_or(0) + flaky);
    let failed = stats.failed.or(stats.unexpected).unwrap_or(0);
    let skipped = stats.skipped.unwrap_or(0);
    RunSummary {
        total: stats.total.unwrap_or(passed + failed + skipped),
        passed,
        failed,
        skipped,
        duration_ms: stats.duration.unwrap_or(0.0).max(0.0).round() as u64,
    }
}

fn summary_from_tests(tests: &[TestCaseResult]) -> RunSummary {
    let mut summary = RunSummary::default();
    for test in tests {
        summary.total += 1;
        summary.duration_ms += test.duration_ms;
        match test.status {
            TestStatus::Passed => summary.passed += 1,
            TestStatus::Skipped => summary.skipped += 1,
            TestStatus::Failed | TestStatus::TimedOut | TestStatus::Interrupted => {
                summary.failed += 1
            }
        }
    }
    summary
}

fn count_totals(output: &str) -> RunReport {
    let count = |pattern: &Regex| {
        pattern
            .captures(output)
            .and_then(|caps| caps[1].parse::<u64>().ok())
            .unwrap_or(0)
    };
    let passed = count(&PASSED);
    let failed = count(&FAILED);
    RunReport {
        summary: RunSummary {
            total: passed + failed,
            passed,
            failed,
            skipped: 0,
            duration_ms: 0,
        },
        tests: Vec::new(),
        fallback: true,
    }
}
