use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

pub const DEFAULT_BROWSER: &str = "chromium";

/// What the caller asked the test runner to execute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOptions {
    #[serde(default)]
    pub suite: Option<String>,
    #[serde(default)]
    pub tests: Option<Vec<String>>,
    #[serde(default)]
    pub browser: Option<String>,
    #[serde(default = "enabled")]
    pub headless: bool,
    #[serde(default = "enabled")]
    pub parallel: bool,
}

fn enabled() -> bool {
    true
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            suite: None,
            tests: None,
            browser: None,
            headless: true,
            parallel: true,
        }
    }
}

impl RunOptions {
    /// Rejects values that would be read as runner flags instead of test filters.
    pub fn validate(&self) -> AppResult<()> {
        let mut values = self.suite.iter().chain(self.browser.iter());
        if let Some(flag) = values.find(|value| value.trim_start().starts_with('-')) {
            return Err(AppError::Validation(format!("invalid run option: {flag}")));
        }
        if let Some(tests) = &self.tests {
            if let Some(flag) = tests.iter().find(|test| test.trim_start().starts_with('-')) {
                return Err(AppError::Validation(format!("invalid test path: {flag}")));
            }
        }
        Ok(())
    }

    pub fn suite_label(&self) -> String {
        match (&self.suite, &self.tests) {
            (Some(suite), _) if suite != "all" => suite.clone(),
            (_, Some(tests)) if !tests.is_empty() => tests.join(", "),
            _ => "All Tests".to_string(),
        }
    }

    pub fn browser_or_default(&self) -> &str {
        match self.browser.as_deref() {
            Some(browser) if !browser.is_empty() && browser != "all" => browser,
            _ => DEFAULT_BROWSER,
        }
    }

    /// Arguments for `playwright test`, without the launcher prefix.
    pub fn runner_args(&self) -> Vec<String> {
        let mut args = vec!["playwright".to_string(), "test".to_string()];

        match &self.tests {
            Some(tests) if !tests.is_empty() => {
                args.extend(tests.iter().map(|test| test.trim().to_string()));
            }
            _ => {
                if let Some(pattern) = self.suite.as_deref().and_then(suite_pattern) {
                    args.push(pattern);
                }
            }
        }

        if let Some(browser) = self.browser.as_deref() {
            if !browser.is_empty() && browser != "all" {
                args.push("--project".to_string());
                args.push(browser.to_string());
            }
        }

        if !self.headless {
            args.push("--headed".to_string());
        }

        if !self.parallel {
            args.push("--workers".to_string());
            args.push("1".to_string());
        }

        args.push("--reporter".to_string());
        args.push("json".to_string());
        args
    }
}

fn suite_pattern(suite: &str) -> Option<String> {
    let suite = suite.trim();
    let pattern = match suite {
        "" | "all" => return None,
        "pet-types" => "tests/**/pet-type*.spec.ts".to_string(),
        "owners" => "tests/**/owner*.spec.ts".to_string(),
        "pets" => "tests/**/pet*.spec.ts".to_string(),
        "visits" => "tests/**/visit*.spec.ts".to_string(),
        other => format!("tests/**/*{other}*.spec.ts"),
    };
    Some(pattern)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TestStatus {
    Passed,
    Failed,
    TimedOut,
    Skipped,
    Interrupted,
}

impl TestStatus {
    pub fn from_report(value: &str) -> Self {
        match value {
            "passed" | "expected" | "flaky" => TestStatus::Passed,
            "timedOut" => TestStatus::TimedOut,
            "skipped" => TestStatus::Skipped,
            "interrupted" => TestStatus::Interrupted,
            _ => TestStatus::Failed,
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, TestStatus::Failed | TestStatus::TimedOut)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseResult {
    pub run_id: String,
    pub test_name: String,
    pub test_file: String,
    pub status: TestStatus,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub browser: String,
    pub screenshot: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total: u64,
    pub passed: u64,
    pub failed: u64,
    pub skipped: u64,
    pub duration_ms: u64,
}

impl RunSummary {
    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.passed as f64 / self.total as f64 * 100.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub summary: RunSummary,
    pub tests: Vec<TestCaseResult>,
    /// Set when the runner output was not a JSON report.
    pub fallback: bool,
}

impl RunReport {
    pub fn failures(&self) -> impl Iterator<Item = &TestCaseResult> {
        self.tests.iter().filter(|test| test.status.is_failure())
    }

    pub fn slowest(&self) -> Option<&TestCaseResult> {
        self.tests.iter().max_by_key(|test| test.duration_ms)
    }
}

/// Short label for the usual Playwright failure messages.
pub fn error_condition(message: Option<&str>) -> &'static str {
    let Some(message) = message else {
        return "unknown failure";
    };
    let lower = message.to_lowercase();
    if lower.contains("timeout") {
        "element timeout"
    } else if lower.contains("not found") {
        "element not found"
    } else if lower.contains("not visible") {
        "element not visible"
    } else if lower.contains("not attached") {
        "element detached from DOM"
    } else if lower.contains("network") {
        "network error"
    } else {
        "generic test failure"
    }
}

pub fn format_duration(ms: u64) -> String {
    if ms == 0 {
        return "unknown".to_string();
    }
    let seconds = ms / 1000;
    let minutes = seconds / 60;
    if minutes > 0 {
        format!("{minutes}m {}s", seconds % 60)
    } else {
        format!("{seconds}s")
    }
}
