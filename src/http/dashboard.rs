//! Server-rendered overview of the run store.

use std::fmt::Write as _;

use crate::domain::run::format_duration;
use crate::store::{RunRecord, RunStatus, RunStore};

const RECENT_RUNS: usize = 10;

pub fn render(store: &RunStore) -> String {
    let stats = store.stats();
    let running = store.running();
    let recent = store.history(RECENT_RUNS);
    let flaky = store.flaky_tests();

    let mut html = String::with_capacity(4096);
    html.push_str(HEAD);

    let _ = write!(
        html,
        r#"<section class="cards">
<div class="card"><h2>{running}</h2><p>Running</p></div>
<div class="card"><h2>{finished}</h2><p>Finished runs</p></div>
<div class="card"><h2>{executed}</h2><p>Tests executed</p></div>
<div class="card"><h2>{rate:.1}%</h2><p>Pass rate</p></div>
<div class="card"><h2>{failed}</h2><p>Failed tests</p></div>
<div class="card"><h2>{flaky_count}</h2><p>Flaky tests</p></div>
</section>
"#,
        running = stats.running,
        finished = stats.finished,
        executed = stats.tests_executed,
        rate = stats.pass_rate(),
        failed = stats.tests_failed,
        flaky_count = stats.flaky_tests,
    );

    html.push_str("<h3>Active runs</h3>\n");
    push_runs(&mut html, &running, "No runs in progress.");

    html.push_str("<h3>Recent runs</h3>\n");
    push_runs(&mut html, &recent, "No finished runs yet.");

    html.push_str("<h3>Flaky tests</h3>\n");
    if flaky.is_empty() {
        html.push_str("<p class=\"empty\">No flaky tests detected.</p>\n");
    } else {
        html.push_str("<ul>\n");
        for name in &flaky {
            let _ = writeln!(html, "<li>{}</li>", escape(name));
        }
        html.push_str("</ul>\n");
    }

    html.push_str(TAIL);
    html
}

fn push_runs(html: &mut String, runs: &[RunRecord], empty: &str) {
    if runs.is_empty() {
        let _ = writeln!(html, "<p class=\"empty\">{empty}</p>");
        return;
    }
    html.push_str(
        "<table>\n<tr><th>Run</th><th>Suite</th><th>Browser</th><th>Status</th><th>Passed</th><th>Failed</th><th>Duration</th><th>Started</th></tr>\n",
    );
    for run in runs {
        let (passed, failed, duration) = match &run.report {
            Some(report) => (
                report.summary.passed.to_string(),
                report.summary.failed.to_string(),
                format_duration(report.summary.duration_ms),
            ),
            None => ("-".to_string(), "-".to_string(), "-".to_string()),
        };
        let status = match run.status {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        };
        let _ = writeln!(
            html,
            "<tr><td><code>{id}</code></td><td>{suite}</td><td>{browser}</td><td class=\"{status}\">{status}</td><td>{passed}</td><td>{failed}</td><td>{duration}</td><td>{started}</td></tr>",
            id = escape(&run.run_id),
            suite = escape(&run.options.suite_label()),
            browser = escape(run.options.browser_or_default()),
            started = run.started_at.format("%Y-%m-%d %H:%M:%S"),
        );
    }
    html.push_str("</table>\n");
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

const HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>Test runner dashboard</title>
<style>
body { font-family: system-ui, sans-serif; margin: 2rem; color: #222; }
.cards { display: flex; gap: 1rem; flex-wrap: wrap; }
.card { border: 1px solid #ddd; border-radius: 6px; padding: 0.5rem 1.5rem; min-width: 8rem; }
.card h2 { margin: 0.3rem 0; }
table { border-collapse: collapse; width: 100%; }
th, td { text-align: left; padding: 0.3rem 0.6rem; border-bottom: 1px solid #eee; }
.completed { color: #1a7f37; }
.failed { color: #cf222e; }
.running { color: #9a6700; }
.empty { color: #777; }
</style>
</head>
<body>
<h1>Test runner dashboard</h1>
"#;

const TAIL: &str = r#"<script>
const socket = new WebSocket(`ws://${location.host}/ws`);
socket.onmessage = (message) => {
  const data = JSON.parse(message.data);
  if (data.type === "test-event" && data.event !== "test-execution-started") {
    location.reload();
  }
};
</script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::domain::run::{RunOptions, RunReport, RunSummary};

    #[test]
    fn renders_store_contents() {
        let store = RunStore::new(Duration::hours(1), 10);
        store.insert_running(
            "live",
            RunOptions {
                suite: Some("owners".to_string()),
                ..Default::default()
            },
        );
        store.insert_running("done", RunOptions::default());
        store.complete(
            "done",
            RunReport {
                summary: RunSummary {
                    total: 4,
                    passed: 3,
                    failed: 1,
                    skipped: 0,
                    duration_ms: 65_000,
                },
                ..Default::default()
            },
            Some(1),
        );
        store.mark_flaky("<script>alert(1)</script>");

        let html = render(&store);
        assert!(html.contains("75.0%"));
        assert!(html.contains("owners"));
        assert!(html.contains("1m 5s"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(!html.contains("<script>alert(1)</script>"));
    }

    #[test]
    fn empty_store_renders_placeholders() {
        let html = render(&RunStore::new(Duration::hours(1), 10));
        assert!(html.contains("No runs in progress."));
        assert!(html.contains("No flaky tests detected."));
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape(r#"a<b>&"c'"#), "a&lt;b&gt;&amp;&quot;c&#39;");
    }
}
