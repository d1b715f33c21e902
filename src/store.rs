use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio::task::JoinHandle;

use crate::domain::run::{RunOptions, RunReport, TestStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub run_id: String,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub options: RunOptions,
    pub exit_code: Option<i32>,
    pub report: Option<RunReport>,
    pub error: Option<String>,
}

impl RunRecord {
    pub fn is_finished(&self) -> bool {
        self.status != RunStatus::Running
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    pub running: usize,
    pub finished: usize,
    pub failed_runs: usize,
    pub tests_executed: u64,
    pub tests_passed: u64,
    pub tests_failed: u64,
    pub tests_skipped: u64,
    pub flaky_tests: usize,
}

impl StoreStats {
    pub fn pass_rate(&self) -> f64 {
        if self.tests_executed == 0 {
            return 0.0;
        }
        self.tests_passed as f64 / self.tests_executed as f64 * 100.0
    }
}

#[derive(Default)]
struct Inner {
    runs: HashMap<String, RunRecord>,
    flaky: BTreeSet<String>,
}

impl Inner {
    /// Forgets flaky tests that no retained run mentions any more.
    fn prune_flaky(&mut self) {
        let runs = &self.runs;
        self.flaky.retain(|name| {
            runs.values()
                .filter_map(|record| record.report.as_ref())
                .any(|report| report.tests.iter().any(|test| &test.test_name == name))
        });
    }
}

/// In-memory registry of test runs. Finished runs expire after `ttl` and only
/// the newest `limit` finished runs are kept; running ones are never evicted.
pub struct RunStore {
    inner: RwLock<Inner>,
    ttl: Duration,
    limit: usize,
}

impl RunStore {
    pub fn new(ttl: Duration, limit: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            ttl,
            limit,
        }
    }

    pub fn insert_running(&self, run_id: &str, options: RunOptions) -> RunRecord {
        let record = RunRecord {
            run_id: run_id.to_string(),
            status: RunStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            options,
            exit_code: None,
            report: None,
            error: None,
        };
        self.inner
            .write()
            .runs
            .insert(run_id.to_string(), record.clone());
        record
    }

    pub fn complete(&self, run_id: &str, report: RunReport, exit_code: Option<i32>) {
        self.finish(run_id, Utc::now(), |record| {
            record.status = RunStatus::Completed;
            record.exit_code = exit_code;
            record.report = Some(report);
        });
    }

    pub fn fail(&self, run_id: &str, error: String) {
        self.finish(run_id, Utc::now(), |record| {
            record.status = RunStatus::Failed;
            record.error = Some(error);
        });
    }

    fn finish(&self, run_id: &str, at: DateTime<Utc>, update: impl FnOnce(&mut RunRecord)) {
        let mut inner = self.inner.write();
        match inner.runs.get_mut(run_id) {
            Some(record) => {
                update(record);
                record.finished_at = Some(at);
            }
            None => {
                tracing::warn!(run_id, "finished run is no longer tracked");
                return;
            }
        }
        Self::enforce_limit(&mut inner, self.limit);
    }

    fn enforce_limit(inner: &mut Inner, limit: usize) {
        let mut finished: Vec<_> = inner
            .runs
            .values()
            .filter_map(|record| record.finished_at.map(|at| (at, record.run_id.clone())))
            .collect();
        if finished.len() <= limit {
            return;
        }
        finished.sort();
        let overflow = finished.len() - limit;
        for (_, run_id) in finished.into_iter().take(overflow) {
            inner.runs.remove(&run_id);
        }
        inner.prune_flaky();
    }

    pub fn get(&self, run_id: &str) -> Option<RunRecord> {
        self.inner.read().runs.get(run_id).cloned()
    }

    pub fn running(&self) -> Vec<RunRecord> {
        let mut runs: Vec<_> = self
            .inner
            .read()
            .runs
            .values()
            .filter(|record| !record.is_finished())
            .cloned()
            .collect();
        runs.sort_by_key(|record| record.started_at);
        runs
    }

    /// Finished runs, newest first.
    pub fn history(&self, limit: usize) -> Vec<RunRecord> {
        let mut runs: Vec<_> = self
            .inner
            .read()
            .runs
            .values()
            .filter(|record| record.is_finished())
            .cloned()
            .collect();
        runs.sort_by(|a, b| b.finished_at.cmp(&a.finished_at));
        runs.truncate(limit);
        runs
    }

    pub fn finished_count(&self) -> usize {
        self.inner
            .read()
            .runs
            .values()
            .filter(|record| record.is_finished())
            .count()
    }

    /// Outcomes of one test across runs finished after `since`.
    pub fn outcomes_since(&self, test_name: &str, since: DateTime<Utc>) -> Vec<TestStatus> {
        let inner = self.inner.read();
        inner
            .runs
            .values()
            .filter(|record| record.finished_at.is_some_and(|at| at >= since))
            .filter_map(|record| record.report.as_ref())
            .flat_map(|report| report.tests.iter())
            .filter(|test| test.test_name == test_name)
            .map(|test| test.status)
            .collect()
    }

    /// Returns true when the test was not known to be flaky before.
    pub fn mark_flaky(&self, test_name: &str) -> bool {
        self.inner.write().flaky.insert(test_name.to_string())
    }

    pub fn is_flaky(&self, test_name: &str) -> bool {
        self.inner.read().flaky.contains(test_name)
    }

    pub fn flaky_tests(&self) -> Vec<String> {
        self.inner.read().flaky.iter().cloned().collect()
    }

    pub fn stats(&self) -> StoreStats {
        let inner = self.inner.read();
        let mut stats = StoreStats {
            flaky_tests: inner.flaky.len(),
            ..Default::default()
        };
        for record in inner.runs.values() {
            match record.status {
                RunStatus::Running => stats.running += 1,
                RunStatus::Completed => stats.finished += 1,
                RunStatus::Failed => {
                    stats.finished += 1;
                    stats.failed_runs += 1;
                }
            }
            if let Some(report) = &record.report {
                stats.tests_executed += report.summary.total;
                stats.tests_passed += report.summary.passed;
                stats.tests_failed += report.summary.failed;
                stats.tests_skipped += report.summary.skipped;
            }
        }
        stats
    }

    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.ttl;
        let mut inner = self.inner.write();
        let before = inner.runs.len();
        inner
            .runs
            .retain(|_, record| record.finished_at.is_none_or(|at| at >= cutoff));
        let removed = before - inner.runs.len();
        if removed > 0 {
            inner.prune_flaky();
        }
        removed
    }

    /// Periodically drops expired runs until the returned task is aborted.
    pub fn spawn_sweeper(self: &Arc<Self>, every: StdDuration) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(every);
            interval.tick().await;
            loop {
                interval.tick().await;
                let removed = store.sweep();
                if removed > 0 {
                    tracing::debug!(removed, "evicted expired test runs");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::run::{RunSummary, TestCaseResult};

    fn report(test_name: &str, status: TestStatus) -> RunReport {
        RunReport {
            summary: RunSummary {
                total: 1,
                passed: u64::from(status == TestStatus::Passed),
                failed: u64::from(status.is_failure()),
                skipped: 0,
                duration_ms: 10,
            },
            tests: vec![TestCaseResult {
                run_id: "r".to_string(),
                test_name: test_name.to_string(),
                test_file: "a.spec.ts".to_string(),
                status,
                duration_ms: 10,
                error: None,
                browser: "chromium".to_string(),
                screenshot: None,
            }],
            fallback: false,
        }
    }

    fn store() -> RunStore {
        RunStore::new(Duration::hours(1), 10)
    }

    #[test]
    fn tracks_run_lifecycle() {
        let store = store();
        store.insert_running("a", RunOptions::default());
        assert_eq!(store.running().len(), 1);
        assert!(store.history(10).is_empty());

        store.complete("a", report("t", TestStatus::Passed), Some(0));
        let record = store.get("a").unwrap();
        assert_eq!(record.status, RunStatus::Completed);
        assert!(record.finished_at.is_some());
        assert!(store.running().is_empty());
        assert_eq!(store.history(10).len(), 1);

        store.insert_running("b", RunOptions::default());
        store.fail("b", "spawn failed".to_string());
        assert_eq!(store.get("b").unwrap().status, RunStatus::Failed);
        assert_eq!(store.stats().failed_runs, 1);
    }

    #[test]
    fn history_is_newest_first_and_limited() {
        let store = store();
        for id in ["1", "2", "3"] {
            store.insert_running(id, RunOptions::default());
            store.complete(id, RunReport::default(), Some(0));
        }
        let history = store.history(2);
        assert_eq!(history.len(), 2);
        assert!(history[0].finished_at >= history[1].finished_at);
    }

    #[test]
    fn evicts_oldest_finished_runs_beyond_limit() {
        let store = RunStore::new(Duration::hours(1), 2);
        store.insert_running("live", RunOptions::default());
        for id in ["1", "2", "3"] {
            store.insert_running(id, RunOptions::default());
            store.finish(id, Utc::now() + Duration::seconds(id.parse().unwrap()), |record| {
                record.status = RunStatus::Completed;
            });
        }
        assert!(store.get("1").is_none());
        assert!(store.get("2").is_some());
        assert!(store.get("3").is_some());
        assert!(store.get("live").is_some());
    }

    #[test]
    fn sweep_removes_only_expired_finished_runs() {
        let store = store();
        store.insert_running("live", RunOptions::default());
        store.insert_running("done", RunOptions::default());
        store.complete("done", RunReport::default(), Some(0));

        assert_eq!(store.sweep(), 0);
        let removed = store.sweep_at(Utc::now() + Duration::hours(2));
        assert_eq!(removed, 1);
        assert!(store.get("done").is_none());
        assert!(store.get("live").is_some());
    }

    #[test]
    fn collects_outcomes_per_test() {
        let store = store();
        let since = Utc::now() - Duration::minutes(1);
        for (id, status) in [("1", TestStatus::Passed), ("2", TestStatus::Failed)] {
            store.insert_running(id, RunOptions::default());
            store.complete(id, report("login", status), Some(0));
        }
        store.insert_running("3", RunOptions::default());
        store.complete("3", report("other", TestStatus::Failed), Some(1));

        let mut outcomes = store.outcomes_since("login", since);
        outcomes.sort_by_key(|status| status.is_failure());
        assert_eq!(outcomes, vec![TestStatus::Passed, TestStatus::Failed]);
        assert!(store.outcomes_since("login", Utc::now() + Duration::minutes(1)).is_empty());
    }

    #[test]
    fn flaky_set_reports_new_entries_once() {
        let store = store();
        assert!(store.mark_flaky("login"));
        assert!(!store.mark_flaky("login"));
        assert!(store.is_flaky("login"));
        assert_eq!(store.flaky_tests(), vec!["login".to_string()]);
        assert_eq!(store.stats().flaky_tests, 1);
    }

    #[test]
    fn expired_evidence_clears_flaky_marks() {
        let store = store();
        store.insert_running("old", RunOptions::default());
        store.complete("old", report("login", TestStatus::Failed), Some(1));
        store.mark_flaky("login");

        store.insert_running("new", RunOptions::default());
        store.finish("new", Utc::now() + Duration::hours(2), |record| {
            record.status = RunStatus::Completed;
            record.report = Some(report("search", TestStatus::Failed));
        });
        store.mark_flaky("search");

        assert_eq!(store.sweep_at(Utc::now() + Duration::minutes(90)), 1);
        assert!(!store.is_flaky("login"));
        assert!(store.is_flaky("search"));
        assert_eq!(store.flaky_tests(), vec!["search".to_string()]);
    }

    #[test]
    fn history_limit_also_prunes_flaky_marks() {
        let store = RunStore::new(Duration::hours(1), 1);
        store.insert_running("1", RunOptions::default());
        store.complete("1", report("login", TestStatus::Failed), Some(1));
        store.mark_flaky("login");

        store.insert_running("2", RunOptions::default());
        store.finish("2", Utc::now() + Duration::seconds(5), |record| {
            record.status = RunStatus::Completed;
            record.report = Some(report("search", TestStatus::Passed));
        });
        assert!(store.get("1").is_none());
        assert!(!store.is_flaky("login"));
    }

    #[tokio::test]
    async fn sweeper_task_can_be_aborted() {
        let store = Arc::new(store());
        let handle = store.spawn_sweeper(StdDuration::from_millis(10));
        tokio::time::sleep(StdDuration::from_millis(30)).await;
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
    }
}
