pub mod failure_reporter;
pub mod issue_tracker;
pub mod test_runner;

pub use failure_reporter::{FailureContext, FailureReporter, SuiteDigest};
pub use issue_tracker::IssueTrackerService;
pub use test_runner::{RunnerOutput, TestRunnerService};
