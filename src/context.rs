use std::sync::Arc;

use crate::config::AppConfig;
use crate::events::EventBus;
use crate::services::{FailureReporter, IssueTrackerService, TestRunnerService};
use crate::store::RunStore;

/// Everything the ticket service handlers need.
#[derive(Clone)]
pub struct TicketContext {
    pub project_key: String,
    pub issue_tracker: Arc<dyn IssueTrackerService>,
}

impl TicketContext {
    pub fn new(config: &AppConfig, issue_tracker: Arc<dyn IssueTrackerService>) -> Self {
        Self {
            project_key: config.project_key.clone(),
            issue_tracker,
        }
    }
}

/// Everything the test-runner service handlers need.
#[derive(Clone)]
pub struct RunnerContext {
    pub store: Arc<RunStore>,
    pub runner: Arc<dyn TestRunnerService>,
    pub reporter: Arc<dyn FailureReporter>,
    pub events: EventBus,
    pub auto_tickets: bool,
}

impl RunnerContext {
    pub fn new(
        config: &AppConfig,
        store: Arc<RunStore>,
        runner: Arc<dyn TestRunnerService>,
        reporter: Arc<dyn FailureReporter>,
    ) -> Self {
        Self {
            store,
            runner,
            reporter,
            events: EventBus::new(),
            auto_tickets: config.auto_tickets,
        }
    }
}
