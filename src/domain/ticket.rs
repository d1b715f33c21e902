use serde::{Deserialize, Serialize};

use crate::domain::catalog;
use crate::domain::template::TicketTemplate;
use crate::error::{AppError, AppResult};

pub const SUB_TASK: &str = "Sub-task";
pub const EPIC: &str = "Epic";

/// Everything needed to open an issue in the tracker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueRequest {
    pub project_key: String,
    pub summary: String,
    pub description: String,
    pub issue_type: String,
    pub priority: String,
    pub assignee: Option<String>,
    pub labels: Vec<String>,
    pub parent_key: Option<String>,
    pub epic_name: Option<String>,
}

impl IssueRequest {
    pub fn validate(&self) -> AppResult<()> {
        if self.summary.trim().is_empty() {
            return Err(AppError::Validation(
                "summary is required to create a ticket".to_string(),
            ));
        }
        if self.project_key.trim().is_empty() {
            return Err(AppError::Validation("project key must not be empty".to_string()));
        }
        if self.is_sub_task() && self.parent_key.as_deref().is_none_or(|key| key.trim().is_empty())
        {
            return Err(AppError::Validation(
                "sub-tasks require a parent key (parentKey)".to_string(),
            ));
        }
        Ok(())
    }

    pub fn is_sub_task(&self) -> bool {
        self.issue_type == SUB_TASK
    }

    pub fn is_epic(&self) -> bool {
        self.issue_type == EPIC
    }

    /// Epics need a name of their own; the summary stands in when none is given.
    pub fn resolved_epic_name(&self) -> Option<&str> {
        if !self.is_epic() {
            return None;
        }
        self.epic_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .or(Some(self.summary.as_str()))
    }

    pub fn apply(&mut self, overrides: TicketOverrides) {
        if let Some(assignee) = overrides.assignee {
            self.assignee = Some(assignee);
        }
        if let Some(priority) = overrides.priority {
            self.priority = priority;
        }
        if let Some(issue_type) = overrides.issue_type {
            self.issue_type = issue_type;
        }
        if let Some(labels) = overrides.labels {
            self.labels = labels;
        }
        if let Some(parent_key) = overrides.parent_key {
            self.parent_key = Some(parent_key);
        }
        if let Some(epic_name) = overrides.epic_name {
            self.epic_name = Some(epic_name);
        }
    }
}

/// Optional field overrides a caller can send alongside a template.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketOverrides {
    pub assignee: Option<String>,
    pub priority: Option<String>,
    pub issue_type: Option<String>,
    pub labels: Option<Vec<String>>,
    pub parent_key: Option<String>,
    pub epic_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ticket {
    pub key: String,
    pub id: String,
    pub url: String,
    #[serde(rename = "self")]
    pub self_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueDetails {
    pub key: String,
    pub summary: String,
    pub description: String,
    pub issue_type: String,
    pub status: String,
    pub priority: String,
    pub assignee: String,
    pub reporter: String,
    pub created: Option<String>,
    pub updated: Option<String>,
    pub labels: Vec<String>,
    pub project: String,
    pub url: String,
    pub comments: usize,
}

/// Outcome of one key in a batch delete.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    pub issue_key: String,
    pub status: DeleteStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeleteStatus {
    Deleted,
    Error,
}

/// Picks a template for free-form ticket text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TicketKind {
    Bug,
    Feature,
    TestAutomation,
    Task,
}

impl TicketKind {
    pub fn classify(title: &str, description: &str) -> Self {
        let title = title.to_lowercase();
        let description = description.to_lowercase();
        let title_has = |words: &[&str]| words.iter().any(|word| title.contains(word));
        let description_has = |words: &[&str]| words.iter().any(|word| description.contains(word));

        if title_has(&["bug", "fehler", "error"])
            || description_has(&["fehlermeldung", "funktioniert nicht", "does not work", "crash"])
        {
            TicketKind::Bug
        } else if title_has(&["feature", "neu", "new"])
            || description_has(&["möchte ich", "user story", "i want", "as a user"])
        {
            TicketKind::Feature
        } else if title_has(&["test"]) || description_has(&["playwright", "automation"]) {
            TicketKind::TestAutomation
        } else {
            TicketKind::Task
        }
    }

    pub fn issue_type(&self) -> &'static str {
        match self {
            TicketKind::Bug => "Bug",
            TicketKind::Feature => "Story",
            TicketKind::TestAutomation | TicketKind::Task => "Aufgabe",
        }
    }

    pub fn template_id(&self, petclinic: bool) -> &'static str {
        match (self, petclinic) {
            (TicketKind::Bug, true) => "petclinic-bug",
            (TicketKind::Bug, false) => "bug-report",
            (TicketKind::Feature, true) => "petclinic-feature",
            (TicketKind::Feature, false) => "feature-request",
            (TicketKind::TestAutomation, _) => "test-automation",
            (TicketKind::Task, _) => "task",
        }
    }

    pub fn template(&self, petclinic: bool) -> AppResult<&'static TicketTemplate> {
        let id = self.template_id(petclinic);
        catalog::find(id).ok_or_else(|| AppError::NotFound(format!("template {id} missing")))
    }
}
