use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::TicketContext;
use crate::domain::catalog;
use crate::domain::template::{RenderedTicket, ReplacementSet, TicketTemplate, truncate_summary};
use crate::domain::ticket::{
    DeleteOutcome, DeleteStatus, IssueDetails, IssueRequest, Ticket, TicketKind, TicketOverrides,
};
use crate::error::{AppError, AppResult};

const FALLBACK_SUMMARY: &str = "New ticket";
const AUTO_LABEL: &str = "auto-created";
const DEFAULT_ISSUE_TYPE: &str = "Task";
const DEFAULT_PRIORITY: &str = "Medium";

const TITLE_KEYS: &[&str] = &["TITEL", "TITLE", "KURZE_BESCHREIBUNG", "KURZE BESCHREIBUNG"];
const DESCRIPTION_KEYS: &[&str] = &[
    "BESCHREIBUNG",
    "DESCRIPTION",
    "PROBLEM_BESCHREIBUNG",
    "TEST_BESCHREIBUNG",
    "FEATURE_BESCHREIBUNG",
];

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateTicketInput {
    pub template_id: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub replacements: BTreeMap<String, Value>,
    pub project_key: Option<String>,
    #[serde(default)]
    pub custom_fields: TicketOverrides,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateTicketOutcome {
    pub ticket: Ticket,
    pub template_used: &'static str,
    pub template_name: &'static str,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartTicketInput {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub context: SmartContext,
    pub project_key: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SmartContext {
    #[serde(default)]
    pub petclinic: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmartTicketOutcome {
    pub ticket: Ticket,
    pub detected_template: &'static str,
    pub detected_type: &'static str,
    pub template_name: &'static str,
}

/// Body of a direct ticket creation; anything left out gets a default.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueDraft {
    pub project_key: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub issue_type: Option<String>,
    pub priority: Option<String>,
    pub assignee: Option<String>,
    pub labels: Option<Vec<String>>,
    pub parent_key: Option<String>,
    pub epic_name: Option<String>,
}

impl IssueDraft {
    pub fn into_request(self, default_project: &str) -> IssueRequest {
        IssueRequest {
            project_key: self
                .project_key
                .unwrap_or_else(|| default_project.to_string()),
            summary: self.summary.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            issue_type: self
                .issue_type
                .unwrap_or_else(|| DEFAULT_ISSUE_TYPE.to_string()),
            priority: self
                .priority
                .unwrap_or_else(|| DEFAULT_PRIORITY.to_string()),
            assignee: self.assignee.filter(|assignee| !assignee.trim().is_empty()),
            labels: self.labels.unwrap_or_default(),
            parent_key: self.parent_key,
            epic_name: self.epic_name,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDeleteOutcome {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<DeleteOutcome>,
}

fn lookup_template(template_id: Option<&str>) -> AppResult<&'static TicketTemplate> {
    let available = || catalog::ids().join(", ");
    let id = template_id
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| {
            AppError::Validation(format!("templateId is required; available templates: {}", available()))
        })?;
    catalog::find(id).ok_or_else(|| {
        AppError::Validation(format!("template {id} not found; available templates: {}", available()))
    })
}

fn replacement_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(text) => Some(text.clone()),
        other => Some(other.to_string()),
    }
}

/// Caller replacements with the values derived from title and description laid over them.
fn replacements_for(input: &TemplateTicketInput) -> ReplacementSet {
    let mut set: ReplacementSet = input
        .replacements
        .iter()
        .filter_map(|(key, value)| replacement_text(value).map(|text| (key.as_str(), text)))
        .collect();

    if let Some(title) = input.title.as_deref().filter(|title| !title.trim().is_empty()) {
        for key in TITLE_KEYS {
            set.insert(key, title);
        }
    }
    if let Some(description) = input
        .description
        .as_deref()
        .filter(|description| !description.trim().is_empty())
    {
        for key in DESCRIPTION_KEYS {
            set.insert(key, description);
        }
    }
    set
}

/// Renders a template the way ticket creation does, including the summary fallback.
pub fn render_template(
    input: &TemplateTicketInput,
) -> AppResult<(&'static TicketTemplate, RenderedTicket)> {
    let template = lookup_template(input.template_id.as_deref())?;
    let mut rendered = template.render(&replacements_for(input));

    if rendered.summary.trim().is_empty() || rendered.summary.trim() == template.name {
        let title = input
            .title
            .as_deref()
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .unwrap_or(FALLBACK_SUMMARY);
        rendered.summary = truncate_summary(title);
    }
    Ok((template, rendered))
}

pub async fn create_from_template(
    ctx: &TicketContext,
    input: TemplateTicketInput,
) -> AppResult<TemplateTicketOutcome> {
    let (template, rendered) = render_template(&input)?;

    let mut request = IssueRequest {
        project_key: input
            .project_key
            .unwrap_or_else(|| ctx.project_key.clone()),
        summary: rendered.summary,
        description: rendered.description,
        issue_type: template.issue_type.to_string(),
        priority: template.priority.to_string(),
        assignee: None,
        labels: template.labels.iter().map(|label| label.to_string()).collect(),
        parent_key: None,
        epic_name: None,
    };
    request.apply(input.custom_fields);

    tracing::info!(template = template.id, "creating ticket from template");
    let ticket = create_ticket(ctx, request).await?;
    Ok(TemplateTicketOutcome {
        ticket,
        template_used: template.id,
        template_name: template.name,
    })
}

pub async fn create_smart_ticket(
    ctx: &TicketContext,
    input: SmartTicketInput,
) -> AppResult<SmartTicketOutcome> {
    let title = input
        .title
        .filter(|title| !title.trim().is_empty())
        .ok_or_else(|| AppError::Validation("title is required".to_string()))?;
    let description = input.description.unwrap_or_default();

    let kind = TicketKind::classify(&title, &description);
    let template = kind.template(input.context.petclinic)?;

    let mut labels: Vec<String> = template.labels.iter().map(|label| label.to_string()).collect();
    labels.push(AUTO_LABEL.to_string());

    let request = IssueRequest {
        project_key: input
            .project_key
            .unwrap_or_else(|| ctx.project_key.clone()),
        summary: truncate_summary(title.trim()),
        description: format!(
            "{description}\n\n---\n*Created with auto template: {}*",
            template.name
        ),
        issue_type: kind.issue_type().to_string(),
        priority: template.priority.to_string(),
        assignee: None,
        labels,
        parent_key: None,
        epic_name: None,
    };

    tracing::info!(template = template.id, "creating smart ticket");
    let ticket = create_ticket(ctx, request).await?;
    Ok(SmartTicketOutcome {
        ticket,
        detected_template: template.id,
        detected_type: kind.issue_type(),
        template_name: template.name,
    })
}

pub async fn create_ticket(ctx: &TicketContext, request: IssueRequest) -> AppResult<Ticket> {
    request.validate()?;
    let ticket = ctx.issue_tracker.create_issue(&request).await?;
    tracing::info!(key = %ticket.key, "ticket created");
    Ok(ticket)
}

pub async fn get_ticket(ctx: &TicketContext, key: &str) -> AppResult<IssueDetails> {
    ctx.issue_tracker.fetch_issue(key).await
}

pub async fn delete_ticket(ctx: &TicketContext, key: &str) -> AppResult<()> {
    ctx.issue_tracker.delete_issue(key).await
}

/// Deletes every key independently; a failing key never stops the batch.
pub async fn batch_delete(ctx: &TicketContext, keys: &[String]) -> AppResult<BatchDeleteOutcome> {
    if keys.is_empty() {
        return Err(AppError::Validation(
            "issueKeys must be a non-empty array".to_string(),
        ));
    }

    let mut results = Vec::with_capacity(keys.len());
    for key in keys {
        let outcome = match ctx.issue_tracker.delete_issue(key).await {
            Ok(()) => DeleteOutcome {
                issue_key: key.clone(),
                status: DeleteStatus::Deleted,
                error: None,
            },
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "failed to delete ticket");
                DeleteOutcome {
                    issue_key: key.clone(),
                    status: DeleteStatus::Error,
                    error: Some(err.to_string()),
                }
            }
        };
        results.push(outcome);
    }

    let successful = results
        .iter()
        .filter(|result| result.status == DeleteStatus::Deleted)
        .count();
    Ok(BatchDeleteOutcome {
        total: keys.len(),
        successful,
        failed: keys.len() - successful,
        results,
    })
}
