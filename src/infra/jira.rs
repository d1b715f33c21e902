use std::collections::BTreeMap;

use async_trait::async_trait;
use base64::prelude::{BASE64_STANDARD, Engine as _};
use reqwest::{
    Client, Response, StatusCode,
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::ticket::{IssueDetails, IssueRequest, Ticket};
use crate::error::{AppError, AppResult};
use crate::services::IssueTrackerService;

pub struct JiraClient {
    http: Client,
    base_url: Option<String>,
    username: Option<String>,
    password: Option<String>,
    epic_name_field: String,
}

impl JiraClient {
    pub fn new(
        base_url: Option<String>,
        username: Option<String>,
        password: Option<String>,
        epic_name_field: String,
    ) -> Self {
        Self {
            http: Client::new(),
            base_url,
            username,
            password,
            epic_name_field,
        }
    }

    fn api_details(&self) -> AppResult<(&str, &str, &str)> {
        let base_url = self
            .base_url
            .as_deref()
            .ok_or_else(|| AppError::Configuration("Jira base URL not configured".to_string()))?;
        let username = self
            .username
            .as_deref()
            .ok_or_else(|| AppError::Configuration("Jira username not configured".to_string()))?;
        let password = self
            .password
            .as_deref()
            .ok_or_else(|| AppError::Configuration("Jira password not configured".to_string()))?;
        Ok((base_url, username, password))
    }

    fn auth_header(username: &str, password: &str) -> String {
        let credentials = format!("{username}:{password}");
        let encoded = BASE64_STANDARD.encode(credentials);
        format!("Basic {encoded}")
    }

    fn issue_endpoint(base_url: &str) -> String {
        format!("{}/rest/api/2/issue", base_url.trim_end_matches('/'))
    }

    fn browse_url(base_url: &str, key: &str) -> String {
        format!("{}/browse/{}", base_url.trim_end_matches('/'), key)
    }

    /// Issue keys end up in the request path, so only `PROJ-123` style keys and ids pass.
    fn checked_key(key: &str) -> AppResult<&str> {
        let key = key.trim();
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(key)
        } else {
            Err(AppError::Validation(format!("invalid issue key: {key}")))
        }
    }

    async fn upstream_error(response: Response) -> AppError {
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unable to read response>".to_string());
        AppError::Upstream { status, body }
    }
}

fn transport_error(err: reqwest::Error) -> AppError {
    AppError::IssueTracker(format!("failed to call Jira: {err}"))
}

#[async_trait]
impl IssueTrackerService for JiraClient {
    async fn create_issue(&self, request: &IssueRequest) -> AppResult<Ticket> {
        request.validate()?;
        let (base_url, username, password) = self.api_details()?;
        let body = JiraCreateIssueRequest::new(request, &self.epic_name_field);

        tracing::debug!(
            project = %request.project_key,
            issue_type = %request.issue_type,
            "creating Jira issue"
        );

        let response = self
            .http
            .post(Self::issue_endpoint(base_url))
            .header(AUTHORIZATION, Self::auth_header(username, password))
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(Self::upstream_error(response).await);
        }

        let payload: JiraCreateIssueResponse = response.json().await.map_err(|err| {
            AppError::IssueTracker(format!("failed to parse Jira response: {err}"))
        })?;

        Ok(Ticket {
            url: Self::browse_url(base_url, &payload.key),
            key: payload.key,
            id: payload.id,
            self_url: payload.self_url,
        })
    }

    async fn fetch_issue(&self, key: &str) -> AppResult<IssueDetails> {
        let key = Self::checked_key(key)?;
        let (base_url, username, password) = self.api_details()?;

        let response = self
            .http
            .get(format!("{}/{key}", Self::issue_endpoint(base_url)))
            .header(AUTHORIZATION, Self::auth_header(username, password))
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(transport_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(AppError::NotFound(format!("ticket {key} not found")));
        }
        if !response.status().is_success() {
            return Err(Self::upstream_error(response).await);
        }

        let issue: JiraIssue = response.json().await.map_err(|err| {
            AppError::IssueTracker(format!("failed to parse Jira issue: {err}"))
        })?;
        Ok(issue.into_details(base_url))
    }

    async fn delete_issue(&self, key: &str) -> AppResult<()> {
        let key = Self::checked_key(key)?;
        let (base_url, username, password) = self.api_details()?;

        let response = self
            .http
            .delete(format!("{}/{key}", Self::issue_endpoint(base_url)))
            .header(AUTHORIZATION, Self::auth_header(username, password))
            .send()
            .await
            .map_err(transport_error)?;

        if !response.status().is_success() {
            return Err(Self::upstream_error(response).await);
        }
        tracing::info!(key, "deleted Jira issue");
        Ok(())
    }
}

#[derive(Serialize)]
struct JiraCreateIssueRequest {
    fields: JiraCreateIssueFields,
}

impl JiraCreateIssueRequest {
    fn new(request: &IssueRequest, epic_name_field: &str) -> Self {
        let mut extra = BTreeMap::new();
        if let Some(epic_name) = request.resolved_epic_name() {
            extra.insert(epic_name_field.to_string(), Value::String(epic_name.to_string()));
        }

        Self {
            fields: JiraCreateIssueFields {
                project: JiraKey {
                    key: request.project_key.trim().to_string(),
                },
                summary: request.summary.clone(),
                description: request.description.clone(),
                issuetype: JiraName {
                    name: request.issue_type.clone(),
                },
                priority: JiraName {
                    name: request.priority.clone(),
                },
                parent: request
                    .parent_key
                    .as_ref()
                    .filter(|_| request.is_sub_task())
                    .map(|key| JiraKey { key: key.clone() }),
                assignee: request
                    .assignee
                    .as_ref()
                    .filter(|name| !name.trim().is_empty())
                    .map(|name| JiraName { name: name.clone() }),
                labels: request.labels.clone(),
                extra,
            },
        }
    }
}

#[derive(Serialize)]
struct JiraCreateIssueFields {
    project: JiraKey,
    summary: String,
    description: String,
    issuetype: JiraName,
    priority: JiraName,
    #[serde(skip_serializing_if = "Option::is_none")]
    parent: Option<JiraKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    assignee: Option<JiraName>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    labels: Vec<String>,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

#[derive(Serialize)]
struct JiraKey {
    key: String,
}

#[derive(Serialize)]
struct JiraName {
    name: String,
}

#[derive(Deserialize)]
struct JiraCreateIssueResponse {
    id: String,
    key: String,
    #[serde(rename = "self")]
    self_url: Option<String>,
}

#[derive(Deserialize)]
struct JiraIssue {
    key: String,
    #[serde(default)]
    fields: JiraIssueFields,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct JiraIssueFields {
    summary: Option<String>,
    description: Option<String>,
    issuetype: Option<JiraNamed>,
    status: Option<JiraNamed>,
    priority: Option<JiraNamed>,
    assignee: Option<JiraUser>,
    reporter: Option<JiraUser>,
    created: Option<String>,
    updated: Option<String>,
    labels: Vec<String>,
    project: Option<JiraProjectRef>,
    comment: Option<JiraComments>,
}

#[derive(Deserialize)]
struct JiraNamed {
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JiraUser {
    display_name: String,
}

#[derive(Deserialize)]
struct JiraProjectRef {
    key: String,
}

#[derive(Deserialize)]
struct JiraComments {
    #[serde(default)]
    comments: Vec<Value>,
}

impl JiraIssue {
    fn into_details(self, base_url: &str) -> IssueDetails {
        let fields = self.fields;
        let named = |value: Option<JiraNamed>, fallback: &str| {
            value.map(|v| v.name).unwrap_or_else(|| fallback.to_string())
        };
        let user = |value: Option<JiraUser>, fallback: &str| {
            value
                .map(|v| v.display_name)
                .unwrap_or_else(|| fallback.to_string())
        };

        IssueDetails {
            url: JiraClient::browse_url(base_url, &self.key),
            key: self.key,
            summary: fields.summary.unwrap_or_default(),
            description: fields.description.unwrap_or_default(),
            issue_type: named(fields.issuetype, "Unknown"),
            status: named(fields.status, "Unknown"),
            priority: named(fields.priority, "None"),
            assignee: user(fields.assignee, "Unassigned"),
            reporter: user(fields.reporter, "Unknown"),
            created: fields.created,
            updated: fields.updated,
            labels: fields.labels,
            project: fields.project.map(|p| p.key).unwrap_or_default(),
            comments: fields.comment.map(|c| c.comments.len()).unwrap_or(0),
        }
    }
}
