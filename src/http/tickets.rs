use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{delete, get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::context::TicketContext;
use crate::domain::catalog;
use crate::http::error::{ApiError, ApiResult, JsonBody};
use crate::workflow::tickets::{
    self, IssueDraft, SmartTicketInput, TemplateTicketInput,
};

pub type SharedTickets = Arc<TicketContext>;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDeleteRequest {
    #[serde(default)]
    pub issue_keys: Vec<String>,
}

pub fn ticket_router() -> Router<SharedTickets> {
    Router::new()
        .route("/health", get(health))
        .route("/templates", get(list_templates))
        .route("/templates/{id}", get(get_template))
        .route("/create-from-template", post(create_from_template))
        .route("/create-smart-ticket", post(create_smart_ticket))
        .route("/jira/create-ticket", post(create_ticket))
        .route("/ticket/{key}", get(get_ticket))
        .route("/delete/{issue_key}", delete(delete_ticket))
        .route("/batch-delete", post(batch_delete))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "ticket-service",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn list_templates() -> Json<Value> {
    let templates: Vec<Value> = catalog::all()
        .iter()
        .map(|template| {
            json!({
                "id": template.id,
                "name": template.name,
                "issueType": template.issue_type,
                "priority": template.priority,
            })
        })
        .collect();
    Json(json!({ "total": templates.len(), "templates": templates }))
}

async fn get_template(Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let template = catalog::find(&id).ok_or_else(|| {
        ApiError::NotFound(format!(
            "template {id} not found; available templates: {}",
            catalog::ids().join(", ")
        ))
    })?;
    let mut body = serde_json::to_value(template).map_err(|err| ApiError::Internal(err.to_string()))?;
    body["id"] = Value::from(template.id);
    Ok(Json(body))
}

async fn create_from_template(
    State(ctx): State<SharedTickets>,
    body: JsonBody<TemplateTicketInput>,
) -> ApiResult<Json<Value>> {
    let Json(input) = body?;
    let outcome = tickets::create_from_template(&ctx, input).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Ticket created: {}", outcome.ticket.key),
        "ticket": outcome.ticket,
        "templateUsed": outcome.template_used,
        "templateName": outcome.template_name,
    })))
}

async fn create_smart_ticket(
    State(ctx): State<SharedTickets>,
    body: JsonBody<SmartTicketInput>,
) -> ApiResult<Json<Value>> {
    let Json(input) = body?;
    let outcome = tickets::create_smart_ticket(&ctx, input).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Ticket created: {}", outcome.ticket.key),
        "ticket": outcome.ticket,
        "detectedTemplate": outcome.detected_template,
        "detectedType": outcome.detected_type,
        "templateName": outcome.template_name,
    })))
}

async fn create_ticket(
    State(ctx): State<SharedTickets>,
    body: JsonBody<IssueDraft>,
) -> ApiResult<Json<Value>> {
    let Json(draft) = body?;
    let request = draft.into_request(&ctx.project_key);
    let ticket = tickets::create_ticket(&ctx, request).await?;
    Ok(Json(json!({
        "success": true,
        "message": format!("Ticket created: {}", ticket.key),
        "ticket": ticket,
    })))
}

async fn get_ticket(
    State(ctx): State<SharedTickets>,
    Path(key): Path<String>,
) -> ApiResult<Json<Value>> {
    let ticket = tickets::get_ticket(&ctx, &key).await?;
    Ok(Json(json!({ "success": true, "ticket": ticket })))
}

async fn delete_ticket(
    State(ctx): State<SharedTickets>,
    Path(issue_key): Path<String>,
) -> ApiResult<Json<Value>> {
    tickets::delete_ticket(&ctx, &issue_key).await?;
    Ok(Json(json!({
        "success": true,
        "issueKey": issue_key,
        "message": format!("Ticket {issue_key} deleted"),
    })))
}

async fn batch_delete(
    State(ctx): State<SharedTickets>,
    body: JsonBody<BatchDeleteRequest>,
) -> ApiResult<Json<Value>> {
    let Json(request) = body?;
    let outcome = tickets::batch_delete(&ctx, &request.issue_keys).await?;
    Ok(Json(json!({
        "message": "Batch delete finished",
        "total": outcome.total,
        "successful": outcome.successful,
        "failed": outcome.failed,
        "results": outcome.results,
    })))
}
