use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};

use crate::error::AppError;

pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    /// A downstream service rejected the call; `details` carries its body.
    Upstream { message: String, details: Value },
    Internal(String),
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Validation(message) => ApiError::BadRequest(message),
            AppError::NotFound(message) => ApiError::NotFound(message),
            AppError::Upstream { status, body } => {
                let details = serde_json::from_str(&body).unwrap_or(Value::String(body));
                ApiError::Upstream {
                    message: format!("upstream responded with {status}"),
                    details,
                }
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// A JSON request body whose rejection still answers with `{"error": ...}`.
pub type JsonBody<T> = Result<Json<T>, JsonRejection>;

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response()
            }
            ApiError::Upstream { message, details } => {
                tracing::warn!(error = %message, "upstream call failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": message, "details": details })),
                )
                    .into_response()
            }
            ApiError::Internal(message) => {
                tracing::error!(error = %message, "request failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": message })),
                )
                    .into_response()
            }
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;

    use super::*;

    async fn body_of(err: AppError) -> (StatusCode, Value) {
        let response = ApiError::from(err).into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn maps_validation_and_not_found() {
        let (status, body) = body_of(AppError::Validation("summary is required".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "summary is required");

        let (status, _) = body_of(AppError::NotFound("ticket PET-1 not found".into())).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn upstream_body_is_attached_as_json_when_possible() {
        let (status, body) = body_of(AppError::Upstream {
            status: 400,
            body: r#"{"errors":{"summary":"required"}}"#.to_string(),
        })
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["details"]["errors"]["summary"], "required");

        let (_, body) = body_of(AppError::Upstream {
            status: 502,
            body: "Bad Gateway".to_string(),
        })
        .await;
        assert_eq!(body["details"], "Bad Gateway");
    }

    #[tokio::test]
    async fn everything_else_is_internal() {
        let (status, body) = body_of(AppError::TestRunner("spawn failed".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "test runner error: spawn failed");
    }
}
