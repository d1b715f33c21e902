use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    /// The downstream API answered with a non-success status.
    #[error("upstream responded with {status}: {body}")]
    Upstream { status: u16, body: String },
    #[error("issue tracker error: {0}")]
    IssueTracker(String),
    #[error("test runner error: {0}")]
    TestRunner(String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type AppResult<T> = Result<T, AppError>;
