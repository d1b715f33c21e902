use async_trait::async_trait;

use crate::domain::ticket::{IssueDetails, IssueRequest, Ticket};
use crate::error::AppResult;

#[async_trait]
pub trait IssueTrackerService: Send + Sync {
    async fn create_issue(&self, request: &IssueRequest) -> AppResult<Ticket>;
    async fn fetch_issue(&self, key: &str) -> AppResult<IssueDetails>;
    async fn delete_issue(&self, key: &str) -> AppResult<()>;
}
