pub mod jira;
pub mod playwright;
pub mod ticket_service;
