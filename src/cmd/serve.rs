use std::net::SocketAddr;
use std::sync::Arc;

use clap::Args;
use tokio::net::TcpListener;

use crate::config::AppConfig;
use crate::context::{RunnerContext, TicketContext};
use crate::error::{AppError, AppResult};
use crate::http;
use crate::infra::jira::JiraClient;
use crate::infra::playwright::PlaywrightCli;
use crate::infra::ticket_service::TicketServiceClient;
use crate::store::RunStore;
use crate::workflow::runs;

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Port to listen on; overrides the configured one.
    #[arg(short, long)]
    pub port: Option<u16>,
}

async fn bind(port: u16) -> AppResult<TcpListener> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    TcpListener::bind(addr)
        .await
        .map_err(|err| AppError::Configuration(format!("failed to bind {addr}: {err}")))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

pub async fn run_tickets(config: &AppConfig, args: ServeArgs) -> AppResult<()> {
    let issue_tracker = Arc::new(JiraClient::new(
        Some(config.jira_base_url.clone()),
        Some(config.jira_username.clone()),
        Some(config.jira_password.clone()),
        config.epic_name_field.clone(),
    ));
    let app = http::ticket_app(TicketContext::new(config, issue_tracker));

    let listener = bind(args.port.unwrap_or(config.ticket_port)).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        jira = %config.jira_base_url,
        project = %config.project_key,
        "ticket service listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

pub async fn run_runner(config: &AppConfig, args: ServeArgs) -> AppResult<()> {
    if !config.playwright_dir.is_dir() {
        tracing::warn!(
            dir = %config.playwright_dir.display(),
            "Playwright directory does not exist; test runs will fail"
        );
    }

    let ttl = chrono::Duration::from_std(config.run_ttl)
        .map_err(|err| AppError::Configuration(format!("run TTL out of range: {err}")))?;
    let store = Arc::new(RunStore::new(ttl, config.history_limit));
    let sweeper = store.spawn_sweeper(config.sweep_interval);

    let runner = Arc::new(PlaywrightCli::from_command_line(
        &config.playwright_command,
        config.playwright_dir.clone(),
    )?);
    let reporter = Arc::new(TicketServiceClient::new(config.ticket_service_url.clone()));
    let ctx = Arc::new(RunnerContext::new(config, store, runner, reporter));

    let listener = bind(args.port.unwrap_or(config.runner_port)).await?;
    tracing::info!(
        addr = %listener.local_addr()?,
        auto_tickets = config.auto_tickets,
        "test runner listening"
    );

    let served = axum::serve(listener, http::runner_app(Arc::clone(&ctx)))
        .with_graceful_shutdown(shutdown_signal())
        .await;

    runs::shutdown(&ctx).await;
    sweeper.abort();
    served?;
    Ok(())
}
