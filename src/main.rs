mod cmd;
mod config;
mod context;
mod domain;
mod error;
mod events;
mod http;
mod infra;
mod services;
mod store;
mod workflow;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cmd::config::{self as config_cmd, ConfigArgs};
use crate::cmd::render::{self, RenderArgs};
use crate::cmd::serve::{self, ServeArgs};
use crate::config::AppConfig;
use crate::error::AppResult;

#[derive(Parser)]
#[command(
    name = "qa-bridge",
    author,
    version,
    about = "Ticket templating and Playwright test-runner services"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the ticket service in front of Jira.
    Tickets(ServeArgs),
    /// Serve the Playwright test runner.
    Runner(ServeArgs),
    /// List the built-in ticket templates.
    Templates,
    /// Render a template locally without creating a ticket.
    Render(RenderArgs),
    /// Manage stored configuration.
    Config(ConfigArgs),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> AppResult<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Config(args) => config_cmd::run(args.command),
        Commands::Templates => {
            render::list_templates();
            Ok(())
        }
        Commands::Render(args) => render::run(args),
        Commands::Tickets(args) => serve::run_tickets(&AppConfig::load()?, args).await,
        Commands::Runner(args) => serve::run_runner(&AppConfig::load()?, args).await,
    }
}
