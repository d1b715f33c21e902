use std::io::{self, Write};

use clap::{Args, Subcommand};

use crate::config::{StoredConfig, config_file_path};
use crate::error::AppResult;

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Run the interactive configuration wizard.
    Init,
    /// Show the stored configuration (secrets masked).
    Show,
}

pub fn run(command: ConfigCommand) -> AppResult<()> {
    match command {
        ConfigCommand::Init => run_init(),
        ConfigCommand::Show => run_show(),
    }
}

fn run_init() -> AppResult<()> {
    let mut cfg = StoredConfig::load()?;

    println!("Configuring qa-bridge.");
    println!("Press Enter to keep the current value, '-' to clear it.");
    println!("Environment variables still take precedence over stored values.");
    println!();

    apply_prompt(
        "Jira base URL (e.g., http://localhost:8081)",
        &mut cfg.jira_base_url,
        false,
    )?;
    apply_prompt("Jira username", &mut cfg.jira_username, false)?;
    apply_prompt("Jira password", &mut cfg.jira_password, true)?;
    apply_prompt("Default Jira project key", &mut cfg.project_key, false)?;
    apply_prompt(
        "Epic name custom field id",
        &mut cfg.epic_name_field,
        false,
    )?;
    apply_prompt(
        "Ticket service URL used by the runner",
        &mut cfg.ticket_service_url,
        false,
    )?;
    apply_prompt("Playwright project directory", &mut cfg.playwright_dir, false)?;
    apply_prompt(
        "Playwright launcher (e.g., npx)",
        &mut cfg.playwright_command,
        false,
    )?;
    apply_flag_prompt(
        "File tickets for failed runs automatically",
        &mut cfg.auto_tickets,
    )?;

    cfg.save()?;

    let path = config_file_path()?;
    println!("\nConfiguration saved to {}", path.display());
    Ok(())
}

fn run_show() -> AppResult<()> {
    let cfg = StoredConfig::load()?;
    let path = config_file_path()?;

    println!("Configuration file: {}", path.display());
    println!("Jira base URL: {}", display_value(&cfg.jira_base_url));
    println!("Jira username: {}", display_value(&cfg.jira_username));
    println!("Jira password: {}", mask_secret(&cfg.jira_password));
    println!("Project key: {}", display_value(&cfg.project_key));
    println!("Epic name field: {}", display_value(&cfg.epic_name_field));
    println!(
        "Ticket service URL: {}",
        display_value(&cfg.ticket_service_url)
    );
    println!("Playwright directory: {}", display_value(&cfg.playwright_dir));
    println!(
        "Playwright launcher: {}",
        display_value(&cfg.playwright_command)
    );
    println!(
        "Automatic tickets: {}",
        cfg.auto_tickets
            .map(|flag| if flag { "yes" } else { "no" })
            .unwrap_or("<not set>")
    );

    Ok(())
}

fn apply_prompt(field: &str, target: &mut Option<String>, secret: bool) -> AppResult<()> {
    match prompt(field, target.as_deref(), secret)? {
        PromptAction::Keep => {}
        PromptAction::Clear => *target = None,
        PromptAction::Set(value) => *target = Some(value),
    }
    Ok(())
}

fn apply_flag_prompt(field: &str, target: &mut Option<bool>) -> AppResult<()> {
    let current = target.map(|flag| if flag { "yes" } else { "no" });
    match prompt(&format!("{field} (yes/no)"), current, false)? {
        PromptAction::Keep => {}
        PromptAction::Clear => *target = None,
        PromptAction::Set(value) => match value.to_ascii_lowercase().as_str() {
            "y" | "yes" | "true" => *target = Some(true),
            "n" | "no" | "false" => *target = Some(false),
            _ => println!("Unrecognised answer '{value}', keeping the current value."),
        },
    }
    Ok(())
}

fn prompt(field: &str, current: Option<&str>, secret: bool) -> AppResult<PromptAction> {
    let mut stdout = io::stdout();

    match (current, secret) {
        (Some(_), true) => write!(stdout, "{field} [****] (Enter to keep, '-' to clear): ")?,
        (Some(value), false) => {
            write!(stdout, "{field} [{value}] (Enter to keep, '-' to clear): ")?
        }
        (None, _) => write!(stdout, "{field} (Enter to skip): ")?,
    }
    stdout.flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let trimmed = input.trim();

    if trimmed.is_empty() {
        Ok(PromptAction::Keep)
    } else if trimmed == "-" {
        Ok(PromptAction::Clear)
    } else {
        Ok(PromptAction::Set(trimmed.to_string()))
    }
}

fn display_value(value: &Option<String>) -> String {
    value
        .as_deref()
        .filter(|v| !v.is_empty())
        .map(|v| v.to_string())
        .unwrap_or_else(|| "<not set>".to_string())
}

fn mask_secret(value: &Option<String>) -> String {
    match value {
        Some(token) if token.chars().count() > 6 => {
            let prefix: String = token.chars().take(3).collect();
            let suffix: String = token.chars().skip(token.chars().count() - 3).collect();
            format!("{prefix}***{suffix}")
        }
        Some(token) if !token.is_empty() => "***".to_string(),
        _ => "<not set>".to_string(),
    }
}

enum PromptAction {
    Keep,
    Clear,
    Set(String),
}
