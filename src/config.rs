use std::env;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

const CONFIG_DIR_NAME: &str = "qa-bridge";
const CONFIG_FILE_NAME: &str = "config.json";

const DEFAULT_JIRA_BASE_URL: &str = "http://localhost:8081";
const DEFAULT_JIRA_USERNAME: &str = "admin";
const DEFAULT_JIRA_PASSWORD: &str = "admin";
const DEFAULT_PROJECT_KEY: &str = "PET";
const DEFAULT_EPIC_NAME_FIELD: &str = "customfield_10104";
const DEFAULT_TICKET_PORT: u16 = 3000;
const DEFAULT_RUNNER_PORT: u16 = 3001;
const DEFAULT_TICKET_SERVICE_URL: &str = "http://localhost:3000";
const DEFAULT_PLAYWRIGHT_DIR: &str = "playwright";
const DEFAULT_PLAYWRIGHT_COMMAND: &str = "npx";
const DEFAULT_RUN_TTL_SECS: u64 = 7 * 24 * 60 * 60;
const DEFAULT_SWEEP_SECS: u64 = 10 * 60;
const DEFAULT_HISTORY_LIMIT: usize = 500;

/// Fully resolved settings for both services.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub jira_base_url: String,
    pub jira_username: String,
    pub jira_password: String,
    pub project_key: String,
    pub epic_name_field: String,
    pub ticket_port: u16,
    pub runner_port: u16,
    pub ticket_service_url: String,
    pub playwright_dir: PathBuf,
    pub playwright_command: String,
    pub run_ttl: Duration,
    pub sweep_interval: Duration,
    pub history_limit: usize,
    pub auto_tickets: bool,
}

impl AppConfig {
    /// Stored config file first, environment variables on top.
    pub fn load() -> AppResult<Self> {
        let stored = StoredConfig::load()?;
        Self::from_sources(&stored, |key| env::var(key).ok())
    }

    pub fn from_sources<F>(stored: &StoredConfig, lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let text = |key: &str, stored: &Option<String>, default: &str| {
            var(key)
                .or_else(|| stored.clone().filter(|value| !value.trim().is_empty()))
                .unwrap_or_else(|| default.to_string())
        };

        Ok(Self {
            jira_base_url: text("JIRA_BASE_URL", &stored.jira_base_url, DEFAULT_JIRA_BASE_URL),
            jira_username: text("JIRA_USERNAME", &stored.jira_username, DEFAULT_JIRA_USERNAME),
            jira_password: text("JIRA_PASSWORD", &stored.jira_password, DEFAULT_JIRA_PASSWORD),
            project_key: text("JIRA_PROJECT_KEY", &stored.project_key, DEFAULT_PROJECT_KEY),
            epic_name_field: text(
                "JIRA_EPIC_NAME_FIELD",
                &stored.epic_name_field,
                DEFAULT_EPIC_NAME_FIELD,
            ),
            ticket_port: parsed("TICKET_SERVICE_PORT", var("TICKET_SERVICE_PORT"), DEFAULT_TICKET_PORT)?,
            runner_port: parsed("RUNNER_SERVICE_PORT", var("RUNNER_SERVICE_PORT"), DEFAULT_RUNNER_PORT)?,
            ticket_service_url: text(
                "TICKET_SERVICE_URL",
                &stored.ticket_service_url,
                DEFAULT_TICKET_SERVICE_URL,
            ),
            playwright_dir: PathBuf::from(text(
                "PLAYWRIGHT_DIR",
                &stored.playwright_dir,
                DEFAULT_PLAYWRIGHT_DIR,
            )),
            playwright_command: text(
                "PLAYWRIGHT_COMMAND",
                &stored.playwright_command,
                DEFAULT_PLAYWRIGHT_COMMAND,
            ),
            run_ttl: Duration::from_secs(parsed(
                "RUN_TTL_SECS",
                var("RUN_TTL_SECS"),
                DEFAULT_RUN_TTL_SECS,
            )?),
            sweep_interval: Duration::from_secs(
                parsed("RUN_SWEEP_SECS", var("RUN_SWEEP_SECS"), DEFAULT_SWEEP_SECS)?.max(1),
            ),
            history_limit: parsed(
                "RUN_HISTORY_LIMIT",
                var("RUN_HISTORY_LIMIT"),
                DEFAULT_HISTORY_LIMIT,
            )?,
            auto_tickets: match var("AUTO_TICKETS") {
                Some(value) => parse_flag("AUTO_TICKETS", &value)?,
                None => stored.auto_tickets.unwrap_or(true),
            },
        })
    }
}

fn parsed<T>(key: &str, value: Option<String>, default: T) -> AppResult<T>
where
    T: FromStr,
{
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| AppError::Configuration(format!("{key} has an invalid value: {raw}"))),
        None => Ok(default),
    }
}

fn parse_flag(key: &str, value: &str) -> AppResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(AppError::Configuration(format!(
            "{key} must be true or false, got {other}"
        ))),
    }
}

/// Values persisted by `config init`. Anything left unset falls back to defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredConfig {
    pub jira_base_url: Option<String>,
    pub jira_username: Option<String>,
    pub jira_password: Option<String>,
    pub project_key: Option<String>,
    pub epic_name_field: Option<String>,
    pub ticket_service_url: Option<String>,
    pub playwright_dir: Option<String>,
    pub playwright_command: Option<String>,
    pub auto_tickets: Option<bool>,
}

impl StoredConfig {
    pub fn load() -> AppResult<Self> {
        Self::load_from(&config_file_path()?)
    }

    pub fn save(&self) -> AppResult<()> {
        self.save_to(&config_file_path()?)
    }

    fn load_from(path: &Path) -> AppResult<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => serde_json::from_str(&contents).map_err(|err| {
                AppError::Configuration(format!("invalid config file {}: {err}", path.display()))
            }),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(AppError::Io(err)),
        }
    }

    fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }
}

pub fn config_directory() -> AppResult<PathBuf> {
    let base = dirs::config_dir().ok_or_else(|| {
        AppError::Configuration("unable to determine the user config directory".to_string())
    })?;
    Ok(base.join(CONFIG_DIR_NAME))
}

pub fn config_file_path() -> AppResult<PathBuf> {
    Ok(config_directory()?.join(CONFIG_FILE_NAME))
}
