//! Runtime settings.
//!
//! Read once at startup from an optional TOML file, then environment
//! variables (which win). Keys are the lowercase forms of the env vars:
//! `TELEGRAM_TOKEN` / `telegram_token`, and so on.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::error::{ReminderError, ReminderResult};

const APP_DIR: &str = "ics-reminder";
const DEFAULT_REMINDER_HOURS: u32 = 24;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 20;
const DEFAULT_TELEGRAM_API_URL: &str = "https://api.telegram.org";

fn default_reminder_hours() -> u32 {
    DEFAULT_REMINDER_HOURS
}

fn default_fetch_timeout_secs() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

fn default_telegram_api_url() -> String {
    DEFAULT_TELEGRAM_API_URL.to_string()
}

#[derive(Deserialize, Clone)]
pub struct Settings {
    pub telegram_token: String,
    pub telegram_chat_id: String,
    pub ics_url: String,

    /// Lookahead horizon in hours
    #[serde(default = "default_reminder_hours")]
    pub reminder_hours: u32,

    pub db_path: Option<PathBuf>,

    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,

    #[serde(default = "default_telegram_api_url")]
    pub telegram_api_url: String,
}

impl Settings {
    /// Default location of the optional settings file.
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
    }

    /// Load settings from `config_file` (or the default file, if present)
    /// and the process environment.
    pub fn load(config_file: Option<&Path>) -> ReminderResult<Self> {
        Self::load_from(config_file, None)
    }

    /// Like `load`, but reads variables from `env` instead of the process
    /// environment when given.
    pub fn load_from(
        config_file: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> ReminderResult<Self> {
        let settings: Settings = sources(config_file, env)?
            .try_deserialize()
            .map_err(|e| ReminderError::Config(e.to_string()))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Resolve only the ledger location, so read-only commands work without
    /// Telegram credentials or a feed URL.
    pub fn load_ledger_path(config_file: Option<&Path>) -> ReminderResult<PathBuf> {
        Self::load_ledger_path_from(config_file, None)
    }

    pub fn load_ledger_path_from(
        config_file: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> ReminderResult<PathBuf> {
        let ledger: LedgerSettings = sources(config_file, env)?
            .try_deserialize()
            .map_err(|e| ReminderError::Config(e.to_string()))?;

        Ok(resolve_ledger_path(ledger.db_path.as_deref()))
    }

    fn validate(&self) -> ReminderResult<()> {
        for (name, value) in [
            ("TELEGRAM_TOKEN", &self.telegram_token),
            ("TELEGRAM_CHAT_ID", &self.telegram_chat_id),
            ("ICS_URL", &self.ics_url),
        ] {
            if value.trim().is_empty() {
                return Err(ReminderError::Config(format!("{} must not be empty", name)));
            }
        }

        if self.fetch_timeout_secs == 0 {
            return Err(ReminderError::Config(
                "FETCH_TIMEOUT_SECS must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    pub fn horizon(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.reminder_hours))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Ledger file location, with `~` expanded.
    pub fn ledger_path(&self) -> PathBuf {
        resolve_ledger_path(self.db_path.as_deref())
    }
}

#[derive(Deserialize)]
struct LedgerSettings {
    db_path: Option<PathBuf>,
}

fn sources(
    config_file: Option<&Path>,
    env: Option<config::Map<String, String>>,
) -> ReminderResult<Config> {
    let mut builder = Config::builder();

    match config_file {
        Some(path) => builder = builder.add_source(File::from(path).required(true)),
        None => {
            if let Some(path) = Settings::config_path() {
                builder = builder.add_source(File::from(path).required(false));
            }
        }
    }

    builder
        .add_source(Environment::default().ignore_empty(true).source(env))
        .build()
        .map_err(|e| ReminderError::Config(e.to_string()))
}

fn resolve_ledger_path(db_path: Option<&Path>) -> PathBuf {
    match db_path {
        Some(path) => PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned()),
        None => dirs::data_local_dir()
            .map(|dir| dir.join(APP_DIR).join("sent.db"))
            .unwrap_or_else(|| PathBuf::from("ics-reminder.db")),
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("telegram_token", &"<redacted>")
            .field("telegram_chat_id", &self.telegram_chat_id)
            .field("ics_url", &self.ics_url)
            .field("reminder_hours", &self.reminder_hours)
            .field("db_path", &self.db_path)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("telegram_api_url", &self.telegram_api_url)
            .finish()
    }
}
