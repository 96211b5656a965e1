//! Configuration management for courier.
//!
//! Configuration is read from `~/.config/courier/config.toml` unless a path is
//! given on the command line. If the file doesn't exist, a default
//! configuration with comments is created.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::domain::DedupScope;
use crate::fetcher::http_fetcher::{DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT};
use crate::fetcher::parallel::DEFAULT_WORKERS;
use crate::notify::mailchannels::DEFAULT_ENDPOINT;
use crate::notify::Delivery;
use crate::scheduler::parse_interval;

pub const SMTP_PASSWORD_ENV: &str = "COURIER_SMTP_PASSWORD";
pub const MAILCHANNELS_API_KEY_ENV: &str = "COURIER_MAILCHANNELS_API_KEY";
pub const DEFAULT_SEND_TIMEOUT_SECS: u64 = 30;

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub check: CheckConfig,
    pub mail: MailConfig,
    pub schedule: ScheduleConfig,
    pub server: ServerConfig,
}

/// What to do when the stored checkpoint does not validate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorruptStatePolicy {
    /// Continue from the default checkpoint and overwrite the bad value.
    #[default]
    Reset,
    /// Fail the run and leave the stored value for inspection.
    Abort,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CheckConfig {
    /// Feeds fetched concurrently
    pub workers: usize,
    /// Per-request fetch timeout in seconds
    pub timeout_secs: u64,
    pub user_agent: String,
    pub dedup_scope: DedupScope,
    pub on_corrupt_state: CorruptStatePolicy,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            dedup_scope: DedupScope::Global,
            on_corrupt_state: CorruptStatePolicy::Reset,
        }
    }
}

impl CheckConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transport {
    /// Log messages instead of sending them
    #[default]
    Log,
    Smtp,
    Mailchannels,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub from: String,
    pub to: Vec<String>,
    pub subject: String,
    pub delivery: Delivery,
    pub transport: Transport,
    /// Per-message send timeout in seconds
    pub timeout_secs: u64,
    pub smtp: SmtpConfig,
    pub mailchannels: MailChannelsConfig,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            from: "courier@localhost".to_string(),
            to: Vec::new(),
            subject: "New Blog Posts".to_string(),
            delivery: Delivery::Batch,
            transport: Transport::Log,
            timeout_secs: DEFAULT_SEND_TIMEOUT_SECS,
            smtp: SmtpConfig::default(),
            mailchannels: MailChannelsConfig::default(),
        }
    }
}

impl MailConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    /// Password comes from `COURIER_SMTP_PASSWORD`
    pub username: Option<String>,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 587,
            username: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MailChannelsConfig {
    pub endpoint: String,
}

impl Default for MailChannelsConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// e.g. "30m", "6h", "1d"
    pub interval: String,
    pub run_on_start: bool,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval: "1d".to_string(),
            run_on_start: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8787".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// If the config file exists but is invalid, returns an error.
    /// Missing fields in the config file will use default values.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_config_path()?,
        };

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&config_path).map_err(|e| ConfigError::Io {
            path: config_path.clone(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: config_path,
            source: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path: `~/.config/courier/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("courier").join("config.toml"))
    }

    /// Reject values that would only fail later, mid-run.
    pub fn validate(&self) -> Result<(), ConfigError> {
        parse_interval(&self.schedule.interval).map_err(ConfigError::Invalid)?;

        if self.check.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "check.timeout_secs must be greater than zero".into(),
            ));
        }

        if self.mail.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "mail.timeout_secs must be greater than zero".into(),
            ));
        }

        if self.mail.transport != Transport::Log && self.mail.to.is_empty() {
            return Err(ConfigError::Invalid(
                "mail.to must list at least one recipient".into(),
            ));
        }

        Ok(())
    }

    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    /// Generate the default config file content with comments.
    fn default_config_content() -> String {
        r##"# courier configuration

[check]
# Feeds fetched concurrently
workers = 10

# Per-request fetch timeout in seconds
timeout_secs = 10

# Identifier namespace for already-notified entries:
# "global"   - one namespace shared by all feeds
# "per_feed" - ids are qualified by the feed URL
dedup_scope = "global"

# When the stored checkpoint is unreadable:
# "reset" - continue from an empty checkpoint
# "abort" - fail the run
on_corrupt_state = "reset"

[mail]
from = "courier@localhost"
to = []
subject = "New Blog Posts"

# "batch" (one message per run) or "per_entry"
delivery = "batch"

# "log", "smtp" or "mailchannels"
transport = "log"

# Per-message send timeout in seconds
timeout_secs = 30

[mail.smtp]
host = "localhost"
port = 587
# username = "courier"
# The password is read from COURIER_SMTP_PASSWORD

[mail.mailchannels]
endpoint = "https://api.mailchannels.net/tx/v1/send"
# An API key, if required, is read from COURIER_MAILCHANNELS_API_KEY

[schedule]
# How often `courier serve` checks: "30m", "6h", "1d", or seconds
interval = "1d"
run_on_start = true

[server]
bind = "127.0.0.1:8787"
"##
        .to_string()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
