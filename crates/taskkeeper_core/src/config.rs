//! Engine configuration.
//!
//! # Responsibility
//! - Hold tunables the host may override as a JSON document.
//! - Provide defaults that match the shipped client behavior.
//!
//! # Invariants
//! - `store_timeout_ms` is strictly positive; store calls never wait forever.
//! - Unknown keys are rejected so typos surface at startup.
//! - `log_level` and `log_dir` are checked here, so `start_logging` only
//!   fails on I/O or an already running logger.

use crate::logging::{default_log_level, init_logging, normalize_level, normalize_log_dir};
use chrono::Duration as ReminderLead;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_REMINDER_LEAD_MINUTES: u32 = 30;
const MAX_REMINDER_LEAD_MINUTES: u32 = 7 * 24 * 60;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Upper bound for one store call (SQLite busy timeout).
    pub store_timeout_ms: u64,
    /// Minutes before `due_at` at which the reminder fires.
    pub reminder_lead_minutes: u32,
    /// Overrides the build-mode default log level when set.
    pub log_level: Option<String>,
    /// Absolute directory for rolling log files; `None` leaves logging to
    /// the host.
    pub log_dir: Option<String>,
    /// Records a `Task Synced` audit entry per merged task.
    pub audit_sync_events: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            store_timeout_ms: DEFAULT_STORE_TIMEOUT_MS,
            reminder_lead_minutes: DEFAULT_REMINDER_LEAD_MINUTES,
            log_level: None,
            log_dir: None,
            audit_sync_events: true,
        }
    }
}

impl EngineConfig {
    /// Parses and validates a JSON document; missing keys take defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let trimmed = raw.trim();
        let config = if trimmed.is_empty() {
            Self::default()
        } else {
            serde_json::from_str::<Self>(trimmed).map_err(ConfigError::Parse)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "store_timeout_ms",
                message: "must be greater than zero".to_string(),
            });
        }
        if self.reminder_lead_minutes > MAX_REMINDER_LEAD_MINUTES {
            return Err(ConfigError::InvalidValue {
                field: "reminder_lead_minutes",
                message: format!("must be at most {MAX_REMINDER_LEAD_MINUTES}"),
            });
        }
        if let Some(level) = &self.log_level {
            normalize_level(level).map_err(|message| ConfigError::InvalidValue {
                field: "log_level",
                message,
            })?;
        }
        if let Some(log_dir) = &self.log_dir {
            normalize_log_dir(log_dir).map_err(|message| ConfigError::InvalidValue {
                field: "log_dir",
                message,
            })?;
        }
        Ok(())
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }

    pub fn reminder_lead(&self) -> ReminderLead {
        ReminderLead::minutes(i64::from(self.reminder_lead_minutes))
    }

    /// Configured level, or the build-mode default.
    pub fn effective_log_level(&self) -> &str {
        match self.log_level.as_deref() {
            Some(level) => level,
            None => default_log_level(),
        }
    }

    /// Starts file logging when `log_dir` is set.
    ///
    /// Returns `Ok(false)` without touching the logger when no directory is
    /// configured. A logger already running with the same level and
    /// directory counts as started.
    pub fn start_logging(&self) -> Result<bool, String> {
        let Some(log_dir) = self.log_dir.as_deref() else {
            return Ok(false);
        };
        init_logging(self.effective_log_level(), log_dir)?;
        Ok(true)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    InvalidValue {
        field: &'static str,
        message: String,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "invalid engine config: {err}"),
            Self::InvalidValue { field, message } => {
                write!(f, "invalid engine config `{field}`: {message}")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::InvalidValue { .. } => None,
        }
    }
}
