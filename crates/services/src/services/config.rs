//! Runtime configuration, read from the environment (and `.env` via dotenvy in the binary).

use std::{collections::HashMap, env, fmt::Display, path::PathBuf, str::FromStr};

use db::{DATABASE_FILE_NAME, models::case::CasePriority};
use thiserror::Error;
use tracing::debug;
use utils::assets::asset_dir;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Hours an unresolved case may sit at each priority before it is escalated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlaHours {
    pub critical: i64,
    pub high: i64,
    pub medium: i64,
    pub low: i64,
}

impl Default for SlaHours {
    fn default() -> Self {
        Self {
            critical: 4,
            high: 24,
            medium: 72,
            low: 168,
        }
    }
}

impl SlaHours {
    pub fn for_priority(&self, priority: CasePriority) -> i64 {
        match priority {
            CasePriority::Critical => self.critical,
            CasePriority::High => self.high,
            CasePriority::Medium => self.medium,
            CasePriority::Low => self.low,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscalationConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub sla_hours: SlaHours,
}

impl Default for EscalationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 300,
            sla_hours: SlaHours::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub database_path: PathBuf,
    /// Allowed CORS origins. Empty means any origin (development).
    pub cors_origins: Vec<String>,
    pub escalation: EscalationConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
            database_path: asset_dir().join(DATABASE_FILE_NAME),
            cors_origins: Vec::new(),
            escalation: EscalationConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        let sla = &defaults.escalation.sla_hours;

        let port_var = if lookup("PORT").is_some() { "PORT" } else { "BACKEND_PORT" };

        Ok(Config {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, port_var, defaults.port)?,
            database_path: lookup("CASEDESK_DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            cors_origins: lookup("CASEDESK_CORS_ORIGINS")
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            escalation: EscalationConfig {
                enabled: parse_or(&lookup, "CASEDESK_ESCALATION_ENABLED", defaults.escalation.enabled)?,
                interval_secs: parse_or(
                    &lookup,
                    "CASEDESK_ESCALATION_INTERVAL_SECS",
                    defaults.escalation.interval_secs,
                )?,
                sla_hours: SlaHours {
                    critical: parse_or(&lookup, "CASEDESK_SLA_HOURS_CRITICAL", sla.critical)?,
                    high: parse_or(&lookup, "CASEDESK_SLA_HOURS_HIGH", sla.high)?,
                    medium: parse_or(&lookup, "CASEDESK_SLA_HOURS_MEDIUM", sla.medium)?,
                    low: parse_or(&lookup, "CASEDESK_SLA_HOURS_LOW", sla.low)?,
                },
            },
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => {
            debug!("{key} not set, using default");
            Ok(default)
        }
    }
}
