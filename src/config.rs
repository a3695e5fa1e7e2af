use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::queue::{QueueSettings, DEFAULT_STORAGE_KEY};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    MissingVariable(&'static str),
    #[error("invalid value for {name}: {value}")]
    InvalidValue { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: Option<String>,
    pub queue_dir: PathBuf,
    pub queue: QueueSettings,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL").filter(|v| !v.is_empty());
        let queue_dir = lookup("KAM_QUEUE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(".kam"));
        let storage_key =
            lookup("KAM_QUEUE_KEY").unwrap_or_else(|| DEFAULT_STORAGE_KEY.to_string());

        let defaults = QueueSettings::default();
        let submit_timeout = match lookup("KAM_SUBMIT_TIMEOUT_SECS") {
            Some(value) => Duration::from_secs(parse_number("KAM_SUBMIT_TIMEOUT_SECS", &value)?),
            None => defaults.submit_timeout,
        };
        let retention = match lookup("KAM_RETENTION_MS") {
            Some(value) => Duration::from_millis(parse_number("KAM_RETENTION_MS", &value)?),
            None => defaults.retention,
        };

        Ok(Self {
            database_url,
            queue_dir,
            queue: QueueSettings {
                storage_key,
                retention,
                submit_timeout,
            },
        })
    }

    pub fn require_database_url(&self) -> Result<&str, ConfigError> {
        self.database_url
            .as_deref()
            .ok_or(ConfigError::MissingVariable("DATABASE_URL"))
    }
}

fn parse_number(name: &'static str, value: &str) -> Result<u64, ConfigError> {
    value
        .trim()
        .parse::<u64>()
        .map_err(|_| ConfigError::InvalidValue {
            name,
            value: value.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = config(&[]).unwrap();
        assert!(config.database_url.is_none());
        assert_eq!(config.queue_dir, PathBuf::from(".kam"));
        assert_eq!(config.queue.storage_key, "debrief-queue");
        assert_eq!(config.queue.submit_timeout, Duration::from_secs(30));
        assert_eq!(config.queue.retention, Duration::from_millis(3000));
        assert!(matches!(
            config.require_database_url(),
            Err(ConfigError::MissingVariable("DATABASE_URL"))
        ));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = config(&[
            ("DATABASE_URL", "postgres://localhost/kam"),
            ("KAM_SUBMIT_TIMEOUT_SECS", "5"),
            ("KAM_RETENTION_MS", "250"),
        ])
        .unwrap();
        assert_eq!(config.require_database_url().unwrap(), "postgres://localhost/kam");
        assert_eq!(config.queue.submit_timeout, Duration::from_secs(5));
        assert_eq!(config.queue.retention, Duration::from_millis(250));
    }

    #[test]
    fn rejects_non_numeric_timeout() {
        let err = config(&[("KAM_SUBMIT_TIMEOUT_SECS", "soon")]).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                name: "KAM_SUBMIT_TIMEOUT_SECS",
                ..
            }
        ));
    }
}
