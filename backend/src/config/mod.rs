//! Central module for application-wide configuration settings.
//!
//! This module handles loading and managing configuration parameters such as
//! the server port, collaborator base URLs, the identity service secret and
//! the identifier policy applied to vote and save targets.

use std::{env, fmt::Display, fs::read_to_string, str::FromStr, time::Duration};

use thiserror::Error;
use tracing::{info, warn};

use crate::utils::{IdFormat, IdPolicy};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub catalog_url: String,
    pub identity_url: String,
    pub identity_secret: Option<String>,
    pub id_policy: IdPolicy,
    pub vote_channel_capacity: usize,
    pub sponsored_ttl: Duration,
    pub http_timeout: Duration,
    pub session_idle: Duration,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_lookup(|key| env::var(key).ok())?;
        config.identity_secret = read_secret("IDENTITY_API_SECRET");
        Ok(config)
    }

    /// Builds the configuration from any key lookup, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let id_format: IdFormat = try_load(&lookup, "TOOLHUB_ID_FORMAT", "object_id")?;
        let prefixes = lookup("TOOLHUB_PLACEHOLDER_PREFIXES")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|prefix| !prefix.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_else(IdPolicy::default_prefixes);

        let vote_channel_capacity: usize = try_load(&lookup, "TOOLHUB_VOTE_CHANNEL_CAPACITY", "256")?;
        if vote_channel_capacity == 0 {
            return Err(ConfigError::Invalid {
                key: "TOOLHUB_VOTE_CHANNEL_CAPACITY".to_string(),
                value: "0".to_string(),
                reason: "capacity must be positive".to_string(),
            });
        }

        let session_idle_secs: u64 = try_load(&lookup, "TOOLHUB_SESSION_IDLE_SECS", "1800")?;
        if session_idle_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "TOOLHUB_SESSION_IDLE_SECS".to_string(),
                value: "0".to_string(),
                reason: "idle timeout must be positive".to_string(),
            });
        }

        Ok(Self {
            port: try_load(&lookup, "TOOLHUB_PORT", "3000")?,
            catalog_url: try_load(&lookup, "TOOLHUB_CATALOG_URL", "http://localhost:4000/api")?,
            identity_url: try_load(&lookup, "TOOLHUB_IDENTITY_URL", "http://localhost:4100/v1")?,
            identity_secret: lookup("IDENTITY_API_SECRET"),
            id_policy: IdPolicy::new(id_format, prefixes),
            vote_channel_capacity,
            sponsored_ttl: Duration::from_secs(try_load(&lookup, "TOOLHUB_SPONSORED_TTL_SECS", "300")?),
            http_timeout: Duration::from_millis(try_load(&lookup, "TOOLHUB_HTTP_TIMEOUT_MS", "5000")?),
            session_idle: Duration::from_secs(session_idle_secs),
        })
    }
}

fn try_load<T, F>(lookup: &F, key: &str, default: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse().map_err(|e: T::Err| {
        warn!("Invalid {key} value: {e}");
        ConfigError::Invalid {
            key: key.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        }
    })
}

/// Reads a docker secret, falling back to the environment variable of the same name.
fn read_secret(secret_name: &str) -> Option<String> {
    let path = format!("/run/secrets/{secret_name}");

    match read_to_string(&path) {
        Ok(secret) => Some(secret.trim().to_string()),
        Err(e) => {
            info!("{secret_name} not readable from {path} ({e}), trying environment");
            env::var(secret_name).ok().filter(|secret| !secret.is_empty())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();

        assert_eq!(config.port, 3000);
        assert_eq!(config.vote_channel_capacity, 256);
        assert_eq!(config.sponsored_ttl, Duration::from_secs(300));
        assert_eq!(config.session_idle, Duration::from_secs(1800));
        assert_eq!(config.id_policy.format(), IdFormat::ObjectId);
        assert!(config.identity_secret.is_none());
    }

    #[test]
    fn overrides_are_parsed() {
        let config = Config::from_lookup(lookup_from(&[
            ("TOOLHUB_PORT", "8080"),
            ("TOOLHUB_ID_FORMAT", "opaque"),
            ("TOOLHUB_PLACEHOLDER_PREFIXES", "draft-, local-"),
            ("TOOLHUB_HTTP_TIMEOUT_MS", "250"),
            ("TOOLHUB_SESSION_IDLE_SECS", "90"),
        ]))
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.id_policy.format(), IdFormat::Opaque);
        assert!(config.id_policy.check("draft-42").is_err());
        assert!(config.id_policy.check("temp-42").is_ok());
        assert_eq!(config.http_timeout, Duration::from_millis(250));
        assert_eq!(config.session_idle, Duration::from_secs(90));
    }

    #[test]
    fn malformed_values_are_reported_with_their_key() {
        let err = Config::from_lookup(lookup_from(&[("TOOLHUB_PORT", "eighty")])).unwrap_err();
        match err {
            ConfigError::Invalid { key, value, .. } => {
                assert_eq!(key, "TOOLHUB_PORT");
                assert_eq!(value, "eighty");
            }
        }

        assert!(Config::from_lookup(lookup_from(&[("TOOLHUB_VOTE_CHANNEL_CAPACITY", "0")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("TOOLHUB_ID_FORMAT", "uuid")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("TOOLHUB_SESSION_IDLE_SECS", "0")])).is_err());
    }
}
