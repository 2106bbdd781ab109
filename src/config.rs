//! Runtime configuration read from the environment.
//!
//! | Variable | Default |
//! |---|---|
//! | `MODELHUB_HTTP_PORT` | 8000 |
//! | `MODELHUB_DATA_DIR` | `data` |
//! | `SECRET_KEY` | random per process (tokens do not survive restarts) |
//! | `ACCESS_TOKEN_EXPIRE_MINUTES` | 30 |
//! | `ADMIN_EMAIL` / `ADMIN_PASSWORD` | unset: no admin is seeded |

use std::env;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use tracing::{info, warn};

use crate::identity::random_secret;

pub const DEFAULT_HTTP_PORT: u16 = 8000;
pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_TOKEN_MINUTES: i64 = 30;

#[derive(Debug, Clone)]
pub struct AdminSeedConfig {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub data_dir: PathBuf,
    pub secret_key: String,
    /// True when `secret_key` was generated because `SECRET_KEY` was unset.
    pub secret_generated: bool,
    pub token_minutes: i64,
    pub admin: Option<AdminSeedConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let (secret_key, secret_generated) = match non_empty_var("SECRET_KEY") {
            Some(k) => (k, false),
            None => {
                warn!(target: "modelhub::config", "SECRET_KEY not set; generating a per-process signing key");
                (random_secret()?, true)
            }
        };
        let admin = match (non_empty_var("ADMIN_EMAIL"), non_empty_var("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(AdminSeedConfig { email, password }),
            (None, None) => None,
            _ => return Err(anyhow!("ADMIN_EMAIL and ADMIN_PASSWORD must be set together")),
        };
        let token_minutes: i64 = parse_var("ACCESS_TOKEN_EXPIRE_MINUTES")?.unwrap_or(DEFAULT_TOKEN_MINUTES);
        if token_minutes <= 0 {
            return Err(anyhow!("ACCESS_TOKEN_EXPIRE_MINUTES must be positive, got {}", token_minutes));
        }
        Ok(Self {
            http_port: parse_var("MODELHUB_HTTP_PORT")?.unwrap_or(DEFAULT_HTTP_PORT),
            data_dir: non_empty_var("MODELHUB_DATA_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            secret_key,
            secret_generated,
            token_minutes,
            admin,
        })
    }

    /// Fixed configuration for tests and embedding: no admin seed.
    pub fn for_data_dir(data_dir: impl Into<PathBuf>, secret_key: &str) -> Self {
        Self {
            http_port: 0,
            data_dir: data_dir.into(),
            secret_key: secret_key.to_string(),
            secret_generated: false,
            token_minutes: DEFAULT_TOKEN_MINUTES,
            admin: None,
        }
    }

    pub fn with_admin(mut self, email: &str, password: &str) -> Self {
        self.admin = Some(AdminSeedConfig { email: email.to_string(), password: password.to_string() });
        self
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_var<T: std::str::FromStr>(key: &str) -> Result<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match non_empty_var(key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow!("Invalid {} value '{}': {}", key, raw, e)),
        None => {
            info!(target: "modelhub::config", "{} not set, using default", key);
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_config_defaults() {
        let c = Config::for_data_dir("/tmp/x", "k").with_admin("admin@x.com", "pw");
        assert_eq!(c.token_minutes, 30);
        assert_eq!(c.data_dir, PathBuf::from("/tmp/x"));
        assert!(!c.secret_generated);
        assert_eq!(c.admin.map(|a| a.email), Some("admin@x.com".to_string()));
    }
}
