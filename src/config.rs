use std::{env, fmt::Display, str::FromStr};

use log::{info, warn, LevelFilter};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unable to read the {key} environment variable: {source}")]
    Missing {
        key: &'static str,
        source: env::VarError,
    },

    #[error("Invalid {key} value `{value}`: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Syslog verbosity. Accepts the `log` level names plus `WARNING`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LogLevel(pub LevelFilter);

impl FromStr for LogLevel {
    type Err = log::ParseLevelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_uppercase().as_str() {
            "WARNING" => Ok(LogLevel(LevelFilter::Warn)),
            other => other.parse().map(LogLevel),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub log_level: LogLevel,
    pub database_url: String,
    pub jwt_secret: String,
    pub bind_address: String,
    pub port: u16,
    pub token_ttl_hours: i64,
    pub bcrypt_cost: u32,
    pub max_connections: u32,
    pub cors_origin: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            log_level: try_load("LOG_LEVEL", "WARNING")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            bind_address: try_load("BIND_ADDRESS", "127.0.0.1")?,
            port: try_load("PORT", "5000")?,
            token_ttl_hours: try_load("TOKEN_TTL_HOURS", "24")?,
            bcrypt_cost: try_load("BCRYPT_COST", &bcrypt::DEFAULT_COST.to_string())?,
            max_connections: try_load("DATABASE_MAX_CONNECTIONS", "10")?,
            cors_origin: env::var("CORS_ORIGIN").ok().filter(|origin| !origin.is_empty()),
        };

        if !(4..=31).contains(&config.bcrypt_cost) {
            return Err(ConfigError::Invalid {
                key: "BCRYPT_COST",
                value: config.bcrypt_cost.to_string(),
                reason: "must be between 4 and 31".to_string(),
            });
        }
        if config.token_ttl_hours <= 0 {
            return Err(ConfigError::Invalid {
                key: "TOKEN_TTL_HOURS",
                value: config.token_ttl_hours.to_string(),
                reason: "must be positive".to_string(),
            });
        }

        Ok(config)
    }
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    env::var(key).map_err(|source| ConfigError::Missing { key, source })
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let value = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    value.parse().map_err(|err: T::Err| {
        warn!("Invalid {key} value: {err}");
        ConfigError::Invalid {
            key,
            reason: err.to_string(),
            value,
        }
    })
}
