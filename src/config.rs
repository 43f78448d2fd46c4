use crate::domain::Decimal;
use chrono::NaiveDate;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    pub record_store_url: String,
    pub record_store_timeout_ms: u64,
    /// Fallback fx rate when a request does not carry one.
    pub default_fx_rate: Decimal,
    /// Advertiser roster; the personnel system is the source of truth, this
    /// is its configured projection.
    pub advertisers: Vec<String>,
    /// Earliest date the engine will aggregate.
    pub min_date: NaiveDate,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let record_store_url = env_map
            .get("RECORD_STORE_URL")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("RECORD_STORE_URL".to_string()))?;

        let record_store_timeout_ms = env_map
            .get("RECORD_STORE_TIMEOUT_MS")
            .map(|s| s.as_str())
            .unwrap_or("10000")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "RECORD_STORE_TIMEOUT_MS".to_string(),
                    "must be a positive integer".to_string(),
                )
            })?;

        let default_fx_rate = env_map
            .get("DEFAULT_FX_RATE")
            .ok_or_else(|| ConfigError::MissingEnv("DEFAULT_FX_RATE".to_string()))
            .and_then(|s| {
                Decimal::from_str_canonical(s).map_err(|_| {
                    ConfigError::InvalidValue(
                        "DEFAULT_FX_RATE".to_string(),
                        "must be a decimal number".to_string(),
                    )
                })
            })?;
        if !default_fx_rate.is_positive() {
            return Err(ConfigError::InvalidValue(
                "DEFAULT_FX_RATE".to_string(),
                "must be > 0".to_string(),
            ));
        }

        let advertisers = env_map
            .get("ADVERTISERS")
            .map(|s| {
                s.split(',')
                    .map(|a| a.trim().to_string())
                    .filter(|a| !a.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let min_date = env_map
            .get("MIN_DATE")
            .map(|s| s.as_str())
            .unwrap_or("2024-01-01")
            .parse::<NaiveDate>()
            .map_err(|_| {
                ConfigError::InvalidValue(
                    "MIN_DATE".to_string(),
                    "must be a YYYY-MM-DD date".to_string(),
                )
            })?;

        Ok(Config {
            port,
            database_path,
            record_store_url,
            record_store_timeout_ms,
            default_fx_rate,
            advertisers,
            min_date,
        })
    }
}
