use rust_decimal::Decimal;
use std::{str::FromStr, time::Duration};

/// Runtime settings, read from the environment (a `.env` file is honoured).
///
/// | Variable | Default |
/// |----------|---------|
/// | DATABASE_URL | sqlite://sky.db?mode=rwc |
/// | SECRET | (required) |
/// | BIND_ADDR | 0.0.0.0:3000 |
/// | DELIVERY_FEE | 6 |
/// | DELIVERY_ETA_MINUTES | 45 |
/// | PAYMENT_TIMEOUT_MS | 5000 |
/// | TOKEN_TTL_HOURS | 24 |
/// | SEED_PASSWORD | unset (no seeding) |
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub secret: String,
    pub bind_addr: String,
    pub delivery_fee: Decimal,
    pub delivery_eta: chrono::Duration,
    pub payment_timeout: Duration,
    pub token_ttl: chrono::Duration,
    pub seed_password: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value}")]
    Invalid { name: &'static str, value: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://sky.db?mode=rwc".into()),
            secret: std::env::var("SECRET").map_err(|_| ConfigError::Missing("SECRET"))?,
            bind_addr: std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into()),
            delivery_fee: parse_var("DELIVERY_FEE", Decimal::new(6, 0))?,
            delivery_eta: chrono::Duration::minutes(parse_var("DELIVERY_ETA_MINUTES", 45)?),
            payment_timeout: Duration::from_millis(parse_var("PAYMENT_TIMEOUT_MS", 5000)?),
            token_ttl: chrono::Duration::hours(parse_var("TOKEN_TTL_HOURS", 24)?),
            seed_password: std::env::var("SEED_PASSWORD").ok(),
        })
    }

    /// Settings for an in-memory deployment, used by the test suites.
    pub fn for_tests() -> Self {
        Self {
            database_url: "sqlite::memory:".into(),
            secret: "test-secret".into(),
            bind_addr: "127.0.0.1:0".into(),
            delivery_fee: Decimal::new(6, 0),
            delivery_eta: chrono::Duration::minutes(45),
            payment_timeout: Duration::from_millis(500),
            token_ttl: chrono::Duration::hours(1),
            seed_password: Some("Secret15".into()),
        }
    }
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(value) => value
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
        Err(_) => Ok(default),
    }
}
