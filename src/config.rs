use std::{env, fmt::Display, net::SocketAddr, str::FromStr};

use anyhow::{anyhow, bail, Context};
use chrono::Duration;

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    pub secret_key: String,
    pub token_ttl: Duration,
    pub addr: SocketAddr,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = required(&lookup, "DATABASE_URL")?;
        let secret_key = required(&lookup, "SECRET_KEY")?;
        let ttl_minutes: i64 = try_load(&lookup, "ACCESS_TOKEN_EXPIRE_MINUTES", "30")?;
        if ttl_minutes <= 0 {
            bail!("ACCESS_TOKEN_EXPIRE_MINUTES must be positive, got {ttl_minutes}");
        }
        let host: String = try_load(&lookup, "HOST", "0.0.0.0")?;
        let port: u16 = try_load(&lookup, "PORT", "8000")?;
        let addr = format!("{host}:{port}")
            .parse()
            .with_context(|| format!("Invalid bind address {host}:{port}"))?;

        Ok(Self {
            database_url,
            max_connections: try_load(&lookup, "DATABASE_MAX_CONNECTIONS", "5")?,
            secret_key,
            token_ttl: Duration::minutes(ttl_minutes),
            addr,
        })
    }
}

fn required<F>(lookup: &F, key: &str) -> anyhow::Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| anyhow!("Environment variable {key} must be set"))
}

fn try_load<F, T>(lookup: &F, key: &str, default: &str) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    let raw = lookup(key).unwrap_or_else(|| {
        log::info!("{key} not set, using default: {default}");
        default.to_string()
    });
    raw.trim()
        .parse()
        .map_err(|e| anyhow!("Invalid {key} value `{raw}`: {e}"))
}
