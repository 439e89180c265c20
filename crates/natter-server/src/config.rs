use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result, bail};
use chrono::Duration;

use natter_api::session::DEFAULT_SESSION_TTL_SECS;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub session_ttl: Duration,
    pub session_sweep_secs: u64,
    pub cookie_secure: bool,
}

impl Config {
    /// Read configuration from `NATTER_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host: std::env::var("NATTER_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: parse_var("NATTER_PORT", 10901)?,
            db_path: std::env::var("NATTER_DB_PATH")
                .unwrap_or_else(|_| "natter.db".into())
                .into(),
            session_ttl: session_ttl(parse_var(
                "NATTER_SESSION_TTL_SECS",
                DEFAULT_SESSION_TTL_SECS,
            )?)?,
            session_sweep_secs: parse_var("NATTER_SESSION_SWEEP_SECS", 3600)?,
            cookie_secure: parse_var("NATTER_COOKIE_SECURE", false)?,
        })
    }
}

/// Longest accepted session lifetime: ten years.
const MAX_SESSION_TTL_SECS: i64 = 10 * 365 * 24 * 60 * 60;

fn session_ttl(secs: i64) -> Result<Duration> {
    if !(1..=MAX_SESSION_TTL_SECS).contains(&secs) {
        bail!(
            "NATTER_SESSION_TTL_SECS must be between 1 and {}, got {}",
            MAX_SESSION_TTL_SECS,
            secs
        );
    }
    Duration::try_seconds(secs)
        .with_context(|| format!("NATTER_SESSION_TTL_SECS out of range: {}", secs))
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {:?}", name, raw)),
        Err(_) => Ok(default),
    }
}
