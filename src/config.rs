use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow};
use chrono::FixedOffset;

use crate::utils::clock::parse_utc_offset;

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub server_addr: String,
    pub api_prefix: String,

    // Rate limiting
    pub rate_scan_per_min: u32,
    pub rate_api_per_min: u32,

    /// Fixed offset that decides which calendar day an event belongs to.
    pub business_offset: FixedOffset,
    /// Directory status that counts as active.
    pub active_status: String,
    pub session_lock_idle: Duration,
    pub run_migrations: bool,
    pub log_dir: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let required = |key: &str| lookup(key).with_context(|| format!("{} must be set", key));
        let or_default = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let offset_raw = or_default("BUSINESS_UTC_OFFSET", "+08:00");
        let business_offset = parse_utc_offset(&offset_raw)
            .ok_or_else(|| anyhow!("BUSINESS_UTC_OFFSET is not a UTC offset: {:?}", offset_raw))?;

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            api_prefix: or_default("API_PREFIX", "/api"),

            rate_scan_per_min: parse_var("RATE_SCAN_PER_MIN", &or_default("RATE_SCAN_PER_MIN", "120"))?,
            rate_api_per_min: parse_var("RATE_API_PER_MIN", &or_default("RATE_API_PER_MIN", "600"))?,

            business_offset,
            active_status: or_default("ACTIVE_STATUS", "active"),
            session_lock_idle: Duration::from_secs(parse_var(
                "SESSION_LOCK_IDLE_SECS",
                &or_default("SESSION_LOCK_IDLE_SECS", "300"),
            )?),
            run_migrations: parse_var("RUN_MIGRATIONS", &or_default("RUN_MIGRATIONS", "true"))?,
            log_dir: or_default("LOG_DIR", "logs"),
        })
    }
}

fn parse_var<T>(key: &str, raw: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    raw.trim()
        .parse()
        .with_context(|| format!("{} has an invalid value: {:?}", key, raw))
}
