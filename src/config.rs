use std::{net::SocketAddr, str::FromStr};

use anyhow::{Context, Result};

const DEFAULT_DATABASE_URL: &str = "sqlite://studychat.db?mode=rwc";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 16;
const DEFAULT_OUTBOUND_BUFFER: usize = 256;
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 64 * 1024;

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub db_max_connections: u32,
    /// Events queued per connection before fan-out starts dropping for it.
    pub outbound_buffer: usize,
    /// Largest inbound websocket frame accepted, in bytes.
    pub max_message_size: usize,
    /// `None` means permissive CORS.
    pub cors_allow_origin: Option<String>,
}

impl Config {
    /// Reads the process environment, with `.env` as a fallback.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config = Self {
            database_url: lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_owned()),
            bind_addr: parse_or(&lookup, "BIND_ADDR", DEFAULT_BIND_ADDR.parse()?)?,
            db_max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS)?,
            outbound_buffer: parse_or(&lookup, "OUTBOUND_BUFFER", DEFAULT_OUTBOUND_BUFFER)?,
            max_message_size: parse_or(&lookup, "MAX_MESSAGE_SIZE", DEFAULT_MAX_MESSAGE_SIZE)?,
            cors_allow_origin: lookup("CORS_ALLOW_ORIGIN").filter(|origin| !origin.trim().is_empty()),
        };

        anyhow::ensure!(config.db_max_connections > 0, "DB_MAX_CONNECTIONS must be at least 1");
        anyhow::ensure!(config.outbound_buffer > 0, "OUTBOUND_BUFFER must be at least 1");

        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_owned(),
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            outbound_buffer: DEFAULT_OUTBOUND_BUFFER,
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            cors_allow_origin: None,
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid {key}: {raw:?}")),
        None => Ok(default),
    }
}
