//! Server configuration
//!
//! Every setting comes from an environment variable with a default, except
//! the database and auth verifier URLs which have no sensible default.

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Context;

use crate::relay::RelayConfig;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to
    pub bind_addr: String,
    pub http_port: u16,

    /// Origin allowed by CORS (the browser frontend)
    pub frontend_url: String,

    pub redis_url: String,
    pub database_url: String,

    /// Base URL of the session token verifier
    pub auth_url: String,

    pub relay: RelayConfig,

    /// Emit JSON log lines instead of the human readable format
    pub json_logs: bool,
}

impl ServerConfig {
    /// Creates configuration from environment variables
    ///
    /// Expected environment variables:
    /// - DATABASE_URL (required)
    /// - AUTH_URL (required)
    /// - HTTP_PORT (optional, default: 5002)
    /// - BIND_ADDR (optional, default: 0.0.0.0)
    /// - FRONTEND_URL (optional, default: http://localhost:3000)
    /// - REDIS_URL (optional, default: redis://localhost:6379/0)
    /// - RELAY_BATCH_SIZE (optional, default: 100)
    /// - RELAY_BLOCK_TIMEOUT_SECS (optional, default: 5)
    /// - RELAY_PACING_MS (optional, default: 256)
    /// - RELAY_RETRY_SECS (optional, default: 3)
    /// - RELAY_ERROR_COOLDOWN_MS (optional, default: 1000)
    /// - LOG_FORMAT (optional, `json` for structured logs)
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = lookup("DATABASE_URL")
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable not set"))?;

        let auth_url = lookup("AUTH_URL")
            .ok_or_else(|| anyhow::anyhow!("AUTH_URL environment variable not set"))?;

        let http_port = parse_or(&lookup, "HTTP_PORT", 5002)?;
        let defaults = RelayConfig::default();

        let relay = RelayConfig {
            batch_size: parse_or(&lookup, "RELAY_BATCH_SIZE", defaults.batch_size)?,
            block_timeout: Duration::from_secs(parse_or(
                &lookup,
                "RELAY_BLOCK_TIMEOUT_SECS",
                defaults.block_timeout.as_secs(),
            )?),
            pacing: Duration::from_millis(parse_or(
                &lookup,
                "RELAY_PACING_MS",
                defaults.pacing.as_millis() as u64,
            )?),
            retry: Duration::from_secs(parse_or(
                &lookup,
                "RELAY_RETRY_SECS",
                defaults.retry.as_secs(),
            )?),
            error_cooldown: Duration::from_millis(parse_or(
                &lookup,
                "RELAY_ERROR_COOLDOWN_MS",
                defaults.error_cooldown.as_millis() as u64,
            )?),
        };

        Ok(Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "0.0.0.0".to_string()),
            http_port,
            frontend_url: lookup("FRONTEND_URL")
                .unwrap_or_else(|| "http://localhost:3000".to_string()),
            redis_url: lookup("REDIS_URL")
                .unwrap_or_else(|| "redis://localhost:6379/0".to_string()),
            database_url,
            auth_url,
            relay,
            json_logs: lookup("LOG_FORMAT").is_some_and(|f| f.eq_ignore_ascii_case("json")),
        })
    }

    /// Socket address to listen on
    pub fn listen_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.bind_addr, self.http_port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.bind_addr, self.http_port))
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.database_url.is_empty() {
            anyhow::bail!("database_url cannot be empty");
        }

        if !self.redis_url.starts_with("redis://") && !self.redis_url.starts_with("rediss://") {
            anyhow::bail!("redis_url must start with redis:// or rediss://");
        }

        if !self.auth_url.starts_with("http://") && !self.auth_url.starts_with("https://") {
            anyhow::bail!("auth_url must start with http:// or https://");
        }

        if self.relay.batch_size == 0 {
            anyhow::bail!("relay batch size must be greater than 0");
        }

        if self.relay.block_timeout.is_zero() {
            anyhow::bail!("relay block timeout must be greater than 0");
        }

        self.listen_addr()?;

        Ok(())
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value '{}'", key, raw)),
        None => Ok(default),
    }
}
