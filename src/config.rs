use anyhow::{bail, Context, Result};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Runtime settings read from the environment (a `.env` file is honoured).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub port: u16,
    pub bind_addr: IpAddr,
    /// Base URL of the quote service; `None` runs with no market data
    pub quote_service_url: Option<String>,
    pub quote_timeout: Duration,
    pub quote_concurrency: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            bind_addr: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            quote_service_url: None,
            quote_timeout: Duration::from_millis(5000),
            quote_concurrency: 8,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let read = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let port = match read("PORT") {
            Some(raw) => raw.parse::<u16>().with_context(|| format!("Invalid PORT '{}'", raw))?,
            None => defaults.port,
        };

        let bind_addr = match read("BIND_ADDR") {
            Some(raw) => raw
                .parse::<IpAddr>()
                .with_context(|| format!("Invalid BIND_ADDR '{}'", raw))?,
            None => defaults.bind_addr,
        };

        let quote_timeout = match read("QUOTE_TIMEOUT_MS") {
            Some(raw) => Duration::from_millis(
                raw.parse::<u64>()
                    .with_context(|| format!("Invalid QUOTE_TIMEOUT_MS '{}'", raw))?,
            ),
            None => defaults.quote_timeout,
        };

        let quote_concurrency = match read("QUOTE_CONCURRENCY") {
            Some(raw) => raw
                .parse::<usize>()
                .with_context(|| format!("Invalid QUOTE_CONCURRENCY '{}'", raw))?,
            None => defaults.quote_concurrency,
        };
        if quote_concurrency == 0 {
            bail!("QUOTE_CONCURRENCY must be at least 1");
        }

        Ok(Self {
            port,
            bind_addr,
            quote_service_url: read("QUOTE_SERVICE_URL"),
            quote_timeout,
            quote_concurrency,
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.port)
    }
}
