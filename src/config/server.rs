//! Server configuration types
//!
//! Defines the main configuration structures for the proxy server.

use super::{ResolverConfig, TcpConfig};
use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

fn default_bind_addr() -> String {
    "127.0.0.1:9050".to_string()
}

/// Default outgoing connect timeout in seconds
fn default_connect_timeout() -> u64 {
    10
}

/// Default time to wait for the BIND peer in seconds
fn default_bind_timeout() -> u64 {
    60
}

/// Root configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Listener and session configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Hostname resolution configuration
    #[serde(default)]
    pub resolver: ResolverConfig,
}

impl Config {
    /// Validate the whole configuration
    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.resolver.validate()?;
        Ok(())
    }
}

/// SOCKS5 listener configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    /// Address to accept SOCKS5 clients on (e.g., "127.0.0.1:9050")
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Outgoing connect timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// Enable the BIND command
    #[serde(default)]
    pub allow_bind: bool,

    /// Seconds to wait for the inbound BIND peer
    #[serde(default = "default_bind_timeout")]
    pub bind_timeout: u64,

    /// Socket options
    #[serde(default)]
    pub tcp: TcpConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            connect_timeout: default_connect_timeout(),
            allow_bind: false,
            bind_timeout: default_bind_timeout(),
            tcp: TcpConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Outgoing connect timeout as a [`Duration`]
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    /// BIND accept timeout as a [`Duration`]
    pub fn bind_timeout(&self) -> Duration {
        Duration::from_secs(self.bind_timeout)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.bind_addr.is_empty() {
            bail!("server.bind_addr must not be empty");
        }
        if self.connect_timeout == 0 {
            bail!("server.connect_timeout must be greater than 0");
        }
        if self.allow_bind && self.bind_timeout == 0 {
            bail!("server.bind_timeout must be greater than 0 when BIND is allowed");
        }
        Ok(())
    }
}
