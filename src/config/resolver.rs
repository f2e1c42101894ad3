//! Resolver configuration types

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Duration;

/// Default lookup timeout in seconds
fn default_resolve_timeout() -> u64 {
    10
}

/// Which resolver answers names missing from the host table
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResolverType {
    /// Static table first, then the operating system resolver
    #[default]
    #[serde(rename = "system")]
    System,
    /// Static table only
    #[serde(rename = "static")]
    Static,
}

/// Hostname resolution configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ResolverConfig {
    /// Resolver type
    #[serde(rename = "type", default)]
    pub resolver_type: ResolverType,

    /// System lookup timeout in seconds
    #[serde(default = "default_resolve_timeout")]
    pub timeout: u64,

    /// Fixed hostname to IPv4 table
    #[serde(default)]
    pub hosts: HashMap<String, String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            resolver_type: ResolverType::default(),
            timeout: default_resolve_timeout(),
            hosts: HashMap::new(),
        }
    }
}

impl ResolverConfig {
    /// System lookup timeout as a [`Duration`]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Parse the host table into addresses
    pub fn host_table(&self) -> Result<HashMap<String, Ipv4Addr>> {
        self.hosts
            .iter()
            .map(|(name, addr)| {
                let ip = addr
                    .parse::<Ipv4Addr>()
                    .with_context(|| format!("Invalid IPv4 address for host {}: {}", name, addr))?;
                Ok((name.clone(), ip))
            })
            .collect()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.host_table()?;
        if self.resolver_type == ResolverType::Static && self.hosts.is_empty() {
            bail!("resolver.hosts must not be empty for a static resolver");
        }
        if self.resolver_type == ResolverType::System && self.timeout == 0 {
            bail!("resolver.timeout must be greater than 0");
        }
        Ok(())
    }
}
