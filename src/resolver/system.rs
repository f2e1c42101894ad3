//! Operating system resolver

use super::Resolver;
use crate::error::ResolveError;
use async_trait::async_trait;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;
use tracing::trace;

/// Resolver backed by `getaddrinfo` through [`tokio::net::lookup_host`]
#[derive(Debug, Clone)]
pub struct SystemResolver {
    timeout: Duration,
}

impl SystemResolver {
    /// Create a resolver whose lookups give up after `timeout`
    pub fn new(timeout: Duration) -> Self {
        SystemResolver { timeout }
    }
}

impl Default for SystemResolver {
    fn default() -> Self {
        SystemResolver::new(Duration::from_secs(10))
    }
}

#[async_trait]
impl Resolver for SystemResolver {
    async fn resolve(&self, hostname: &str) -> Result<Ipv4Addr, ResolveError> {
        if let Ok(ip) = hostname.parse::<Ipv4Addr>() {
            return Ok(ip);
        }

        let addrs = tokio::time::timeout(self.timeout, tokio::net::lookup_host((hostname, 0)))
            .await
            .map_err(|_| ResolveError::Timeout(hostname.to_string()))?
            .map_err(|source| ResolveError::Io {
                host: hostname.to_string(),
                source,
            })?;

        let mut seen_any = false;
        for addr in addrs {
            seen_any = true;
            if let SocketAddr::V4(v4) = addr {
                trace!("Resolved {} to {}", hostname, v4.ip());
                return Ok(*v4.ip());
            }
        }

        if seen_any {
            Err(ResolveError::NoIpv4(hostname.to_string()))
        } else {
            Err(ResolveError::NotFound(hostname.to_string()))
        }
    }
}
