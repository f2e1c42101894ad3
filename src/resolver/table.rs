//! Fixed host table resolver

use super::Resolver;
use crate::error::ResolveError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::Arc;

/// Resolver answering from a fixed hostname table
///
/// Names missing from the table go to the fallback resolver when one is
/// configured, otherwise they fail with [`ResolveError::NotFound`].
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    hosts: HashMap<String, Ipv4Addr>,
    fallback: Option<Arc<dyn Resolver>>,
}

impl StaticResolver {
    /// Create a resolver over the given table
    pub fn new(hosts: HashMap<String, Ipv4Addr>) -> Self {
        StaticResolver {
            hosts,
            fallback: None,
        }
    }

    /// Consult `fallback` for names not present in the table
    pub fn with_fallback(mut self, fallback: Arc<dyn Resolver>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Add a single entry
    pub fn insert(&mut self, hostname: impl Into<String>, ip: Ipv4Addr) {
        self.hosts.insert(hostname.into(), ip);
    }

    /// Number of entries in the table
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, Ipv4Addr)> for StaticResolver {
    fn from_iter<I: IntoIterator<Item = (S, Ipv4Addr)>>(iter: I) -> Self {
        StaticResolver::new(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

#[async_trait]
impl Resolver for StaticResolver {
    async fn resolve(&self, hostname: &str) -> Result<Ipv4Addr, ResolveError> {
        if let Some(ip) = self.hosts.get(hostname) {
            return Ok(*ip);
        }
        if let Ok(ip) = hostname.parse::<Ipv4Addr>() {
            return Ok(ip);
        }
        match &self.fallback {
            Some(fallback) => fallback.resolve(hostname).await,
            None => Err(ResolveError::NotFound(hostname.to_string())),
        }
    }
}
