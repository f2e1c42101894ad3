//! Hostname resolution for the proxy
//!
//! Sessions only ever see the [`Resolver`] trait, so the operating system
//! resolver and a fixed host table are interchangeable. Neither caches or
//! retries; a failed lookup is final for the session that asked.

mod system;
mod table;

pub use system::SystemResolver;
pub use table::StaticResolver;

use crate::config::{ResolverConfig, ResolverType};
use crate::error::ResolveError;
use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Debug;
use std::net::Ipv4Addr;
use std::sync::Arc;

/// Turns a hostname into an IPv4 address
#[async_trait]
pub trait Resolver: Debug + Send + Sync {
    /// Resolve `hostname` to a single IPv4 address
    async fn resolve(&self, hostname: &str) -> Result<Ipv4Addr, ResolveError>;
}

/// Build the resolver described by the configuration
///
/// A non-empty host table always takes precedence; the `system` type falls
/// back to the operating system for every other name.
pub fn build_resolver(config: &ResolverConfig) -> Result<Arc<dyn Resolver>> {
    let table = config.host_table()?;

    let resolver: Arc<dyn Resolver> = match config.resolver_type {
        ResolverType::Static => Arc::new(StaticResolver::new(table)),
        ResolverType::System if table.is_empty() => {
            Arc::new(SystemResolver::new(config.timeout()))
        }
        ResolverType::System => Arc::new(
            StaticResolver::new(table)
                .with_fallback(Arc::new(SystemResolver::new(config.timeout()))),
        ),
    };

    Ok(resolver)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_static_resolver() {
        let mut config = ResolverConfig {
            resolver_type: ResolverType::Static,
            ..Default::default()
        };
        config
            .hosts
            .insert("example.com".to_string(), "5.6.7.8".to_string());

        let resolver = build_resolver(&config).unwrap();
        assert_eq!(
            resolver.resolve("example.com").await.unwrap(),
            Ipv4Addr::new(5, 6, 7, 8)
        );
        assert!(matches!(
            resolver.resolve("unknown").await,
            Err(ResolveError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_build_system_resolver_with_table() {
        let mut config = ResolverConfig::default();
        config
            .hosts
            .insert("service.local".to_string(), "10.0.0.7".to_string());

        let resolver = build_resolver(&config).unwrap();
        assert_eq!(
            resolver.resolve("service.local").await.unwrap(),
            Ipv4Addr::new(10, 0, 0, 7)
        );
        // Literals never reach the system resolver
        assert_eq!(
            resolver.resolve("1.2.3.4").await.unwrap(),
            Ipv4Addr::new(1, 2, 3, 4)
        );
    }

    #[test]
    fn test_build_resolver_invalid_table() {
        let mut config = ResolverConfig::default();
        config.hosts.insert("bad".to_string(), "x".to_string());
        assert!(build_resolver(&config).is_err());
    }
}
