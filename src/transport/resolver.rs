//! Broker address resolution.

use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::net::lookup_host;

use super::TransportError;

#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, host: &str, port: u16) -> Result<SocketAddr, TransportError>;
}

/// System resolver; prefers IPv4 results when both families are returned.
#[derive(Debug, Default, Clone, Copy)]
pub struct DnsResolver;

#[async_trait]
impl Resolver for DnsResolver {
    async fn resolve(&self, host: &str, port: u16) -> Result<SocketAddr, TransportError> {
        let addrs: Vec<SocketAddr> = lookup_host((host, port)).await?.collect();
        addrs
            .iter()
            .find(|a| a.is_ipv4())
            .or_else(|| addrs.first())
            .copied()
            .ok_or_else(|| TransportError::NoAddress {
                host: host.to_string(),
            })
    }
}
