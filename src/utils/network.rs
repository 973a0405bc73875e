//! Network utilities
//!
//! Decides which IPv4 address PASV replies advertise, discovering the
//! public address over HTTP when the client is outside the local network.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use log::info;
use tokio::sync::OnceCell;

use crate::error::TransferError;

const DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// True for peers on a private network: RFC 1918, loopback, link-local
/// and IPv6 unique-local addresses.
pub fn is_private_peer(ip: IpAddr) -> bool {
    match ip.to_canonical() {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback() || v4.is_link_local(),
        IpAddr::V6(v6) => {
            let first = v6.segments()[0];
            v6.is_loopback() || (first & 0xfe00) == 0xfc00 || (first & 0xffc0) == 0xfe80
        }
    }
}

/// Looks up this host's public address once and caches it for the life of
/// the process. Failed lookups are not cached.
#[derive(Debug)]
pub struct PublicAddressResolver {
    url: String,
    client: reqwest::Client,
    cached: OnceCell<Ipv4Addr>,
}

impl PublicAddressResolver {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(url, reqwest::Client::new())
    }

    pub fn with_client(url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            url: url.into(),
            client,
            cached: OnceCell::new(),
        }
    }

    pub async fn resolve(&self) -> Result<Ipv4Addr, TransferError> {
        self.cached
            .get_or_try_init(|| self.fetch())
            .await
            .copied()
    }

    async fn fetch(&self) -> Result<Ipv4Addr, TransferError> {
        let unavailable = |e: reqwest::Error| TransferError::AddressUnavailable(e.to_string());

        let body = self
            .client
            .get(&self.url)
            .timeout(DISCOVERY_TIMEOUT)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(unavailable)?
            .text()
            .await
            .map_err(unavailable)?;

        let ip = body.trim().parse::<Ipv4Addr>().map_err(|_| {
            TransferError::AddressUnavailable(format!("{} returned {:?}", self.url, body.trim()))
        })?;
        info!("Discovered public address {ip}");
        Ok(ip)
    }
}

/// Address to put in a `227` reply: the configured override, else the
/// control connection's local address for private peers, else the
/// discovered public address.
pub async fn advertised_address(
    override_ip: Option<&str>,
    peer: IpAddr,
    local: IpAddr,
    resolver: &PublicAddressResolver,
) -> Result<Ipv4Addr, TransferError> {
    if let Some(ip) = override_ip {
        return ip
            .trim()
            .parse()
            .map_err(|_| TransferError::AddressUnavailable(format!("invalid override {ip:?}")));
    }

    if is_private_peer(peer) {
        return match local.to_canonical() {
            IpAddr::V4(v4) => Ok(v4),
            IpAddr::V6(v6) => Err(TransferError::AddressUnavailable(format!(
                "control connection is IPv6 ({v6})"
            ))),
        };
    }

    resolver.resolve().await
}
