use std::{fmt, net::SocketAddr};

use serde::Deserialize;
use tokio::net::lookup_host;
use tracing::{debug, warn};

/// ngrok runs its TCP tunnels on `0.tcp.ngrok.io` through `9.tcp.ngrok.io`.
const TUNNEL_HOST_COUNT: usize = 10;

#[derive(Deserialize, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Eu,
    #[default]
    Us,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Region::Eu => "eu",
            Region::Us => "us",
        })
    }
}

/// The tunnel hostnames for a region. The US region has no region label.
pub fn ngrok_hostnames(region: Region) -> Vec<String> {
    let suffix = match region {
        Region::Us => ".".to_string(),
        region => format!(".{region}."),
    };
    (0..TUNNEL_HOST_COUNT)
        .map(|i| format!("{i}.tcp{suffix}ngrok.io"))
        .collect()
}

/// Hostnames and the addresses they resolved to, in insertion order. Every
/// address appears at most once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedAddressSet {
    entries: Vec<(String, String)>,
}

impl ResolvedAddressSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the hostnames themselves as the scan targets.
    pub fn unresolved<S: AsRef<str>>(hostnames: &[S]) -> Self {
        let mut set = Self::new();
        for hostname in hostnames {
            set.insert(hostname.as_ref(), hostname.as_ref());
        }
        set
    }

    /// Returns false and does nothing if `address` is already in the set,
    /// even under a different hostname.
    pub fn insert(&mut self, hostname: impl Into<String>, address: impl Into<String>) -> bool {
        let address = address.into();
        if self.contains_address(&address) {
            return false;
        }
        self.entries.push((hostname.into(), address));
        true
    }

    pub fn contains_address(&self, address: &str) -> bool {
        self.entries.iter().any(|(_, a)| a == address)
    }

    pub fn get(&self, hostname: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(h, _)| h == hostname)
            .map(|(_, a)| a.as_str())
    }

    pub fn addresses(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(_, a)| a.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(h, a)| (h.as_str(), a.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub struct Resolution {
    pub addresses: ResolvedAddressSet,
    /// Hostnames that didn't resolve.
    pub failed: Vec<String>,
}

/// Resolve every hostname one after another, keeping the first IPv4 address
/// of each (or the first address if there's no IPv4 one).
pub async fn resolve_all(hostnames: &[String]) -> Resolution {
    let mut addresses = ResolvedAddressSet::new();
    let mut failed = Vec::new();

    for hostname in hostnames {
        debug!("resolving {hostname}");
        match resolve_one(hostname).await {
            Some(address) => {
                let inserted = addresses.insert(hostname.as_str(), address.clone());
                if inserted {
                    debug!("{hostname} resolved to {address}");
                } else {
                    debug!("{hostname} resolved to {address}, which we already have");
                }
            }
            None => {
                warn!("couldn't resolve {hostname}");
                failed.push(hostname.clone());
            }
        }
    }

    Resolution { addresses, failed }
}

async fn resolve_one(hostname: &str) -> Option<String> {
    let addrs = match lookup_host((hostname, 0)).await {
        Ok(addrs) => addrs.collect::<Vec<SocketAddr>>(),
        Err(err) => {
            debug!("lookup for {hostname} failed: {err}");
            return None;
        }
    };
    addrs
        .iter()
        .find(|addr| addr.is_ipv4())
        .or_else(|| addrs.first())
        .map(|addr| addr.ip().to_string())
}
