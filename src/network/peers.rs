use log::{error, info};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;
use std::sync::RwLock;

/// Network address of a peer as a `(host, port)` pair
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, bincode::Encode, bincode::Decode,
)]
pub struct PeerAddress {
    host: String,
    port: u16,
}

impl PeerAddress {
    pub fn new(host: impl Into<String>, port: u16) -> PeerAddress {
        PeerAddress {
            host: host.into(),
            port,
        }
    }

    pub fn get_host(&self) -> &str {
        self.host.as_str()
    }

    pub fn get_port(&self) -> u16 {
        self.port
    }

    /// Resolve to every socket address the host maps to
    pub fn resolve(&self) -> std::io::Result<Vec<SocketAddr>> {
        Ok((self.host.as_str(), self.port).to_socket_addrs()?.collect())
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

impl FromStr for PeerAddress {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("{s}: expected host:port"))?;
        let host = host.trim_start_matches('[').trim_end_matches(']');
        if host.is_empty() {
            return Err(format!("{s}: empty host"));
        }
        let port = port
            .parse::<u16>()
            .map_err(|e| format!("{s}: invalid port: {e}"))?;
        Ok(PeerAddress::new(host, port))
    }
}

impl From<SocketAddr> for PeerAddress {
    fn from(addr: SocketAddr) -> Self {
        PeerAddress::new(addr.ip().to_string(), addr.port())
    }
}

/// The set of peers this node knows about.
///
/// Peers are only ever added. There is no liveness probing, so a peer that
/// goes away stays in the set and simply fails every later exchange.
#[derive(Default)]
pub struct PeerRegistry {
    inner: RwLock<HashSet<PeerAddress>>,
}

impl PeerRegistry {
    pub fn new() -> PeerRegistry {
        PeerRegistry {
            inner: RwLock::new(HashSet::new()),
        }
    }

    /// Insert `address`; returns whether it was new
    pub fn register(&self, address: PeerAddress) -> bool {
        match self.inner.write() {
            Ok(mut peers) => {
                let label = address.to_string();
                let added = peers.insert(address);
                if added {
                    info!("Registered peer {label}");
                }
                added
            }
            Err(_) => {
                error!("Failed to acquire write lock on peer registry");
                false
            }
        }
    }

    pub fn all(&self) -> HashSet<PeerAddress> {
        match self.inner.read() {
            Ok(peers) => peers.clone(),
            Err(_) => {
                error!("Failed to acquire read lock on peer registry");
                HashSet::new()
            }
        }
    }

    pub fn len(&self) -> usize {
        match self.inner.read() {
            Ok(peers) => peers.len(),
            Err(_) => {
                error!("Failed to acquire read lock on peer registry");
                0
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_is_idempotent() {
        let registry = PeerRegistry::new();
        let addr = PeerAddress::new("127.0.0.1", 2001);

        assert!(registry.register(addr.clone()));
        assert!(!registry.register(addr.clone()));
        assert_eq!(registry.len(), 1);
        assert!(registry.all().contains(&addr));
    }

    #[test]
    fn test_all_is_a_snapshot() {
        let registry = PeerRegistry::new();
        registry.register(PeerAddress::new("127.0.0.1", 2001));
        let snapshot = registry.all();
        registry.register(PeerAddress::new("127.0.0.1", 2002));

        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.all().len(), 2);
    }

    #[test]
    fn test_parse_and_display() {
        let addr: PeerAddress = "node.local:2001".parse().unwrap();
        assert_eq!(addr, PeerAddress::new("node.local", 2001));
        assert_eq!(addr.to_string(), "node.local:2001");

        let v6: PeerAddress = "[::1]:9000".parse().unwrap();
        assert_eq!(v6.get_host(), "::1");
        assert_eq!(v6.to_string(), "[::1]:9000");
    }

    #[test]
    fn test_parse_rejects_bad_input() {
        assert!("2001".parse::<PeerAddress>().is_err());
        assert!(":2001".parse::<PeerAddress>().is_err());
        assert!("host:99999".parse::<PeerAddress>().is_err());
    }

    #[test]
    fn test_from_socket_addr() {
        let socket: SocketAddr = "127.0.0.1:4000".parse().unwrap();
        assert_eq!(PeerAddress::from(socket), PeerAddress::new("127.0.0.1", 4000));
    }
}
