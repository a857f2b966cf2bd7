//! Parses the `host:port:id` addresses the `peer` command and `--peer`
//! blob-prefetch flags take, e.g. `peer.example.com:8008:@Ab...=.ed25519`.

use std::net::{SocketAddr, ToSocketAddrs};
use std::str::FromStr;

use ssb_crypto::identity::public_bytes_from_identity;
use ssb_types::Identity;

#[derive(Clone, Debug)]
pub struct PeerAddr {
    pub host: String,
    pub port: u16,
    pub id: Identity,
}

impl PeerAddr {
    /// Resolves `host:port` to a connectable [`SocketAddr`] and decodes `id`
    /// to its raw Curve25519-convertible public key bytes.
    pub fn resolve(&self) -> anyhow::Result<(SocketAddr, [u8; 32])> {
        let addr = (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| anyhow::anyhow!("could not resolve {}:{}", self.host, self.port))?;
        let public = public_bytes_from_identity(&self.id)?;
        Ok((addr, public))
    }
}

impl FromStr for PeerAddr {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        let host = parts.next().filter(|s| !s.is_empty());
        let port = parts.next().filter(|s| !s.is_empty());
        let id = parts.next().filter(|s| !s.is_empty());
        match (host, port, id) {
            (Some(host), Some(port), Some(id)) => Ok(PeerAddr {
                host: host.to_string(),
                port: port.parse().map_err(|e| anyhow::anyhow!("invalid port in peer address: {e}"))?,
                id: Identity::from_raw(id.to_string()),
            }),
            _ => anyhow::bail!("peer address must be host:port:id, got {s:?}"),
        }
    }
}
