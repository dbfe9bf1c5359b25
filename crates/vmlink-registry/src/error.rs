//! Registry error taxonomy.
//!
//! Absence is never an error: lookups and removals return `Option`/`bool`.

use std::net::Ipv4Addr;

use vmlink_core::MacAddr;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The entry arena is full (or was released by `drain_all`).
    /// Callers drop the discovery event and retry next round.
    #[error("registry full: capacity {capacity}")]
    ResourceExhausted { capacity: usize },

    #[error("address {0} already registered")]
    DuplicateMac(MacAddr),

    #[error("ip {0} already indexed")]
    DuplicateIp(Ipv4Addr),

    #[error("entry {mac} already carries ip {ip}")]
    IpAlreadyAssigned { mac: MacAddr, ip: Ipv4Addr },

    #[error("0.0.0.0 cannot be indexed")]
    UnspecifiedIp,

    /// The entry reference no longer names a live entry in this registry.
    #[error("entry handle is stale")]
    StaleHandle,

    #[error("index consistency violation: {0}")]
    ConsistencyViolation(String),
}
