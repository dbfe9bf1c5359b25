//! Hardware (link-layer) address of a peer virtual machine.
//!
//! Formatted and parsed as six colon-separated hex octets
//! (`00:16:3e:0a:0b:0c`). Serialized as that string so API payloads and
//! config files stay human-readable.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Length of a hardware address in bytes.
pub const MAC_LEN: usize = 6;

/// A 6-byte hardware address. Primary key of the connection registry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MacAddr(pub [u8; MAC_LEN]);

impl MacAddr {
    pub const fn new(bytes: [u8; MAC_LEN]) -> Self {
        Self(bytes)
    }

    pub fn octets(&self) -> [u8; MAC_LEN] {
        self.0
    }

    /// Bucket selector for a table of `buckets` chains.
    ///
    /// Only the last three octets take part: the vendor prefix is constant
    /// within a deployment, so it carries no entropy.
    pub fn bucket(&self, buckets: usize) -> usize {
        let sum = self.0[3] as usize + self.0[4] as usize + self.0[5] as usize;
        sum % buckets.max(1)
    }
}

impl From<[u8; MAC_LEN]> for MacAddr {
    fn from(bytes: [u8; MAC_LEN]) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl fmt::Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacAddr({})", self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MacParseError {
    #[error("expected 6 octets, got {0}")]
    WrongLength(usize),
    #[error("invalid octet {0:?}")]
    InvalidOctet(String),
}

impl FromStr for MacAddr {
    type Err = MacParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // Accept both "aa:bb:.." and "aa-bb-..".
        let parts: Vec<&str> = s.trim().split([':', '-']).collect();
        if parts.len() != MAC_LEN {
            return Err(MacParseError::WrongLength(parts.len()));
        }

        let mut out = [0u8; MAC_LEN];
        for (slot, part) in out.iter_mut().zip(&parts) {
            if part.len() != 2 {
                return Err(MacParseError::InvalidOctet(part.to_string()));
            }
            let byte = hex::decode(part).map_err(|_| MacParseError::InvalidOctet(part.to_string()))?;
            *slot = byte[0];
        }
        Ok(Self(out))
    }
}

impl Serialize for MacAddr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddr {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
