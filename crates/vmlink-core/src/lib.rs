//! vmlink-core — shared types and configuration.
//! All other vmlink crates depend on this one.

pub mod config;
pub mod mac;

pub use config::{ConfigError, VmlinkConfig};
pub use mac::{MacAddr, MacParseError};
