//! # reqwest-proxy-rotor
//!
//! A rotating proxy pool.
//!
//! Proxies are handed out one at a time, come back after use, and are
//! re-admitted by a background recycler once their usage count falls under a
//! threshold that relaxes over time. Blacklisted proxies leave the rotation.

pub mod address;
pub mod config;
pub mod error;
pub mod pool;
pub mod props;
mod recycler;
pub mod set;
mod utils;

pub use address::ProxyAddress;
pub use config::{BlacklistFilter, ProxyPoolConfig, ProxyPoolConfigBuilder};
pub use error::{AddressError, PoolError, SourceError};
pub use pool::{PoolSummary, ProxyPool};
pub use props::ProxyProps;
pub use set::ProxySet;
