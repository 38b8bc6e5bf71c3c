//! Link State Inspection
//!
//! Port for the operating-system queries synthesis needs about a network
//! interface, with a sysfs/getifaddrs adapter and a static fake.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{Error, Result};

/// Default location of per-interface attributes on Linux.
pub const SYSFS_NET_ROOT: &str = "/sys/class/net";

/// Port for querying interface link state.
#[async_trait]
pub trait NetworkInspector: Send + Sync {
    /// Link MTU of `iface` in bytes.
    async fn link_mtu(&self, iface: &str) -> Result<u32>;

    /// Hardware (MAC) address of `iface`, e.g. `52:54:00:12:34:56`.
    async fn link_hardware_address(&self, iface: &str) -> Result<String>;

    /// IPv4 addresses currently assigned to `iface`, in kernel order.
    async fn ipv4_addresses(&self, iface: &str) -> Result<Vec<Ipv4Addr>>;
}

// =============================================================================
// System Inspector
// =============================================================================

/// Inspector backed by sysfs attributes and `getifaddrs(3)`.
#[derive(Debug, Clone)]
pub struct SystemNetworkInspector {
    sysfs_root: PathBuf,
}

impl Default for SystemNetworkInspector {
    fn default() -> Self {
        Self::new(SYSFS_NET_ROOT)
    }
}

impl SystemNetworkInspector {
    /// Inspector reading interface attributes under `sysfs_root`.
    pub fn new(sysfs_root: impl Into<PathBuf>) -> Self {
        Self {
            sysfs_root: sysfs_root.into(),
        }
    }

    async fn read_attribute(&self, iface: &str, attribute: &str) -> Result<String> {
        if iface.is_empty() || iface.contains('/') {
            return Err(Error::LinkQuery {
                iface: iface.to_string(),
                reason: "invalid interface name".into(),
            });
        }

        let path = self.sysfs_root.join(iface).join(attribute);
        let value = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| Error::LinkQuery {
                iface: iface.to_string(),
                reason: format!("{}: {}", path.display(), e),
            })?;
        Ok(value.trim().to_string())
    }
}

#[async_trait]
impl NetworkInspector for SystemNetworkInspector {
    async fn link_mtu(&self, iface: &str) -> Result<u32> {
        let raw = self.read_attribute(iface, "mtu").await?;
        raw.parse().map_err(|e| Error::LinkQuery {
            iface: iface.to_string(),
            reason: format!("unparsable mtu '{}': {}", raw, e),
        })
    }

    async fn link_hardware_address(&self, iface: &str) -> Result<String> {
        self.read_attribute(iface, "address").await
    }

    async fn ipv4_addresses(&self, iface: &str) -> Result<Vec<Ipv4Addr>> {
        let addrs = interface_ipv4_addresses(iface)?;
        debug!(iface, count = addrs.len(), "Queried interface addresses");
        Ok(addrs)
    }
}

#[cfg(unix)]
fn interface_ipv4_addresses(iface: &str) -> Result<Vec<Ipv4Addr>> {
    let addrs = nix::ifaddrs::getifaddrs().map_err(|e| Error::LinkQuery {
        iface: iface.to_string(),
        reason: format!("getifaddrs: {}", e),
    })?;

    Ok(addrs
        .filter(|ifa| ifa.interface_name == iface)
        .filter_map(|ifa| ifa.address)
        .filter_map(|addr| addr.as_sockaddr_in().map(|sin| sin.ip()))
        .collect())
}

#[cfg(not(unix))]
fn interface_ipv4_addresses(iface: &str) -> Result<Vec<Ipv4Addr>> {
    Err(Error::LinkQuery {
        iface: iface.to_string(),
        reason: "interface enumeration is only supported on unix".into(),
    })
}

// =============================================================================
// Static Inspector
// =============================================================================

/// Interface state held in memory.
///
/// Queries for interfaces (or attributes) that were never registered fail
/// the same way a missing link does.
#[derive(Debug, Clone, Default)]
pub struct StaticNetworkInspector {
    mtus: HashMap<String, u32>,
    hardware: HashMap<String, String>,
    addresses: HashMap<String, Vec<Ipv4Addr>>,
}

impl StaticNetworkInspector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mtu(mut self, iface: &str, mtu: u32) -> Self {
        self.mtus.insert(iface.to_string(), mtu);
        self
    }

    pub fn with_hardware_address(mut self, iface: &str, address: &str) -> Self {
        self.hardware.insert(iface.to_string(), address.to_string());
        self
    }

    pub fn with_ipv4(mut self, iface: &str, addr: Ipv4Addr) -> Self {
        self.addresses.entry(iface.to_string()).or_default().push(addr);
        self
    }

    fn missing(iface: &str, what: &str) -> Error {
        Error::LinkQuery {
            iface: iface.to_string(),
            reason: format!("no {} registered", what),
        }
    }
}

#[async_trait]
impl NetworkInspector for StaticNetworkInspector {
    async fn link_mtu(&self, iface: &str) -> Result<u32> {
        self.mtus
            .get(iface)
            .copied()
            .ok_or_else(|| Self::missing(iface, "mtu"))
    }

    async fn link_hardware_address(&self, iface: &str) -> Result<String> {
        self.hardware
            .get(iface)
            .cloned()
            .ok_or_else(|| Self::missing(iface, "hardware address"))
    }

    async fn ipv4_addresses(&self, iface: &str) -> Result<Vec<Ipv4Addr>> {
        self.addresses
            .get(iface)
            .cloned()
            .ok_or_else(|| Self::missing(iface, "interface"))
    }
}
