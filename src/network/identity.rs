//! Network Identity Resolution
//!
//! Resolves the addresses a node serves on and the names and numeric ids its
//! cluster peers are known by.
//!
//! # Node ids
//!
//! Every node derives every member's id independently, with no coordinator,
//! so the id must be a pure function of a stable identity string:
//!
//! ```text
//! node_id = hash128to32(identity) / 2
//! ```
//!
//! `hash128to32` keeps the top 32 bits of XXH3-128. Halving keeps the id
//! within the group-communication layer's signed 32-bit range. The identity
//! is the name a member actually resolved under (IPv4 mode) or the
//! interface hardware address (IPv6 / multicast mode). Nothing ephemeral
//! (addresses, pids, time) ever feeds the hash.

use std::net::Ipv4Addr;
use std::sync::Arc;

use tracing::{debug, instrument};
use xxhash_rust::xxh3::xxh3_128;

use super::inspector::NetworkInspector;
use super::resolver::DnsResolver;
use crate::error::{Error, Result};

/// Separator between candidate interface names in an interface spec.
pub const INTERFACE_SEPARATOR: char = ';';

/// MTU assumed when the link cannot be queried.
pub const DEFAULT_LINK_MTU: u32 = 1500;

/// Bytes reserved for the group-communication protocol's own framing.
pub const NETMTU_HEADROOM: u32 = 50;

/// Identity used when no hardware address is detectable.
pub const PLACEHOLDER_HARDWARE_ADDRESS: &str = "a:b:c:d:e:f";

/// Fold a 128-bit hash of `input` down to its most significant 32 bits.
pub fn hash128to32(input: &str) -> u32 {
    (xxh3_128(input.as_bytes()) >> 96) as u32
}

/// Deterministic node id for a stable identity string.
pub fn derive_node_id(identity: &str) -> u32 {
    hash128to32(identity) / 2
}

/// Candidate interface names in an interface spec, in order.
pub fn interface_names(spec: &str) -> Vec<&str> {
    spec.split(INTERFACE_SEPARATOR)
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect()
}

/// First candidate interface of a spec, or `""` when it names none.
pub fn primary_interface(spec: &str) -> &str {
    interface_names(spec).first().copied().unwrap_or("")
}

/// A resolved cluster member identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeIdentity {
    /// Name that resolved; the member's address in the membership list
    pub resolved_name: String,
    /// Id derived from `resolved_name`
    pub node_id: u32,
}

impl NodeIdentity {
    fn from_resolved(name: &str) -> Self {
        Self {
            resolved_name: name.to_string(),
            node_id: derive_node_id(name),
        }
    }
}

/// Resolves interface addresses, member identities and link parameters.
#[derive(Clone)]
pub struct NetworkIdentityResolver {
    dns: Arc<dyn DnsResolver>,
    inspector: Arc<dyn NetworkInspector>,
}

impl std::fmt::Debug for NetworkIdentityResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkIdentityResolver").finish_non_exhaustive()
    }
}

impl NetworkIdentityResolver {
    pub fn new(dns: Arc<dyn DnsResolver>, inspector: Arc<dyn NetworkInspector>) -> Self {
        Self { dns, inspector }
    }

    /// First usable IPv4 address over the candidate interfaces of `spec`.
    #[instrument(skip(self))]
    pub async fn resolve_address(&self, spec: &str) -> Result<Ipv4Addr> {
        for iface in interface_names(spec) {
            let addrs = match self.inspector.ipv4_addresses(iface).await {
                Ok(addrs) => addrs,
                Err(e) => {
                    debug!(iface, error = %e, "Interface not usable");
                    continue;
                }
            };

            if let Some(addr) = addrs.into_iter().find(|a| !a.is_unspecified()) {
                debug!(iface, %addr, "Resolved interface address");
                return Ok(addr);
            }
        }

        Err(Error::InterfaceUnresolvable {
            spec: spec.to_string(),
        })
    }

    /// Resolve a member name through the fallback chain:
    ///
    /// 1. its CNAME target, if it has one that resolves
    /// 2. the name as given
    /// 3. the short host label before the first `.`
    ///
    /// Exhausting the chain is fatal; there is no default identity.
    #[instrument(skip(self))]
    pub async fn resolve_node_identity(&self, name: &str) -> Result<NodeIdentity> {
        if let Some(cname) = self.dns.canonical_name(name).await {
            if cname != name && self.resolves(&cname).await {
                debug!(%cname, "Resolved via canonical name");
                return Ok(NodeIdentity::from_resolved(&cname));
            }
        }

        if self.resolves(name).await {
            return Ok(NodeIdentity::from_resolved(name));
        }

        let short = name.split('.').next().unwrap_or(name);
        if short != name && !short.is_empty() && self.resolves(short).await {
            debug!(%short, "Resolved via short host name");
            return Ok(NodeIdentity::from_resolved(short));
        }

        Err(Error::HostUnresolvable {
            name: name.to_string(),
        })
    }

    async fn resolves(&self, name: &str) -> bool {
        !self.dns.resolve(name).await.is_empty()
    }

    /// MTU to write for the group-communication layer on `iface`.
    ///
    /// Detected link MTU minus [`NETMTU_HEADROOM`]; a failed or empty query
    /// counts as [`DEFAULT_LINK_MTU`].
    pub async fn detect_netmtu(&self, iface: &str) -> u32 {
        let mtu = match self.inspector.link_mtu(iface).await {
            Ok(mtu) if mtu > 0 => mtu,
            Ok(_) => DEFAULT_LINK_MTU,
            Err(e) => {
                debug!(iface, error = %e, "MTU detection failed, assuming {}", DEFAULT_LINK_MTU);
                DEFAULT_LINK_MTU
            }
        };
        mtu.saturating_sub(NETMTU_HEADROOM)
    }

    /// Hardware address of `iface`, or [`PLACEHOLDER_HARDWARE_ADDRESS`].
    ///
    /// The boolean is false when the placeholder was substituted.
    pub async fn detect_hardware_address(&self, iface: &str) -> (String, bool) {
        match self.inspector.link_hardware_address(iface).await {
            Ok(addr) if is_usable_hardware_address(&addr) => (addr, true),
            Ok(_) | Err(_) => {
                debug!(iface, "No usable hardware address, using placeholder");
                (PLACEHOLDER_HARDWARE_ADDRESS.to_string(), false)
            }
        }
    }
}

fn is_usable_hardware_address(addr: &str) -> bool {
    let addr = addr.trim();
    !addr.is_empty() && addr.chars().any(|c| c.is_ascii_hexdigit() && c != '0')
}
