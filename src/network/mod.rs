//! Network Identity
//!
//! Everything synthesis learns from the network: interface addresses, link
//! MTU and hardware address, and DNS identities of cluster members.
//!
//! # Features
//!
//! - Interface address selection over `;`-separated candidate lists
//! - CNAME → FQDN → short-name fallback chain for member names
//! - Deterministic node ids from stable identity strings
//! - MTU and hardware address detection via sysfs
//!
//! Both OS-facing capabilities are ports ([`NetworkInspector`],
//! [`DnsResolver`]) with in-memory fakes, so synthesis can run against a
//! scripted network.

pub mod identity;
pub mod inspector;
pub mod resolver;

pub use identity::{
    derive_node_id, hash128to32, interface_names, primary_interface, NetworkIdentityResolver,
    NodeIdentity, DEFAULT_LINK_MTU, NETMTU_HEADROOM, PLACEHOLDER_HARDWARE_ADDRESS,
};
pub use inspector::{
    NetworkInspector, StaticNetworkInspector, SystemNetworkInspector, SYSFS_NET_ROOT,
};
pub use resolver::{DnsResolver, HickoryDnsResolver, StaticDnsResolver};
