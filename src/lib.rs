//! nodeconf - Node Configuration Synthesis
//!
//! Turns a node's declarative configuration plus live network state into the
//! runtime files consumed by the storage cluster daemons on that node.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       ConfigSynthesizer                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐       │
//! │  │   Network    │───▶│   Cluster    │───▶│    Config    │       │
//! │  │   Identity   │    │  Membership  │    │    Writer    │       │
//! │  └──────────────┘    └──────────────┘    └──────────────┘       │
//! │          ▲                                      ▲               │
//! │   DnsResolver / NetworkInspector       Transport Selection      │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`config`] - Node configuration model, topology and artifact paths
//! - [`network`] - Interface addresses, DNS identities and node ids
//! - [`cluster`] - Group-communication member lists
//! - [`transport`] - Storage transport selection and backing discovery
//! - [`writer`] - JSON output and template materialization
//! - [`synth`] - The orchestrating synthesis engine
//! - [`error`] - Error types

pub mod cluster;
pub mod config;
pub mod error;
pub mod network;
pub mod synth;
pub mod transport;
pub mod writer;

// Re-export commonly used types
pub use cluster::{ClusterMembershipBuilder, MembershipList};
pub use config::{
    load_node_config, load_topology, ClusterTopology, NodeConfiguration, SynthesisPaths,
};
pub use error::{Error, Result};
pub use network::{
    derive_node_id, DnsResolver, HickoryDnsResolver, NetworkIdentityResolver, NetworkInspector,
    SystemNetworkInspector,
};
pub use synth::{ConfigSynthesizer, NetworkMode, SynthesisEvent, SynthesisReport};
pub use transport::{TransportConfigurator, TransportKind, TransportPlan};
