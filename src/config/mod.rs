//! Node Configuration Model
//!
//! Typed view of the per-node configuration document and the nested blocks
//! that are serialized for the storage client (`ccow.json`), the storage
//! daemon (`ccowd.json`) and the audit subsystem.
//!
//! Field names follow the on-disk schema the daemons consume. Optional
//! scalars left at zero or empty are omitted on output so that a rewritten
//! file carries exactly what the operator configured.

pub mod paths;

use std::collections::BTreeMap;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::transport::{RtlfsConfig, RtrdConfig, TransportKind};

pub use paths::{SynthesisPaths, DEFAULT_INSTALL_ROOT};

/// Node role that may run without local storage devices.
pub const GATEWAY_ROLE: &str = "gateway";

/// Cluster topology: node name to that peer's configuration.
///
/// Ordered so member names iterate the same way on every node.
pub type ClusterTopology = BTreeMap<String, NodeConfiguration>;

fn is_zero_i32(v: &i32) -> bool {
    *v == 0
}

fn is_zero_u16(v: &u16) -> bool {
    *v == 0
}

// =============================================================================
// Storage Client (ccow)
// =============================================================================

/// Transaction log tuning for the storage client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrlogConfig {
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub interval: i32,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub quarantine: i32,
}

/// Tenant defaults for the storage client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TenantConfig {
    #[serde(default)]
    pub unicast_io: i32,
    #[serde(default)]
    pub failure_domain: i32,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub replication_count: i32,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub sync_put: i32,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub sync_put_named: i32,
}

/// Client-facing network settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientNetwork {
    #[serde(default)]
    pub broker_interfaces: String,
    #[serde(default)]
    pub server_unix_socket: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub broker_ip4addr: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub server_ip4addr: String,
    #[serde(default, skip_serializing_if = "is_zero_u16")]
    pub server_port: u16,
}

/// Storage client configuration block, written as `ccow.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub trlog: TrlogConfig,
    #[serde(default)]
    pub tenant: TenantConfig,
    #[serde(default)]
    pub network: ClientNetwork,
}

// =============================================================================
// Storage Daemon (ccowd)
// =============================================================================

/// Daemon-facing network settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DaemonNetwork {
    #[serde(default)]
    pub server_interfaces: String,
    #[serde(default)]
    pub server_unix_socket: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub server_ip4addr: String,
    #[serde(default, skip_serializing_if = "is_zero_u16")]
    pub server_port: u16,
}

/// Background job tuning for the daemon's replicated devices
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackgroundConfig {
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub trlog_delete_after_hours: i32,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub speculative_backref_timeout: i32,
}

/// Storage daemon configuration block, written as `ccowd.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DaemonConfig {
    #[serde(rename = "repdev_bg_config", default)]
    pub background: BackgroundConfig,
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub zone: i32,
    #[serde(default)]
    pub network: DaemonNetwork,
    #[serde(default)]
    pub transport: Vec<String>,
}

impl DaemonConfig {
    /// Transport kind selected for this node, if any.
    pub fn transport_kind(&self) -> Option<TransportKind> {
        self.transport.first().map(|t| TransportKind::parse(t))
    }
}

// =============================================================================
// Audit Subsystem
// =============================================================================

/// Audit subsystem settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditConfig {
    #[serde(default)]
    pub is_aggregator: i32,
}

// =============================================================================
// Node Configuration
// =============================================================================

/// Root configuration aggregate for one node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeConfiguration {
    #[serde(default)]
    pub ccow: ClientConfig,
    #[serde(default)]
    pub ccowd: DaemonConfig,
    #[serde(default)]
    pub auditd: AuditConfig,
    /// `1` selects IPv4 with an explicit node list; anything else selects
    /// IPv6 with multicast autodetection.
    #[serde(default, skip_serializing_if = "is_zero_i32")]
    pub ipv4_autodetect: i32,
    /// Root directory scanned for filesystem backing locations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rtlfs_autodetect: Option<String>,
    /// Explicit, ordered cluster member names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_nodes: Option<Vec<String>>,
    #[serde(default)]
    pub rtrd: RtrdConfig,
    #[serde(default)]
    pub rtlfs: RtlfsConfig,
    #[serde(rename = "nodeType", default)]
    pub node_type: String,
}

impl NodeConfiguration {
    /// True when IPv4 explicit-membership mode is selected.
    pub fn ipv4_explicit(&self) -> bool {
        self.ipv4_autodetect == 1
    }

    /// True when the node runs the gateway role.
    pub fn is_gateway(&self) -> bool {
        self.node_type == GATEWAY_ROLE
    }

    /// Autodetect root, when one is configured and non-empty.
    pub fn rtlfs_autodetect_root(&self) -> Option<&str> {
        self.rtlfs_autodetect.as_deref().filter(|r| !r.is_empty())
    }
}

// =============================================================================
// Loading
// =============================================================================

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Parse a configuration document, choosing the format from the extension.
pub(crate) fn parse_document<T: DeserializeOwned>(path: &Path, text: &str) -> Result<T> {
    if is_yaml(path) {
        Ok(serde_yaml::from_str(text)?)
    } else {
        Ok(serde_json::from_str(text)?)
    }
}

/// Load the node configuration.
///
/// A file that does not exist means no configuration was provisioned and
/// yields `Ok(None)`; the synthesizer turns that into [`Error::ConfigMissing`].
pub async fn load_node_config(path: &Path) -> Result<Option<NodeConfiguration>> {
    let text = match tokio::fs::read_to_string(path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Node configuration file not found");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    let config = parse_document(path, &text)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
    Ok(Some(config))
}

/// Load a cluster topology map of node name to peer configuration.
pub async fn load_topology(path: &Path) -> Result<ClusterTopology> {
    let text = tokio::fs::read_to_string(path).await?;
    parse_document(path, &text).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
}
