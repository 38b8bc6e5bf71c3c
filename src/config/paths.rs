//! Artifact Paths
//!
//! Locations of every template read and every file written by a synthesis
//! run. Entries are relative to the install root unless given as absolute
//! paths.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Install root used when none is provided, and the placeholder token
/// templates carry for it.
pub const DEFAULT_INSTALL_ROOT: &str = "/opt/nedge";

/// Paths of synthesis inputs and outputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesisPaths {
    /// Install root; artifact paths below are joined onto it
    pub install_root: PathBuf,
    /// Storage client config (JSON)
    pub client_config: PathBuf,
    /// Storage daemon config (JSON)
    pub daemon_config: PathBuf,
    /// Raw-device transport config (JSON)
    pub rtrd_config: PathBuf,
    /// Filesystem transport config (JSON)
    pub rtlfs_config: PathBuf,
    /// Group-communication config (text)
    pub corosync_config: PathBuf,
    /// Group-communication template for IPv6 / multicast mode
    pub corosync_template: PathBuf,
    /// Group-communication template for IPv4 explicit mode
    pub corosync_ipv4_template: PathBuf,
    /// Audit subsystem config (key=value text)
    pub audit_config: PathBuf,
    /// Audit subsystem template
    pub audit_template: PathBuf,
}

impl Default for SynthesisPaths {
    fn default() -> Self {
        Self {
            install_root: PathBuf::from(DEFAULT_INSTALL_ROOT),
            client_config: PathBuf::from("etc/ccow/ccow.json"),
            daemon_config: PathBuf::from("etc/ccow/ccowd.json"),
            rtrd_config: PathBuf::from("etc/ccow/rt-rd.json"),
            rtlfs_config: PathBuf::from("etc/ccow/rt-lfs.json"),
            corosync_config: PathBuf::from("etc/corosync/corosync.conf"),
            corosync_template: PathBuf::from("etc/corosync/corosync.conf.example"),
            corosync_ipv4_template: PathBuf::from("etc/corosync/corosync.conf.example.ipv4"),
            audit_config: PathBuf::from("etc/ccow/auditd.ini"),
            audit_template: PathBuf::from("etc/ccow/auditd.ini.example"),
        }
    }
}

impl SynthesisPaths {
    /// Default layout under the given install root.
    pub fn under(install_root: impl Into<PathBuf>) -> Self {
        Self {
            install_root: install_root.into(),
            ..Default::default()
        }
    }

    /// Load overrides from a YAML or JSON file; unspecified entries keep
    /// their defaults.
    pub async fn load(path: &Path) -> Result<Self> {
        let text = tokio::fs::read_to_string(path).await?;
        super::parse_document(path, &text)
    }

    /// Resolve an entry against the install root.
    pub fn resolve(&self, entry: &Path) -> PathBuf {
        self.install_root.join(entry)
    }

    /// Value substituted for the install-root placeholder in templates.
    pub fn install_root_value(&self) -> String {
        self.install_root.display().to_string()
    }

    pub fn client_config_path(&self) -> PathBuf {
        self.resolve(&self.client_config)
    }

    pub fn daemon_config_path(&self) -> PathBuf {
        self.resolve(&self.daemon_config)
    }

    pub fn rtrd_config_path(&self) -> PathBuf {
        self.resolve(&self.rtrd_config)
    }

    pub fn rtlfs_config_path(&self) -> PathBuf {
        self.resolve(&self.rtlfs_config)
    }

    pub fn corosync_config_path(&self) -> PathBuf {
        self.resolve(&self.corosync_config)
    }

    pub fn corosync_template_path(&self) -> PathBuf {
        self.resolve(&self.corosync_template)
    }

    pub fn corosync_ipv4_template_path(&self) -> PathBuf {
        self.resolve(&self.corosync_ipv4_template)
    }

    pub fn audit_config_path(&self) -> PathBuf {
        self.resolve(&self.audit_config)
    }

    pub fn audit_template_path(&self) -> PathBuf {
        self.resolve(&self.audit_template)
    }
}
