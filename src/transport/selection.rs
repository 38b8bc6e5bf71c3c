//! Transport Selection
//!
//! Decides, once per run, which transport file a node receives:
//!
//! ```text
//! rtrd configured ──────────▶ devices or gateway? ──yes──▶ RawDevice
//!                                                 └─no───▶ Skipped
//! rtlfs_autodetect set ─────▶ discover (+placeholders) ──▶ Filesystem
//! rtlfs configured ─────────▶ devices or gateway? ──yes──▶ Filesystem
//!                                                 └─no───▶ Skipped
//! anything else ────────────────────────────────────────▶ NotReconfigured
//! ```
//!
//! A node listing devices without the gateway role is legitimate (devices
//! may not be attached yet), so that case is a warning and not an error.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::discovery::{ensure_minimum_backing_locations, DEFAULT_MIN_BACKING_LOCATIONS};
use super::{RtlfsConfig, RtrdConfig, TransportKind};
use crate::config::NodeConfiguration;
use crate::error::Result;

/// Outcome of transport selection
#[derive(Debug, Clone, PartialEq)]
pub enum TransportPlan {
    /// Write the raw-device transport file
    RawDevice(RtrdConfig),
    /// Write the filesystem transport file
    Filesystem {
        config: RtlfsConfig,
        /// Locations came from scanning an autodetect root
        autodetected: bool,
    },
    /// A transport was configured but there is nothing to write
    Skipped { warning: String },
    /// The transport is not reconfigured by this run
    NotReconfigured,
}

/// Chooses and builds the transport configuration for a node
#[derive(Debug, Clone)]
pub struct TransportConfigurator {
    min_backing_locations: usize,
}

impl Default for TransportConfigurator {
    fn default() -> Self {
        Self {
            min_backing_locations: DEFAULT_MIN_BACKING_LOCATIONS,
        }
    }
}

impl TransportConfigurator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of placeholder locations created under an empty autodetect root.
    pub fn with_min_backing_locations(mut self, count: usize) -> Self {
        self.min_backing_locations = count;
        self
    }

    /// Evaluate the selection policy for `config`.
    ///
    /// `rtlfs_path` only names the destination in the skip warning.
    pub async fn plan(
        &self,
        config: &NodeConfiguration,
        rtlfs_path: &Path,
    ) -> Result<TransportPlan> {
        let kind = config.ccowd.transport_kind();
        debug!(
            transport = ?kind,
            node_type = %config.node_type,
            "Selecting transport configuration"
        );

        if kind == Some(TransportKind::RawDevice) {
            debug!(devices = config.rtrd.devices.len(), "RTRD configuration");
            return Ok(if !config.rtrd.devices.is_empty() || config.is_gateway() {
                TransportPlan::RawDevice(config.rtrd.clone())
            } else {
                skipped("No RTRD devices passed. No rt-rd.json created.".to_string())
            });
        }

        if let Some(root) = config.rtlfs_autodetect_root() {
            let root = PathBuf::from(root);
            let devices =
                ensure_minimum_backing_locations(&root, self.min_backing_locations).await?;
            info!(
                root = %root.display(),
                count = devices.len(),
                "Autodetected filesystem backing locations"
            );
            return Ok(TransportPlan::Filesystem {
                config: RtlfsConfig { devices },
                autodetected: true,
            });
        }

        Ok(match kind {
            Some(TransportKind::Filesystem) => {
                debug!(devices = config.rtlfs.devices.len(), "Rtlfs configuration");
                if !config.rtlfs.devices.is_empty() || config.is_gateway() {
                    TransportPlan::Filesystem {
                        config: config.rtlfs.clone(),
                        autodetected: false,
                    }
                } else {
                    skipped(format!(
                        "No Rtlfs devices passed. No {} created.",
                        rtlfs_path.display()
                    ))
                }
            }
            _ => {
                debug!("Transport not re-configured");
                TransportPlan::NotReconfigured
            }
        })
    }
}

fn skipped(warning: String) -> TransportPlan {
    debug!(%warning, "Skipping transport file");
    TransportPlan::Skipped { warning }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::BackingLocation;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn node(transport: &str, node_type: &str) -> NodeConfiguration {
        let mut config = NodeConfiguration {
            node_type: node_type.to_string(),
            ..Default::default()
        };
        config.ccowd.transport = vec![transport.to_string()];
        config
    }

    fn rtlfs_path() -> PathBuf {
        PathBuf::from("/opt/nedge/etc/ccow/rt-lfs.json")
    }

    #[tokio::test]
    async fn test_rtrd_with_devices() {
        let mut config = node("rtrd", "target");
        config.rtrd.devices.push(json!({ "name": "sdb", "device": "/dev/sdb" }));

        let plan = TransportConfigurator::new()
            .plan(&config, &rtlfs_path())
            .await
            .unwrap();
        assert_matches!(plan, TransportPlan::RawDevice(rtrd) if rtrd.devices.len() == 1);
    }

    #[tokio::test]
    async fn test_rtrd_gateway_without_devices() {
        let config = node("rtrd", "gateway");
        let plan = TransportConfigurator::new()
            .plan(&config, &rtlfs_path())
            .await
            .unwrap();
        assert_eq!(plan, TransportPlan::RawDevice(RtrdConfig::default()));
    }

    #[tokio::test]
    async fn test_rtrd_without_devices_is_skipped() {
        let config = node("rtrd", "target");
        let plan = TransportConfigurator::new()
            .plan(&config, &rtlfs_path())
            .await
            .unwrap();
        assert_matches!(plan, TransportPlan::Skipped { warning } if warning.contains("RTRD"));
    }

    #[tokio::test]
    async fn test_rtrd_wins_over_autodetect() {
        let mut config = node("rtrd", "gateway");
        config.rtlfs_autodetect = Some("/definitely/not/here".into());

        let plan = TransportConfigurator::new()
            .plan(&config, &rtlfs_path())
            .await
            .unwrap();
        assert_matches!(plan, TransportPlan::RawDevice(_));
    }

    #[tokio::test]
    async fn test_autodetect_discovers_locations() {
        let root = tempfile::tempdir().unwrap();
        let mut config = node("rtlfs", "target");
        config.rtlfs_autodetect = Some(root.path().display().to_string());

        let plan = TransportConfigurator::new()
            .with_min_backing_locations(2)
            .plan(&config, &rtlfs_path())
            .await
            .unwrap();

        assert_matches!(plan, TransportPlan::Filesystem { config, autodetected: true } => {
            let names: Vec<_> = config.devices.iter().map(|d| d.name.as_str()).collect();
            assert_eq!(names, vec!["device-0", "device-1"]);
        });
    }

    #[tokio::test]
    async fn test_autodetect_applies_without_transport_list() {
        let root = tempfile::tempdir().unwrap();
        tokio::fs::create_dir(root.path().join("ssd0")).await.unwrap();
        let config = NodeConfiguration {
            rtlfs_autodetect: Some(root.path().display().to_string()),
            ..Default::default()
        };

        let plan = TransportConfigurator::new()
            .plan(&config, &rtlfs_path())
            .await
            .unwrap();
        assert_matches!(plan, TransportPlan::Filesystem { autodetected: true, .. });
    }

    #[tokio::test]
    async fn test_explicit_rtlfs_devices() {
        let mut config = node("rtlfs", "target");
        config
            .rtlfs
            .devices
            .push(BackingLocation::discovered("disk0", "/data/disk0"));

        let plan = TransportConfigurator::new()
            .plan(&config, &rtlfs_path())
            .await
            .unwrap();
        assert_matches!(
            plan,
            TransportPlan::Filesystem { autodetected: false, config } if config.devices.len() == 1
        );
    }

    #[tokio::test]
    async fn test_rtlfs_without_devices_is_skipped() {
        let config = node("rtlfs", "target");
        let plan = TransportConfigurator::new()
            .plan(&config, &rtlfs_path())
            .await
            .unwrap();
        assert_matches!(
            plan,
            TransportPlan::Skipped { warning } if warning.contains("rt-lfs.json")
        );
    }

    #[tokio::test]
    async fn test_unknown_transport_is_not_reconfigured() {
        let plan = TransportConfigurator::new()
            .plan(&node("rtkvs", "target"), &rtlfs_path())
            .await
            .unwrap();
        assert_eq!(plan, TransportPlan::NotReconfigured);

        let plan = TransportConfigurator::new()
            .plan(&NodeConfiguration::default(), &rtlfs_path())
            .await
            .unwrap();
        assert_eq!(plan, TransportPlan::NotReconfigured);
    }
}
