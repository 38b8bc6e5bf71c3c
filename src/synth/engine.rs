//! Synthesis Engine
//!
//! Sequences network configuration, membership, structured config files,
//! transport selection and the audit config for one node.

use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::cluster::{member_names, ClusterMembershipBuilder};
use crate::config::{ClusterTopology, NodeConfiguration, SynthesisPaths, DEFAULT_INSTALL_ROOT};
use crate::error::{Error, Result};
use crate::network::{
    derive_node_id, primary_interface, DnsResolver, NetworkIdentityResolver, NetworkInspector,
    StaticDnsResolver,
};
use crate::transport::{TransportConfigurator, TransportPlan};
use crate::writer::{ConfigWriter, Substitution};

/// Tenant `unicast_io` value always written to the client config; keeps
/// client I/O off multicast.
pub const FORCED_UNICAST_IO: i32 = 3;

/// Placeholder in templates rewritten to the install root.
const INSTALL_ROOT_TOKEN: &str = DEFAULT_INSTALL_ROOT;

// =============================================================================
// Report
// =============================================================================

/// Group-communication addressing mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NetworkMode {
    /// IPv4 with an explicit member list
    Ipv4Explicit,
    /// IPv6 with multicast member discovery
    Ipv6Multicast,
}

impl NetworkMode {
    pub fn of(config: &NodeConfiguration) -> Self {
        if config.ipv4_explicit() {
            NetworkMode::Ipv4Explicit
        } else {
            NetworkMode::Ipv6Multicast
        }
    }

    /// Only explicit membership resolves member names through DNS.
    pub fn uses_dns(self) -> bool {
        matches!(self, NetworkMode::Ipv4Explicit)
    }
}

/// DNS resolver for a run over `config`.
///
/// `connect` is called only when the configured mode resolves names; any
/// other run, including one with no configuration, gets an empty resolver
/// that is never queried.
pub fn dns_resolver_for<F>(
    config: Option<&NodeConfiguration>,
    connect: F,
) -> Result<Arc<dyn DnsResolver>>
where
    F: FnOnce() -> Result<Arc<dyn DnsResolver>>,
{
    match config.map(NetworkMode::of) {
        Some(mode) if mode.uses_dns() => connect(),
        _ => Ok(Arc::new(StaticDnsResolver::new())),
    }
}

impl std::fmt::Display for NetworkMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkMode::Ipv4Explicit => write!(f, "ipv4-explicit"),
            NetworkMode::Ipv6Multicast => write!(f, "ipv6-multicast"),
        }
    }
}

/// A file written by the run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub path: PathBuf,
    /// Suffix for the confirmation line, e.g. `", transport=rtlfs"`
    pub detail: String,
}

impl std::fmt::Display for Artifact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Configured {}{}", self.path.display(), self.detail)
    }
}

/// Outcome of a successful synthesis run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SynthesisReport {
    pub network_mode: NetworkMode,
    /// MTU written for the group-communication layer
    pub netmtu: u32,
    /// Written files, in write order
    pub artifacts: Vec<Artifact>,
    /// Conditions that were downgraded from errors
    pub warnings: Vec<String>,
    /// Informational outcomes
    pub notices: Vec<String>,
}

impl SynthesisReport {
    fn new(network_mode: NetworkMode) -> Self {
        Self {
            network_mode,
            netmtu: 0,
            artifacts: Vec::new(),
            warnings: Vec::new(),
            notices: Vec::new(),
        }
    }
}

/// Progress of a run, delivered as it happens
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynthesisEvent<'a> {
    /// A file was written
    Configured(&'a Artifact),
    /// A condition downgraded from an error
    Warning(&'a str),
    /// An informational outcome
    Notice(&'a str),
}

impl std::fmt::Display for SynthesisEvent<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SynthesisEvent::Configured(artifact) => write!(f, "{}", artifact),
            SynthesisEvent::Warning(warning) => write!(f, "Warning: {}", warning),
            SynthesisEvent::Notice(notice) => f.write_str(notice),
        }
    }
}

type EventObserver = Arc<dyn Fn(&SynthesisEvent<'_>) + Send + Sync>;

// =============================================================================
// Synthesizer
// =============================================================================

/// Runs configuration synthesis for a node.
pub struct ConfigSynthesizer {
    paths: SynthesisPaths,
    identity: NetworkIdentityResolver,
    transport: TransportConfigurator,
    writer: ConfigWriter,
    observer: Option<EventObserver>,
}

impl std::fmt::Debug for ConfigSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigSynthesizer")
            .field("paths", &self.paths)
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

impl ConfigSynthesizer {
    pub fn new(
        paths: SynthesisPaths,
        dns: Arc<dyn DnsResolver>,
        inspector: Arc<dyn NetworkInspector>,
    ) -> Self {
        Self {
            paths,
            identity: NetworkIdentityResolver::new(dns, inspector),
            transport: TransportConfigurator::new(),
            writer: ConfigWriter::new(),
            observer: None,
        }
    }

    /// Deliver every artifact, warning and notice to `observer` as soon as
    /// it is recorded, so a failed run still reports what it wrote.
    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: Fn(&SynthesisEvent<'_>) + Send + Sync + 'static,
    {
        self.observer = Some(Arc::new(observer));
        self
    }

    /// Replace the transport selection policy.
    pub fn with_transport_configurator(mut self, transport: TransportConfigurator) -> Self {
        self.transport = transport;
        self
    }

    fn emit(&self, event: SynthesisEvent<'_>) {
        if let Some(observer) = &self.observer {
            observer(&event);
        }
    }

    fn record(&self, report: &mut SynthesisReport, path: PathBuf, detail: impl Into<String>) {
        let artifact = Artifact {
            path,
            detail: detail.into(),
        };
        info!("{}", artifact);
        self.emit(SynthesisEvent::Configured(&artifact));
        report.artifacts.push(artifact);
    }

    fn warn(&self, report: &mut SynthesisReport, warning: impl Into<String>) {
        let warning = warning.into();
        warn!("{}", warning);
        self.emit(SynthesisEvent::Warning(&warning));
        report.warnings.push(warning);
    }

    fn notice(&self, report: &mut SynthesisReport, notice: impl Into<String>) {
        let notice = notice.into();
        info!("{}", notice);
        self.emit(SynthesisEvent::Notice(&notice));
        report.notices.push(notice);
    }

    /// Synthesize and write every artifact for `config`.
    ///
    /// `None` means no configuration was loaded and fails before any write.
    /// `topology` supplies member names when the config has no explicit list.
    #[instrument(skip_all)]
    pub async fn synthesize(
        &self,
        config: Option<NodeConfiguration>,
        topology: &ClusterTopology,
    ) -> Result<SynthesisReport> {
        let mut config = config.ok_or(Error::ConfigMissing)?;
        config.ccow.tenant.unicast_io = FORCED_UNICAST_IO;

        let mode = NetworkMode::of(&config);
        info!(%mode, node_type = %config.node_type, "Starting node configuration synthesis");

        let mut report = SynthesisReport::new(mode);
        match mode {
            NetworkMode::Ipv4Explicit => {
                self.configure_ipv4(&mut config, topology, &mut report)
                    .await?
            }
            NetworkMode::Ipv6Multicast => self.configure_ipv6(&config, &mut report).await?,
        }

        let path = self.paths.client_config_path();
        self.writer.write_json(&path, &config.ccow).await?;
        self.record(&mut report, path, "");

        let path = self.paths.daemon_config_path();
        self.writer.write_json(&path, &config.ccowd).await?;
        let transport = config
            .ccowd
            .transport_kind()
            .map(|k| k.to_string())
            .unwrap_or_default();
        self.record(&mut report, path, format!(", transport={}", transport));

        self.configure_transport(&config, &mut report).await?;
        self.configure_audit(&config, &mut report).await?;

        info!(
            artifacts = report.artifacts.len(),
            warnings = report.warnings.len(),
            "Configuration applied"
        );
        Ok(report)
    }

    /// IPv4: resolve addresses, build membership, then materialize the
    /// IPv4 template with the nodelist appended.
    async fn configure_ipv4(
        &self,
        config: &mut NodeConfiguration,
        topology: &ClusterTopology,
        report: &mut SynthesisReport,
    ) -> Result<()> {
        let server_ip = self
            .identity
            .resolve_address(&config.ccowd.network.server_interfaces)
            .await?
            .to_string();
        config.ccowd.network.server_ip4addr = server_ip.clone();
        config.ccow.network.server_ip4addr = server_ip;

        let broker_ip = self
            .identity
            .resolve_address(&config.ccow.network.broker_interfaces)
            .await?;
        config.ccow.network.broker_ip4addr = broker_ip.to_string();

        // Resolve every member before touching the file; a failed build must
        // not leave a half-written member list behind.
        let names = member_names(config, topology);
        if names.is_empty() {
            self.warn(report, "No cluster nodes configured, writing an empty nodelist");
        }
        let membership = ClusterMembershipBuilder::new(&self.identity)
            .build(&names)
            .await?;

        let netmtu = self
            .identity
            .detect_netmtu(primary_interface(&config.ccowd.network.server_interfaces))
            .await;

        let dst = self.paths.corosync_config_path();
        self.writer
            .apply_template(&self.paths.corosync_ipv4_template_path(), &dst, &[])
            .await?;
        self.writer.append_text(&dst, &membership.render()).await?;
        self.writer
            .substitute_in_place(
                &dst,
                &[
                    Substitution::literal(INSTALL_ROOT_TOKEN, self.paths.install_root_value()),
                    Substitution::line("netmtu:", format!(" {}", netmtu)),
                ],
            )
            .await?;

        report.netmtu = netmtu;
        self.record(
            report,
            dst,
            format!(" to use IPv4 and explicit node list, netmtu={}", netmtu),
        );
        Ok(())
    }

    /// IPv6 / multicast: materialize the template with node id, MTU and
    /// bind interface; membership comes from multicast discovery.
    async fn configure_ipv6(
        &self,
        config: &NodeConfiguration,
        report: &mut SynthesisReport,
    ) -> Result<()> {
        let iface = primary_interface(&config.ccowd.network.server_interfaces);
        let netmtu = self.identity.detect_netmtu(iface).await;

        let (ether, detected) = self.identity.detect_hardware_address(iface).await;
        if !detected {
            self.warn(report, format!("Cannot detect Ether address of {}", iface));
        }
        let node_id = derive_node_id(&ether);

        let dst = self.paths.corosync_config_path();
        self.writer
            .apply_template(
                &self.paths.corosync_template_path(),
                &dst,
                &[
                    Substitution::line("netmtu:", format!(" {}", netmtu)),
                    Substitution::line("nodeid:", format!(" {}", node_id)),
                    Substitution::line("bindnetaddr:", format!(" {}", iface)),
                    Substitution::literal(INSTALL_ROOT_TOKEN, self.paths.install_root_value()),
                ],
            )
            .await?;

        report.netmtu = netmtu;
        self.record(
            report,
            dst,
            format!(
                " to use IPv6 and autodetect, nodeid={}, netmtu={}",
                node_id, netmtu
            ),
        );
        Ok(())
    }

    async fn configure_transport(
        &self,
        config: &NodeConfiguration,
        report: &mut SynthesisReport,
    ) -> Result<()> {
        let rtlfs_path = self.paths.rtlfs_config_path();

        match self.transport.plan(config, &rtlfs_path).await? {
            TransportPlan::RawDevice(rtrd) => {
                let path = self.paths.rtrd_config_path();
                self.writer.write_json(&path, &rtrd).await?;
                self.record(report, path, format!(", devices={}", rtrd.devices.len()));
            }
            TransportPlan::Filesystem {
                config: rtlfs,
                autodetected,
            } => {
                self.writer.write_json(&rtlfs_path, &rtlfs).await?;
                let source = if autodetected { "autodetected" } else { "configured" };
                self.record(
                    report,
                    rtlfs_path,
                    format!(", devices={} ({})", rtlfs.devices.len(), source),
                );
            }
            TransportPlan::Skipped { warning } => self.warn(report, warning),
            TransportPlan::NotReconfigured => {
                self.notice(report, "Driver transport not re-configured")
            }
        }
        Ok(())
    }

    async fn configure_audit(
        &self,
        config: &NodeConfiguration,
        report: &mut SynthesisReport,
    ) -> Result<()> {
        let dst = self.paths.audit_config_path();
        self.writer
            .apply_template(
                &self.paths.audit_template_path(),
                &dst,
                &[
                    Substitution::line("is_aggregator=", config.auditd.is_aggregator),
                    Substitution::literal(INSTALL_ROOT_TOKEN, self.paths.install_root_value()),
                ],
            )
            .await?;
        self.record(report, dst, "");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{StaticDnsResolver, StaticNetworkInspector};
    use assert_matches::assert_matches;
    use std::path::Path;

    impl std::fmt::Debug for dyn DnsResolver {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("dyn DnsResolver")
        }
    }

    fn synthesizer(root: &Path) -> ConfigSynthesizer {
        ConfigSynthesizer::new(
            SynthesisPaths::under(root),
            Arc::new(StaticDnsResolver::new()),
            Arc::new(StaticNetworkInspector::new()),
        )
    }

    #[tokio::test]
    async fn test_missing_config_writes_nothing() {
        let root = tempfile::tempdir().unwrap();
        let result = synthesizer(root.path())
            .synthesize(None, &ClusterTopology::new())
            .await;

        assert_matches!(result, Err(Error::ConfigMissing));
        let mut entries = tokio::fs::read_dir(root.path()).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unresolvable_server_interface_aborts_before_writes() {
        let root = tempfile::tempdir().unwrap();
        let mut config = NodeConfiguration {
            ipv4_autodetect: 1,
            ..Default::default()
        };
        config.ccowd.network.server_interfaces = "eth0".into();

        let result = synthesizer(root.path())
            .synthesize(Some(config), &ClusterTopology::new())
            .await;

        assert_matches!(result, Err(Error::InterfaceUnresolvable { spec }) if spec == "eth0");
        assert!(!root.path().join("etc").exists());
    }

    #[test]
    fn test_network_mode_selection() {
        let mut config = NodeConfiguration::default();
        assert_eq!(NetworkMode::of(&config), NetworkMode::Ipv6Multicast);
        config.ipv4_autodetect = 1;
        assert_eq!(NetworkMode::of(&config), NetworkMode::Ipv4Explicit);
        config.ipv4_autodetect = 2;
        assert_eq!(NetworkMode::of(&config), NetworkMode::Ipv6Multicast);
    }

    #[test]
    fn test_only_explicit_membership_connects_dns() {
        let connects = std::sync::atomic::AtomicUsize::new(0);
        let connect = || -> Result<Arc<dyn DnsResolver>> {
            connects.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(Arc::new(StaticDnsResolver::new()))
        };

        let multicast = NodeConfiguration::default();
        let explicit = NodeConfiguration {
            ipv4_autodetect: 1,
            ..Default::default()
        };

        dns_resolver_for(None, connect).unwrap();
        dns_resolver_for(Some(&multicast), connect).unwrap();
        assert_eq!(connects.load(std::sync::atomic::Ordering::SeqCst), 0);

        dns_resolver_for(Some(&explicit), connect).unwrap();
        assert_eq!(connects.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[test]
    fn test_connect_failure_surfaces_for_explicit_membership() {
        let explicit = NodeConfiguration {
            ipv4_autodetect: 1,
            ..Default::default()
        };
        let result = dns_resolver_for(Some(&explicit), || {
            Err(Error::ResolverInit("no nameservers".into()))
        });
        assert_matches!(result, Err(Error::ResolverInit(_)));
    }

    #[test]
    fn test_event_lines() {
        let artifact = Artifact {
            path: PathBuf::from("/opt/nedge/etc/ccow/auditd.ini"),
            detail: String::new(),
        };
        assert_eq!(
            SynthesisEvent::Configured(&artifact).to_string(),
            "Configured /opt/nedge/etc/ccow/auditd.ini"
        );
        assert_eq!(
            SynthesisEvent::Warning("No RTRD devices passed. No rt-rd.json created.").to_string(),
            "Warning: No RTRD devices passed. No rt-rd.json created."
        );
        assert_eq!(
            SynthesisEvent::Notice("Driver transport not re-configured").to_string(),
            "Driver transport not re-configured"
        );
    }

    #[test]
    fn test_artifact_confirmation_line() {
        let artifact = Artifact {
            path: PathBuf::from("/opt/nedge/etc/ccow/ccowd.json"),
            detail: ", transport=rtrd".into(),
        };
        assert_eq!(
            artifact.to_string(),
            "Configured /opt/nedge/etc/ccow/ccowd.json, transport=rtrd"
        );
    }
}
