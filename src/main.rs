//! nodeconf
//!
//! Synthesizes the runtime configuration of one storage cluster node.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            nodeconf                              │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────┐       │
//! │  │  node config │───▶│  Synthesizer │───▶│  etc/ccow    │       │
//! │  │  + topology  │    │              │    │  etc/corosync│       │
//! │  └──────────────┘    └──────────────┘    └──────────────┘       │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use nodeconf::config::{load_node_config, load_topology, ClusterTopology, SynthesisPaths};
use nodeconf::network::{DnsResolver, HickoryDnsResolver, SystemNetworkInspector, SYSFS_NET_ROOT};
use nodeconf::synth::{dns_resolver_for, ConfigSynthesizer};

// =============================================================================
// CLI Arguments
// =============================================================================

/// nodeconf - Per-node configuration synthesis for storage cluster daemons
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Node configuration document (JSON, or YAML by extension)
    #[arg(long, env = "NODECONF_CONFIG")]
    config: PathBuf,

    /// Cluster topology document used when the node lists no members
    #[arg(long, env = "NODECONF_TOPOLOGY")]
    topology: Option<PathBuf>,

    /// Install root of the storage software
    #[arg(long, env = "NEDGE_HOME")]
    install_root: Option<PathBuf>,

    /// Artifact path overrides (JSON or YAML)
    #[arg(long, env = "NODECONF_PATHS")]
    paths: Option<PathBuf>,

    /// Root of the sysfs network class directory
    #[arg(long, env = "NODECONF_SYSFS_NET_ROOT", default_value = SYSFS_NET_ROOT)]
    sysfs_net_root: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "warn")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    init_logging(&args);

    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Node configuration failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args) -> anyhow::Result<()> {
    let mut paths = match &args.paths {
        Some(path) => SynthesisPaths::load(path)
            .await
            .with_context(|| format!("loading artifact paths from {}", path.display()))?,
        None => SynthesisPaths::default(),
    };
    if let Some(root) = &args.install_root {
        paths.install_root = root.clone();
    }

    info!("Starting node configuration");
    info!("  Config: {}", args.config.display());
    info!("  Install root: {}", paths.install_root.display());

    let config = load_node_config(&args.config)
        .await
        .with_context(|| format!("loading node configuration {}", args.config.display()))?;

    let topology = match &args.topology {
        Some(path) => load_topology(path)
            .await
            .with_context(|| format!("loading cluster topology {}", path.display()))?,
        None => ClusterTopology::new(),
    };
    debug!(members = topology.len(), "Loaded cluster topology");

    let dns = dns_resolver_for(config.as_ref(), || {
        let resolver: Arc<dyn DnsResolver> = Arc::new(HickoryDnsResolver::from_system_conf()?);
        Ok(resolver)
    })
    .context("initializing DNS resolver")?;
    let inspector = SystemNetworkInspector::new(&args.sysfs_net_root);

    let synthesizer = ConfigSynthesizer::new(paths, dns, Arc::new(inspector))
        .with_observer(|event| println!("{}", event));
    let report = synthesizer.synthesize(config, &topology).await?;

    debug!(artifacts = report.artifacts.len(), "Synthesis finished");
    println!("Configuration applied successfully.");

    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let mut filter = EnvFilter::from_default_env().add_directive(level.into());
    for directive in ["hickory_resolver=warn", "hickory_proto=warn"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    // Logs go to stderr; stdout carries the confirmation lines.
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init();
    }
}
