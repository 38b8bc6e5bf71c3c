//! Configuration Synthesis
//!
//! Orchestrates one provisioning run for a node:
//!
//! ```text
//! NodeConfiguration
//!       │
//!       ▼
//! ┌──────────────┐   IPv4    ┌──────────────┐   ┌──────────────┐
//! │ network mode │──────────▶│  addresses   │──▶│  membership  │──┐
//! │   (branch)   │           └──────────────┘   └──────────────┘  │
//! │              │   IPv6                                         ▼
//! │              │─────────────────────────────────────────▶ corosync.conf
//! └──────────────┘
//!       │
//!       ▼
//! ccow.json ─▶ ccowd.json ─▶ transport file ─▶ auditd.ini
//! ```
//!
//! The run is sequential and stops at the first fatal error. Artifacts that
//! were already written stay written.

pub mod engine;

pub use engine::{
    dns_resolver_for, Artifact, ConfigSynthesizer, NetworkMode, SynthesisEvent, SynthesisReport,
    FORCED_UNICAST_IO,
};
