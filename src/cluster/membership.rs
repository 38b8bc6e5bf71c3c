//! Cluster Membership
//!
//! Builds the explicit member list appended to the IPv4 group-communication
//! config. Each node builds it independently, so for identical inputs the
//! rendered block must be byte-identical on every node and every rerun.

use tracing::{info, instrument};

use crate::config::{ClusterTopology, NodeConfiguration};
use crate::error::Result;
use crate::network::NetworkIdentityResolver;

/// One member of the group-communication ring
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipEntry {
    /// Name the member resolved under, written as its ring address
    pub node_name: String,
    /// Deterministic id derived from `node_name`
    pub derived_id: u32,
}

/// Ordered membership, in the order of the source name list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipList {
    entries: Vec<MembershipEntry>,
}

impl MembershipList {
    pub fn entries(&self) -> &[MembershipEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render as a `nodelist` block, one `node` stanza per entry.
    pub fn render(&self) -> String {
        let mut out = String::from("\nnodelist {\n");
        for entry in &self.entries {
            out.push_str("  node {\n");
            out.push_str(&format!("    ring0_addr: {}\n", entry.node_name));
            out.push_str(&format!("    nodeid: {}\n", entry.derived_id));
            out.push_str("  }\n");
        }
        out.push_str("}\n");
        out
    }
}

impl FromIterator<MembershipEntry> for MembershipList {
    fn from_iter<I: IntoIterator<Item = MembershipEntry>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Member names for a node: the explicit list when configured, otherwise
/// every topology key in sorted order.
pub fn member_names(config: &NodeConfiguration, topology: &ClusterTopology) -> Vec<String> {
    match &config.cluster_nodes {
        Some(nodes) => nodes.clone(),
        None => topology.keys().cloned().collect(),
    }
}

/// Builds membership lists by resolving every member's identity.
#[derive(Debug, Clone, Copy)]
pub struct ClusterMembershipBuilder<'a> {
    identity: &'a NetworkIdentityResolver,
}

impl<'a> ClusterMembershipBuilder<'a> {
    pub fn new(identity: &'a NetworkIdentityResolver) -> Self {
        Self { identity }
    }

    /// Resolve every name in order.
    ///
    /// The first unresolvable name aborts the build; a partial list is
    /// never returned.
    #[instrument(skip_all, fields(members = names.len()))]
    pub async fn build(&self, names: &[String]) -> Result<MembershipList> {
        let mut entries = Vec::with_capacity(names.len());
        for name in names {
            let identity = self.identity.resolve_node_identity(name).await?;
            entries.push(MembershipEntry {
                node_name: identity.resolved_name,
                derived_id: identity.node_id,
            });
        }

        info!(members = entries.len(), "Built cluster membership");
        Ok(MembershipList { entries })
    }
}
