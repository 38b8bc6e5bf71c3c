//! Property-Based Tests for Cluster Membership
//!
//! # Test Properties
//!
//! 1. **Determinism**: the same identity always yields the same node id
//! 2. **Range**: node ids fit the signed 32-bit id space
//! 3. **All-or-nothing**: a build succeeds only if every member resolves
//! 4. **Stable rendering**: identical inputs render identical nodelists

#![cfg(test)]

use std::collections::BTreeSet;
use std::net::{IpAddr, Ipv4Addr};
use std::sync::Arc;

use proptest::prelude::*;

use super::membership::ClusterMembershipBuilder;
use crate::network::{
    derive_node_id, NetworkIdentityResolver, StaticDnsResolver, StaticNetworkInspector,
};

// =============================================================================
// Property Strategies
// =============================================================================

/// Strategy for DNS-ish host names.
fn host_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,12}(\\.[a-z]{2,8}){0,2}"
}

/// Distinct member names paired with whether each one resolves.
fn members_strategy() -> impl Strategy<Value = Vec<(String, bool)>> {
    prop::collection::btree_set(host_strategy(), 1..8).prop_flat_map(|names| {
        let names: Vec<String> = names.into_iter().collect();
        let len = names.len();
        (Just(names), prop::collection::vec(any::<bool>(), len))
            .prop_map(|(names, ok)| names.into_iter().zip(ok).collect())
    })
}

fn resolver_for(members: &[(String, bool)]) -> NetworkIdentityResolver {
    let mut dns = StaticDnsResolver::new();
    for (name, resolvable) in members {
        if *resolvable {
            dns = dns.with_host(name, IpAddr::V4(Ipv4Addr::LOCALHOST));
        }
    }
    NetworkIdentityResolver::new(Arc::new(dns), Arc::new(StaticNetworkInspector::new()))
}

// =============================================================================
// Node Id Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: ids are a pure function of the identity and stay below 2^31.
    #[test]
    fn prop_node_id_deterministic_and_in_range(identity in ".{0,64}") {
        let id = derive_node_id(&identity);
        prop_assert_eq!(id, derive_node_id(&identity.clone()));
        prop_assert!(id <= i32::MAX as u32);
    }
}

// =============================================================================
// Membership Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: the build fails iff some member is unresolvable, and a
    /// successful build has one entry per member in input order.
    #[test]
    fn prop_build_all_or_nothing(members in members_strategy()) {
        let resolver = resolver_for(&members);
        let names: Vec<String> = members.iter().map(|(n, _)| n.clone()).collect();
        // A dotted name may still resolve through its short label.
        let resolvable: BTreeSet<&str> = members
            .iter()
            .filter(|(_, ok)| *ok)
            .map(|(n, _)| n.as_str())
            .collect();
        let all_resolve = names.iter().all(|n| {
            resolvable.contains(n.as_str())
                || resolvable.contains(n.split('.').next().unwrap_or(n))
        });

        let result = tokio_test::block_on(ClusterMembershipBuilder::new(&resolver).build(&names));

        prop_assert_eq!(result.is_ok(), all_resolve);
        if let Ok(list) = result {
            prop_assert_eq!(list.len(), names.len());
            for (entry, name) in list.entries().iter().zip(&names) {
                prop_assert!(name.starts_with(entry.node_name.as_str()));
                prop_assert_eq!(entry.derived_id, derive_node_id(&entry.node_name));
            }
        }
    }

    /// Property: two independent builds render byte-identical nodelists.
    #[test]
    fn prop_render_is_stable(hosts in prop::collection::vec(host_strategy(), 1..6)) {
        let members: Vec<(String, bool)> = hosts.iter().map(|h| (h.clone(), true)).collect();

        let first = tokio_test::block_on(
            ClusterMembershipBuilder::new(&resolver_for(&members)).build(&hosts),
        )?;
        let second = tokio_test::block_on(
            ClusterMembershipBuilder::new(&resolver_for(&members)).build(&hosts),
        )?;

        prop_assert_eq!(first.render(), second.render());
        prop_assert_eq!(first.render().matches("  node {\n").count(), hosts.len());
    }
}
