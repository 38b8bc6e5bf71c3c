//! Cluster Membership Components
//!
//! Deterministic member lists for the group-communication layer.

pub mod membership;

#[cfg(test)]
mod proptest;

pub use membership::{member_names, ClusterMembershipBuilder, MembershipEntry, MembershipList};
