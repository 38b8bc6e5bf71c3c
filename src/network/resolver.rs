//! DNS Resolution
//!
//! Port for the two DNS questions identity resolution asks: "what is the
//! canonical name of X" and "does X resolve". Failures are not errors here;
//! the caller walks a fallback chain and decides when resolution is fatal.

use std::collections::HashMap;
use std::net::IpAddr;

use async_trait::async_trait;
use hickory_resolver::proto::rr::{RData, RecordType};
use hickory_resolver::TokioAsyncResolver;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::{Error, Result};

/// Trait for DNS lookups used by identity resolution.
#[async_trait]
pub trait DnsResolver: Send + Sync {
    /// Canonical name `name` aliases to, without the trailing dot.
    ///
    /// Returns `None` when there is no CNAME or the lookup fails.
    async fn canonical_name(&self, name: &str) -> Option<String>;

    /// Addresses `name` resolves to. Empty when resolution fails.
    async fn resolve(&self, name: &str) -> Vec<IpAddr>;
}

fn strip_root(name: &str) -> String {
    name.trim_end_matches('.').to_string()
}

// =============================================================================
// Hickory Resolver
// =============================================================================

/// Resolver using the system DNS configuration and hosts file.
#[derive(Clone)]
pub struct HickoryDnsResolver {
    inner: TokioAsyncResolver,
}

impl HickoryDnsResolver {
    /// Build from `/etc/resolv.conf`.
    pub fn from_system_conf() -> Result<Self> {
        let inner = TokioAsyncResolver::tokio_from_system_conf()
            .map_err(|e| Error::ResolverInit(e.to_string()))?;
        Ok(Self { inner })
    }
}

impl std::fmt::Debug for HickoryDnsResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HickoryDnsResolver").finish_non_exhaustive()
    }
}

#[async_trait]
impl DnsResolver for HickoryDnsResolver {
    async fn canonical_name(&self, name: &str) -> Option<String> {
        let lookup = match self.inner.lookup(name, RecordType::CNAME).await {
            Ok(lookup) => lookup,
            Err(e) => {
                debug!(name, error = %e, "CNAME lookup failed");
                return None;
            }
        };

        lookup.record_iter().find_map(|record| match record.data() {
            Some(RData::CNAME(cname)) => Some(strip_root(&cname.0.to_utf8())),
            _ => None,
        })
    }

    async fn resolve(&self, name: &str) -> Vec<IpAddr> {
        match self.inner.lookup_ip(name).await {
            Ok(lookup) => lookup.iter().collect(),
            Err(e) => {
                debug!(name, error = %e, "Address lookup failed");
                Vec::new()
            }
        }
    }
}

// =============================================================================
// Static Resolver
// =============================================================================

/// Resolver answering from preconfigured records.
///
/// Every query is recorded so the order of a fallback walk can be checked.
#[derive(Debug, Default)]
pub struct StaticDnsResolver {
    cnames: HashMap<String, String>,
    hosts: HashMap<String, Vec<IpAddr>>,
    queries: Mutex<Vec<String>>,
}

impl StaticDnsResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an address record.
    pub fn with_host(mut self, name: &str, addr: IpAddr) -> Self {
        self.hosts.entry(name.to_string()).or_default().push(addr);
        self
    }

    /// Register `alias` as a CNAME of `target`.
    pub fn with_cname(mut self, alias: &str, target: &str) -> Self {
        self.cnames.insert(alias.to_string(), strip_root(target));
        self
    }

    /// Queries issued so far, as `cname:<name>` or `a:<name>`.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl DnsResolver for StaticDnsResolver {
    async fn canonical_name(&self, name: &str) -> Option<String> {
        self.queries.lock().push(format!("cname:{}", name));
        self.cnames.get(name).cloned()
    }

    async fn resolve(&self, name: &str) -> Vec<IpAddr> {
        self.queries.lock().push(format!("a:{}", name));
        self.hosts.get(name).cloned().unwrap_or_default()
    }
}
