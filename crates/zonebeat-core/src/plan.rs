//! Mapping from discovered addresses to per-name desired state

use crate::config::{NamesConfig, normalize_name};
use crate::traits::RecordType;
use std::collections::BTreeSet;
use std::net::IpAddr;
use tracing::{debug, warn};

/// Desired content for one `(name, type)` binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Desired {
    /// Every value coexists; reconciled with ensure-exists semantics
    Set(BTreeSet<String>),
    /// At most one value; reconciled with upsert semantics, `None` deletes
    Single(Option<String>),
}

impl Desired {
    /// Whether the binding wants at least one record
    pub fn has_content(&self) -> bool {
        match self {
            Desired::Set(values) => !values.is_empty(),
            Desired::Single(value) => value.is_some(),
        }
    }
}

/// One record type under a name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordBinding {
    /// Record type
    pub record_type: RecordType,
    /// Desired content
    pub desired: Desired,
}

/// Everything zonebeat wants under one name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTarget {
    /// Normalized record name
    pub name: String,
    /// Bindings, reconciled in order
    pub bindings: Vec<RecordBinding>,
    /// Proxy flag for address and alias records
    pub proxied: bool,
}

impl NameTarget {
    /// Create a target without bindings
    pub fn new(name: &str, proxied: bool) -> Self {
        Self {
            name: normalize_name(name),
            bindings: Vec::new(),
            proxied,
        }
    }

    /// Add a binding
    pub fn bind(mut self, record_type: RecordType, desired: Desired) -> Self {
        self.bindings.push(RecordBinding {
            record_type,
            desired,
        });
        self
    }

    /// Whether any binding wants a record
    ///
    /// The name-level heartbeat is refreshed while this holds and deleted
    /// once it doesn't.
    pub fn has_content(&self) -> bool {
        self.bindings.iter().any(|binding| binding.desired.has_content())
    }
}

/// Output of the address discovery step
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Discovered {
    /// Internal addresses (only IPv4 ones are published)
    pub internal: Vec<IpAddr>,
    /// Externally visible IPv4 address
    pub external_v4: Option<IpAddr>,
    /// Externally visible IPv6 address
    pub external_v6: Option<IpAddr>,
}

/// Ordered list of names to reconcile in one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    targets: Vec<NameTarget>,
}

impl SyncPlan {
    /// Create a plan from explicit targets
    pub fn new(targets: Vec<NameTarget>) -> Self {
        Self { targets }
    }

    /// Derive the plan for the configured names
    ///
    /// | name      | bindings                                    |
    /// |-----------|---------------------------------------------|
    /// | internal  | A = internal IPv4 set                       |
    /// | external  | A = external IPv4                           |
    /// | ipv6      | AAAA = external IPv6                        |
    /// | combined  | A = internal ∪ external IPv4, AAAA = IPv6   |
    /// | top-level | CNAME = combined name                       |
    pub fn build(names: &NamesConfig, discovered: &Discovered, proxied: bool) -> Self {
        let mut internal = BTreeSet::new();
        for address in &discovered.internal {
            if address.is_ipv4() {
                internal.insert(address.to_string());
            } else {
                debug!(%address, "Skipping non-IPv4 internal address");
            }
        }

        let external_v4 = discovered
            .external_v4
            .filter(IpAddr::is_ipv4)
            .map(|address| address.to_string());
        let external_v6 = discovered
            .external_v6
            .filter(IpAddr::is_ipv6)
            .map(|address| address.to_string());

        let mut targets = Vec::new();

        if let Some(name) = non_empty(&names.internal) {
            targets.push(
                NameTarget::new(name, proxied).bind(RecordType::A, Desired::Set(internal.clone())),
            );
        }

        if let Some(name) = non_empty(&names.external) {
            targets.push(
                NameTarget::new(name, proxied)
                    .bind(RecordType::A, Desired::Single(external_v4.clone())),
            );
        }

        if let Some(name) = non_empty(&names.ipv6) {
            targets.push(
                NameTarget::new(name, proxied)
                    .bind(RecordType::Aaaa, Desired::Single(external_v6.clone())),
            );
        }

        let combined = non_empty(&names.combined).map(normalize_name);
        if let Some(name) = &combined {
            let mut all_v4 = internal;
            all_v4.extend(external_v4);
            targets.push(
                NameTarget::new(name, proxied)
                    .bind(RecordType::A, Desired::Set(all_v4))
                    .bind(RecordType::Aaaa, Desired::Single(external_v6)),
            );
        }

        if let Some(name) = non_empty(&names.top_level) {
            match combined {
                Some(alias) => targets.push(
                    NameTarget::new(name, proxied)
                        .bind(RecordType::Cname, Desired::Single(Some(alias))),
                ),
                None => warn!(
                    name,
                    "Top-level domain needs a combined domain to alias; skipping"
                ),
            }
        }

        Self { targets }
    }

    /// Targets in execution order
    pub fn targets(&self) -> &[NameTarget] {
        &self.targets
    }

    /// Whether there is nothing to do
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

fn non_empty(name: &Option<String>) -> Option<&str> {
    name.as_deref().map(str::trim).filter(|name| !name.is_empty())
}
