//! Configuration types for zonebeat
//!
//! This module defines all configuration structures used throughout the crate.
//! Values arrive here already parsed (the daemon reads them from the
//! environment); [`ZonebeatConfig::validate`] is the single startup check that
//! runs before any provider call.

use crate::heartbeat::HeartbeatKeying;
use crate::traits::{IpFamily, RecordType};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Main zonebeat configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZonebeatConfig {
    /// Record provider configuration
    pub provider: ProviderConfig,

    /// Managed names
    pub names: NamesConfig,

    /// Where desired addresses come from
    #[serde(default)]
    pub sources: SourcesConfig,

    /// Whether address and alias records are proxied by the provider
    #[serde(default)]
    pub proxied: bool,

    /// Heartbeat settings
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,

    /// Stale-record sweep settings
    #[serde(default)]
    pub sweep: SweepConfig,
}

impl ZonebeatConfig {
    /// Create a configuration with the given provider and names
    pub fn new(provider: ProviderConfig, names: NamesConfig) -> Self {
        Self {
            provider,
            names,
            sources: SourcesConfig::default(),
            proxied: false,
            heartbeat: HeartbeatConfig::default(),
            sweep: SweepConfig::default(),
        }
    }

    /// Validate the configuration for a reconciliation run
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.provider.validate()?;
        self.names.validate()?;
        self.heartbeat.validate()?;

        if self.names.internal.is_some() && self.sources.internal.is_none() {
            return Err(crate::Error::config(
                "Internal domain is configured but no internal address source is",
            ));
        }
        if self.names.external.is_some() && self.sources.external_v4.is_none() {
            return Err(crate::Error::config(
                "External domain is configured but no IPv4 address source is",
            ));
        }
        if self.names.ipv6.is_some() && self.sources.external_v6.is_none() {
            return Err(crate::Error::config(
                "IPv6 domain is configured but no IPv6 address source is",
            ));
        }
        if self.names.combined.is_some() && self.sources.is_empty() {
            return Err(crate::Error::config(
                "Combined domain is configured but no address source is",
            ));
        }

        for source in self.sources.iter() {
            source.validate()?;
        }

        Ok(())
    }

    /// Validate the configuration for the cleanup service
    pub fn validate_for_sweep(&self) -> Result<(), crate::Error> {
        self.provider.validate()?;
        self.names.validate()?;
        self.sweep.validate()
    }
}

/// The logical names zonebeat is responsible for
///
/// The set of configured names is also the safety boundary of the sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamesConfig {
    /// Name holding every internal IPv4 address (multi-value)
    #[serde(default)]
    pub internal: Option<String>,

    /// Name holding the external IPv4 address (single value)
    #[serde(default)]
    pub external: Option<String>,

    /// Name holding the external IPv6 address (single value)
    #[serde(default)]
    pub ipv6: Option<String>,

    /// Name aggregating every IPv4 address plus the external IPv6 address
    #[serde(default)]
    pub combined: Option<String>,

    /// Alias (CNAME) pointing at the combined name
    #[serde(default)]
    pub top_level: Option<String>,
}

impl NamesConfig {
    /// Every configured name, normalized
    pub fn managed_names(&self) -> BTreeSet<String> {
        [
            &self.internal,
            &self.external,
            &self.ipv6,
            &self.combined,
            &self.top_level,
        ]
        .into_iter()
        .flatten()
        .map(|name| normalize_name(name))
        .filter(|name| !name.is_empty())
        .collect()
    }

    /// At least one name, each a plausible domain name
    pub fn validate(&self) -> Result<(), crate::Error> {
        let names = self.managed_names();
        if names.is_empty() {
            return Err(crate::Error::config(
                "At least one domain must be configured (internal, external, ipv6, combined or top-level)",
            ));
        }

        for name in &names {
            validate_domain_name(name)?;
        }

        Ok(())
    }
}

/// Lowercase, trimmed, without the trailing root dot
pub fn normalize_name(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Basic RFC 1035 checks; underscores are allowed for service-style labels
pub fn validate_domain_name(domain: &str) -> Result<(), crate::Error> {
    if domain.is_empty() {
        return Err(crate::Error::config("Domain name cannot be empty"));
    }

    if domain.len() > 253 {
        return Err(crate::Error::config(format!(
            "Domain name too long: {} chars (max 253). Got: {}",
            domain.len(),
            domain
        )));
    }

    for label in domain.split('.') {
        if label.is_empty() {
            return Err(crate::Error::config(format!(
                "Domain name has empty label: '{}'",
                domain
            )));
        }

        if label.len() > 63 {
            return Err(crate::Error::config(format!(
                "Domain label too long: {} chars (max 63). Label: '{}'",
                label.len(),
                label
            )));
        }

        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(crate::Error::config(format!(
                "Domain label contains invalid characters. Label: '{}'",
                label
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(crate::Error::config(format!(
                "Domain label cannot start or end with hyphen. Label: '{}'",
                label
            )));
        }
    }

    Ok(())
}

/// Address sources feeding the desired sets
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Internal addresses (feeds the internal and combined names)
    #[serde(default)]
    pub internal: Option<AddressSourceConfig>,

    /// External IPv4 address
    #[serde(default)]
    pub external_v4: Option<AddressSourceConfig>,

    /// External IPv6 address
    #[serde(default)]
    pub external_v6: Option<AddressSourceConfig>,
}

impl SourcesConfig {
    /// Iterate the configured sources
    pub fn iter(&self) -> impl Iterator<Item = &AddressSourceConfig> {
        [&self.internal, &self.external_v4, &self.external_v6]
            .into_iter()
            .flatten()
    }

    /// Whether no source is configured at all
    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }
}

/// Address source configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AddressSourceConfig {
    /// Fixed list of addresses
    Static {
        /// Addresses in textual form
        addresses: Vec<String>,
    },

    /// "What is my IP" HTTP services, tried in order
    Http {
        /// Address family to request
        family: IpFamily,
        /// Service URLs (empty means the built-in defaults)
        #[serde(default)]
        services: Vec<String>,
    },

    /// Custom address source
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl AddressSourceConfig {
    /// Validate the address source configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            AddressSourceConfig::Static { addresses } => {
                for address in addresses {
                    address.trim().parse::<std::net::IpAddr>().map_err(|_| {
                        crate::Error::config(format!("Invalid IP address: {}", address))
                    })?;
                }
                Ok(())
            }
            AddressSourceConfig::Http { services, .. } => {
                for url in services {
                    if !url.starts_with("https://") && !url.starts_with("http://") {
                        return Err(crate::Error::config(format!(
                            "Address service URL must use HTTP or HTTPS scheme. Got: {}",
                            url
                        )));
                    }
                }
                Ok(())
            }
            AddressSourceConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom address source factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom address source config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the source type name
    pub fn type_name(&self) -> &str {
        match self {
            AddressSourceConfig::Static { .. } => "static",
            AddressSourceConfig::Http { .. } => "http",
            AddressSourceConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Record provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Cloudflare provider
    Cloudflare {
        /// Cloudflare API token
        api_token: String,
        /// Zone ID
        zone_id: String,
        /// TTL for created and updated records
        #[serde(default = "default_ttl")]
        ttl: u32,
        /// Log writes instead of performing them
        #[serde(default)]
        dry_run: bool,
    },

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Cloudflare {
                api_token, zone_id, ..
            } => {
                if api_token.trim().is_empty() {
                    return Err(crate::Error::config("Cloudflare API token cannot be empty"));
                }
                if zone_id.trim().is_empty() {
                    return Err(crate::Error::config("Cloudflare zone ID cannot be empty"));
                }
                Ok(())
            }
            ProviderConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom provider factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom provider config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Cloudflare { .. } => "cloudflare",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Dynamic DNS records change often; keep resolver caches short
pub fn default_ttl() -> u32 {
    120
}

/// Heartbeat configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Keying scheme shared by the reconciler and the sweep
    #[serde(default)]
    pub keying: HeartbeatKeying,

    /// Owner identifier embedded in heartbeat payloads
    #[serde(default)]
    pub owner_id: Option<String>,
}

impl HeartbeatConfig {
    /// The owner ID must survive the `timestamp,owner` payload format
    pub fn validate(&self) -> Result<(), crate::Error> {
        if let Some(owner) = &self.owner_id {
            if owner.is_empty()
                || owner
                    .chars()
                    .any(|c| c == ',' || c == '"' || c.is_whitespace() || c.is_control())
            {
                return Err(crate::Error::config(format!(
                    "Heartbeat owner ID must be non-empty without commas, quotes or whitespace. Got: {:?}",
                    owner
                )));
            }
        }
        Ok(())
    }
}

/// Stale-record sweep configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Heartbeats older than this are stale (in seconds)
    #[serde(default = "default_stale_threshold_secs")]
    pub stale_threshold_secs: u64,

    /// Delay between sweep cycles (in seconds)
    #[serde(default = "default_sweep_interval_secs")]
    pub interval_secs: u64,

    /// Record types deleted for a stale owner
    #[serde(default = "default_record_types")]
    pub record_types: Vec<RecordType>,
}

impl SweepConfig {
    /// Validate the sweep configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.stale_threshold_secs == 0 {
            return Err(crate::Error::config("Stale threshold must be > 0"));
        }
        if self.interval_secs == 0 {
            return Err(crate::Error::config("Sweep interval must be > 0"));
        }
        if self.record_types.is_empty() {
            return Err(crate::Error::config("Sweep must clean at least one record type"));
        }
        Ok(())
    }
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            stale_threshold_secs: default_stale_threshold_secs(),
            interval_secs: default_sweep_interval_secs(),
            record_types: default_record_types(),
        }
    }
}

fn default_stale_threshold_secs() -> u64 {
    3600
}

fn default_sweep_interval_secs() -> u64 {
    300
}

fn default_record_types() -> Vec<RecordType> {
    RecordType::all().to_vec()
}
