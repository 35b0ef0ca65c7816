// # Record Provider Trait
//
// Defines the narrow capability interface the reconciler and the sweep use to
// talk to a DNS provider.
//
// ## Implementations
//
// - Cloudflare: `zonebeat-provider-cloudflare` crate
// - Future: Route53, DigitalOcean, etc. Each one is an additional adapter
//   behind this trait; the reconciler never special-cases a provider.
//
// ## Usage
//
// ```rust,ignore
// use zonebeat_core::{RecordProvider, RecordType};
//
// async fn show(provider: &dyn RecordProvider) -> zonebeat_core::Result<()> {
//     for record in provider.list_records("host.example.com", RecordType::A).await? {
//         println!("{} -> {}", record.name, record.content);
//     }
//     Ok(())
// }
// ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// DNS record types managed by zonebeat
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RecordType {
    /// IPv4 address record
    #[serde(rename = "A")]
    A,
    /// IPv6 address record
    #[serde(rename = "AAAA")]
    Aaaa,
    /// Alias record
    #[serde(rename = "CNAME")]
    Cname,
    /// Text record (heartbeats)
    #[serde(rename = "TXT")]
    Txt,
}

impl RecordType {
    /// Wire name of the record type
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Cname => "CNAME",
            RecordType::Txt => "TXT",
        }
    }

    /// Every type the sweep may clean, heartbeat last
    pub fn all() -> [RecordType; 4] {
        [RecordType::A, RecordType::Aaaa, RecordType::Cname, RecordType::Txt]
    }

    /// Whether records of this type carry an IP address
    pub fn is_address(&self) -> bool {
        matches!(self, RecordType::A | RecordType::Aaaa)
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(RecordType::A),
            "AAAA" => Ok(RecordType::Aaaa),
            "CNAME" => Ok(RecordType::Cname),
            "TXT" => Ok(RecordType::Txt),
            other => Err(crate::Error::invalid_input(format!(
                "Unsupported record type: {}",
                other
            ))),
        }
    }
}

/// A DNS record as reported by the provider
///
/// The `id` is always provider-assigned; zonebeat only reads it back from
/// list and create responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsRecord {
    /// Provider-specific record ID
    pub id: String,
    /// Record type
    #[serde(rename = "type")]
    pub record_type: RecordType,
    /// Fully qualified record name
    pub name: String,
    /// Record content (IP address, alias target, or TXT payload)
    pub content: String,
    /// Whether the provider proxies traffic for this record
    #[serde(default)]
    pub proxied: Option<bool>,
}

/// Trait for DNS record provider implementations
///
/// # Trust Level: Untrusted
///
/// Providers are isolated, stateless, single-shot components:
///
/// - ✅ One HTTP exchange per call (pagination of a single listing aside)
/// - ✅ Map provider responses to [`DnsRecord`] and [`crate::Error`]
/// - ❌ No retry or backoff (retry is left to the next scheduled run)
/// - ❌ No caching between calls
/// - ❌ No decision about whether a write is needed (owned by the reconciler)
///
/// # Already exists
///
/// [`RecordProvider::create_record`] must report the provider's
/// "identical record already exists" condition as
/// [`crate::Error::AlreadyExists`] so the reconciler can fall back to an update.
#[async_trait]
pub trait RecordProvider: Send + Sync {
    /// List every record with the given name and type
    async fn list_records(
        &self,
        name: &str,
        record_type: RecordType,
    ) -> Result<Vec<DnsRecord>, crate::Error>;

    /// List every record of a type in the whole zone
    ///
    /// Only the stale-record sweep uses this.
    async fn list_records_by_type(
        &self,
        record_type: RecordType,
    ) -> Result<Vec<DnsRecord>, crate::Error>;

    /// Create a record and return it as stored by the provider
    async fn create_record(
        &self,
        name: &str,
        record_type: RecordType,
        content: &str,
        proxied: bool,
    ) -> Result<DnsRecord, crate::Error>;

    /// Replace the content of an existing record
    async fn update_record(
        &self,
        id: &str,
        name: &str,
        record_type: RecordType,
        content: &str,
        proxied: bool,
    ) -> Result<(), crate::Error>;

    /// Delete a record by ID
    ///
    /// `name` and `record_type` are only used for logging.
    async fn delete_record(
        &self,
        id: &str,
        name: &str,
        record_type: RecordType,
    ) -> Result<(), crate::Error>;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing record providers from configuration
pub trait RecordProviderFactory: Send + Sync {
    /// Create a RecordProvider instance from configuration
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
    ) -> Result<Box<dyn RecordProvider>, crate::Error>;
}
