// # Address Source Trait
//
// Defines the interface through which the driver obtains the desired set of
// addresses for a managed name.
//
// ## Implementations
//
// - Static list from configuration: [`crate::source::StaticAddressSource`]
// - HTTP "what is my IP" services: `zonebeat-ip-http` crate
//
// Discovery itself is an external concern; the reconciler only ever sees the
// resulting address set.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;

/// IP address family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IpFamily {
    /// IPv4 only
    V4,
    /// IPv6 only
    V6,
}

impl IpFamily {
    /// Whether `ip` belongs to this family
    pub fn matches(&self, ip: &IpAddr) -> bool {
        match self {
            IpFamily::V4 => ip.is_ipv4(),
            IpFamily::V6 => ip.is_ipv6(),
        }
    }
}

/// Trait for address source implementations
///
/// An empty result is meaningful: it means "no address currently observed"
/// and drives deletion of the corresponding records.
#[async_trait]
pub trait AddressSource: Send + Sync {
    /// Fetch the currently observed addresses
    async fn addresses(&self) -> Result<Vec<IpAddr>, crate::Error>;

    /// The address family this source is restricted to, if any
    fn family(&self) -> Option<IpFamily> {
        None
    }

    /// Get the source name (for logging/debugging)
    fn source_name(&self) -> &'static str;
}

/// Helper trait for constructing address sources from configuration
pub trait AddressSourceFactory: Send + Sync {
    /// Create an AddressSource instance from configuration
    fn create(
        &self,
        config: &crate::config::AddressSourceConfig,
    ) -> Result<Box<dyn AddressSource>, crate::Error>;
}
