//! Static address source
//!
//! Serves a fixed list of addresses from configuration. Used for internal
//! addresses handed over by an external discovery step, and for pinning
//! external addresses without calling out to HTTP services.

use crate::config::AddressSourceConfig;
use crate::error::{Error, Result};
use crate::traits::{AddressSource, AddressSourceFactory};
use async_trait::async_trait;
use std::net::IpAddr;

/// Address source backed by a fixed list
#[derive(Debug, Clone, Default)]
pub struct StaticAddressSource {
    addresses: Vec<IpAddr>,
}

impl StaticAddressSource {
    /// Create a source from parsed addresses, dropping duplicates
    pub fn new(addresses: impl IntoIterator<Item = IpAddr>) -> Self {
        let mut unique = Vec::new();
        for address in addresses {
            if !unique.contains(&address) {
                unique.push(address);
            }
        }
        Self { addresses: unique }
    }

    /// Parse textual addresses
    pub fn parse<S: AsRef<str>>(addresses: &[S]) -> Result<Self> {
        let parsed = addresses
            .iter()
            .map(|raw| {
                let raw = raw.as_ref().trim();
                raw.parse::<IpAddr>()
                    .map_err(|_| Error::invalid_input(format!("Invalid IP address: {}", raw)))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(parsed))
    }
}

#[async_trait]
impl AddressSource for StaticAddressSource {
    async fn addresses(&self) -> Result<Vec<IpAddr>> {
        Ok(self.addresses.clone())
    }

    fn source_name(&self) -> &'static str {
        "static"
    }
}

/// Factory for creating static address sources
pub struct StaticFactory;

impl AddressSourceFactory for StaticFactory {
    fn create(&self, config: &AddressSourceConfig) -> Result<Box<dyn AddressSource>> {
        match config {
            AddressSourceConfig::Static { addresses } => {
                Ok(Box::new(StaticAddressSource::parse(addresses)?))
            }
            _ => Err(Error::config("Invalid config for static address source")),
        }
    }
}
