// # HTTP Address Source
//
// Discovers the externally visible address by asking "what is my IP"
// services over HTTP.
//
// ## Behavior
//
// - Services are tried in order; the first body that parses as an address of
//   the requested family wins
// - The address family is forced by binding the local socket to the
//   unspecified address of that family, so an IPv4 query never leaves over
//   IPv6 and vice versa
// - When every service fails the result is an empty list, which the
//   reconciler reads as "no external address right now"
// - One request per service per call: no polling, no caching, no retry

use zonebeat_core::config::AddressSourceConfig;
use zonebeat_core::traits::{AddressSource, AddressSourceFactory, IpFamily};
use zonebeat_core::{Error, ProviderRegistry, Result};

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::time::Duration;

/// Per-request timeout
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Default IPv4 services
pub const DEFAULT_IPV4_SERVICES: &[&str] = &[
    "https://api.ipify.org",
    "https://api4.ipify.org",
    "https://icanhazip.com",
    "https://ifconfig.me/ip",
];

/// Default IPv6 services
pub const DEFAULT_IPV6_SERVICES: &[&str] = &[
    "https://api6.ipify.org",
    "https://icanhazip.com",
    "https://ifconfig.me/ip",
];

/// HTTP-based address source for one address family
#[derive(Debug)]
pub struct HttpAddressSource {
    /// Services tried in order
    services: Vec<String>,

    /// Address family to discover
    family: IpFamily,

    /// HTTP client bound to `family`
    client: reqwest::Client,
}

impl HttpAddressSource {
    /// Create a source for `family`
    ///
    /// An empty `services` list selects the built-in defaults.
    pub fn new(family: IpFamily, services: Vec<String>) -> Result<Self> {
        let services = if services.is_empty() {
            default_services(family)
        } else {
            services
        };

        let local = match family {
            IpFamily::V4 => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            IpFamily::V6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        };

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .local_address(local)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            services,
            family,
            client,
        })
    }

    /// Services in the order they are tried
    pub fn services(&self) -> &[String] {
        &self.services
    }

    /// Ask one service for our address
    async fn query(&self, url: &str) -> Result<IpAddr> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::address_source(format!("Request to {} failed: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::address_source(format!(
                "{} returned HTTP {}",
                url,
                response.status()
            )));
        }

        let body = response.text().await.map_err(|e| {
            Error::address_source(format!("Failed to read response from {}: {}", url, e))
        })?;
        let text = body.trim();

        let ip: IpAddr = text.parse().map_err(|_| {
            Error::address_source(format!("{} returned an invalid IP address: {:?}", url, text))
        })?;

        if !self.family.matches(&ip) {
            return Err(Error::address_source(format!(
                "{} returned {} which is not {:?}",
                url, ip, self.family
            )));
        }

        Ok(ip)
    }
}

#[async_trait::async_trait]
impl AddressSource for HttpAddressSource {
    async fn addresses(&self) -> Result<Vec<IpAddr>> {
        for url in &self.services {
            match self.query(url).await {
                Ok(ip) => {
                    tracing::debug!(service = %url, %ip, "Discovered external address");
                    return Ok(vec![ip]);
                }
                Err(e) => tracing::warn!("{}", e),
            }
        }

        tracing::warn!(
            family = ?self.family,
            tried = self.services.len(),
            "No service returned an external address"
        );
        Ok(Vec::new())
    }

    fn family(&self) -> Option<IpFamily> {
        Some(self.family)
    }

    fn source_name(&self) -> &'static str {
        "http"
    }
}

fn default_services(family: IpFamily) -> Vec<String> {
    let defaults = match family {
        IpFamily::V4 => DEFAULT_IPV4_SERVICES,
        IpFamily::V6 => DEFAULT_IPV6_SERVICES,
    };
    defaults.iter().map(|url| url.to_string()).collect()
}

/// Factory for creating HTTP address sources
pub struct HttpFactory;

impl AddressSourceFactory for HttpFactory {
    fn create(&self, config: &AddressSourceConfig) -> Result<Box<dyn AddressSource>> {
        match config {
            AddressSourceConfig::Http { family, services } => Ok(Box::new(
                HttpAddressSource::new(*family, services.clone())?,
            )),
            _ => Err(Error::config("Invalid config for HTTP address source")),
        }
    }
}

/// Register the HTTP address source with a registry
pub fn register(registry: &ProviderRegistry) {
    registry.register_address_source("http", Box::new(HttpFactory));
}
