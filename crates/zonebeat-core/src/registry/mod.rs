//! Plugin-based provider registry
//!
//! The registry allows record providers and address sources to be registered
//! dynamically at runtime, avoiding hardcoded if-else chains in the daemon.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use zonebeat_core::ProviderRegistry;
//!
//! let registry = ProviderRegistry::with_builtin();
//! zonebeat_provider_cloudflare::register(&registry);
//!
//! let provider = registry.create_provider(&config.provider)?;
//! ```

use crate::config::{AddressSourceConfig, ProviderConfig};
use crate::error::{Error, Result};
use crate::traits::{AddressSource, AddressSourceFactory, RecordProvider, RecordProviderFactory};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Registry for plugin-based provider and address source creation
///
/// Maps type names to factory objects. Uses interior mutability with
/// `RwLock`, allowing concurrent reads and exclusive writes.
#[derive(Default)]
pub struct ProviderRegistry {
    /// Registered record provider factories
    providers: RwLock<HashMap<String, Box<dyn RecordProviderFactory>>>,

    /// Registered address source factories
    address_sources: RwLock<HashMap<String, Box<dyn AddressSourceFactory>>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the sources that live in this crate
    pub fn with_builtin() -> Self {
        let registry = Self::new();
        registry.register_address_source("static", Box::new(crate::source::StaticFactory));
        registry
    }

    /// Register a record provider factory
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use zonebeat_core::registry::ProviderRegistry;
    /// # use zonebeat_core::traits::RecordProviderFactory;
    /// # struct MyFactory;
    /// # impl RecordProviderFactory for MyFactory {
    /// #     fn create(&self, config: &zonebeat_core::config::ProviderConfig) -> zonebeat_core::Result<Box<dyn zonebeat_core::RecordProvider>> { unimplemented!() }
    /// # }
    /// let registry = ProviderRegistry::new();
    /// registry.register_provider("myprovider", Box::new(MyFactory));
    /// ```
    pub fn register_provider(
        &self,
        name: impl Into<String>,
        factory: Box<dyn RecordProviderFactory>,
    ) {
        self.providers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), factory);
    }

    /// Register an address source factory
    pub fn register_address_source(
        &self,
        name: impl Into<String>,
        factory: Box<dyn AddressSourceFactory>,
    ) {
        self.address_sources
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), factory);
    }

    /// Create a record provider from configuration
    pub fn create_provider(&self, config: &ProviderConfig) -> Result<Box<dyn RecordProvider>> {
        let provider_type = config.type_name();
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);

        let factory = providers
            .get(provider_type)
            .ok_or_else(|| Error::config(format!("Unknown provider type: {}", provider_type)))?;

        factory.create(config)
    }

    /// Create an address source from configuration
    pub fn create_address_source(
        &self,
        config: &AddressSourceConfig,
    ) -> Result<Box<dyn AddressSource>> {
        let source_type = config.type_name();
        let sources = self
            .address_sources
            .read()
            .unwrap_or_else(PoisonError::into_inner);

        let factory = sources.get(source_type).ok_or_else(|| {
            Error::config(format!("Unknown address source type: {}", source_type))
        })?;

        factory.create(config)
    }

    /// List all registered provider types
    pub fn list_providers(&self) -> Vec<String> {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        providers.keys().cloned().collect()
    }

    /// List all registered address source types
    pub fn list_address_sources(&self) -> Vec<String> {
        let sources = self
            .address_sources
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        sources.keys().cloned().collect()
    }

    /// Check if a provider type is registered
    pub fn has_provider(&self, name: &str) -> bool {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        providers.contains_key(name)
    }

    /// Check if an address source type is registered
    pub fn has_address_source(&self, name: &str) -> bool {
        let sources = self
            .address_sources
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        sources.contains_key(name)
    }
}
