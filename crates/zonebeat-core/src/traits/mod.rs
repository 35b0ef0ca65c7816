//! Core traits for zonebeat
//!
//! This module defines the abstract interfaces that all implementations must follow.
//!
//! - [`RecordProvider`]: Read and write DNS records via provider APIs
//! - [`AddressSource`]: Produce the desired address set for a name

pub mod address_source;
pub mod record_provider;

pub use address_source::{AddressSource, AddressSourceFactory, IpFamily};
pub use record_provider::{DnsRecord, RecordProvider, RecordProviderFactory, RecordType};
