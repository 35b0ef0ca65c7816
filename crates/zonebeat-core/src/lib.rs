// # zonebeat-core
//
// Core library for heartbeat-guarded DNS zone reconciliation.
//
// ## Architecture Overview
//
// - **RecordProvider**: Trait over a DNS provider's record CRUD API
// - **AddressSource**: Trait for the address discovery collaborators
// - **heartbeat**: Codec and freshness rules for the TXT liveness payload
// - **Reconciler**: Converges names toward desired sets and refreshes heartbeats
// - **Sweeper**: Zone-wide scan that deletes records of stale owners
// - **ProviderRegistry**: Plugin-based registry for providers and sources
//
// ## Design Principles
//
// 1. **Separation of Concerns**: Core logic never talks HTTP directly
// 2. **Plugin-Based**: Providers are registered dynamically, no hard-coded if-else
// 3. **Structured Results**: Reconciliation returns change lists; logging consumes them
// 4. **Scoped Destruction**: The sweep only ever acts on configured names

pub mod clock;
pub mod config;
pub mod error;
pub mod heartbeat;
pub mod plan;
pub mod reconcile;
pub mod registry;
pub mod source;
pub mod sweep;
pub mod traits;

// Re-export core types for convenience
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{
    AddressSourceConfig, HeartbeatConfig, NamesConfig, ProviderConfig, SourcesConfig,
    SweepConfig, ZonebeatConfig,
};
pub use error::{Error, Result};
pub use heartbeat::{Heartbeat, HeartbeatKeying, StaleReason, StalenessVerdict};
pub use plan::{Desired, Discovered, NameTarget, RecordBinding, SyncPlan};
pub use reconcile::{ChangeSet, Operation, RecordChange, Reconciler, RunReport};
pub use registry::ProviderRegistry;
pub use source::StaticAddressSource;
pub use sweep::{StaleOwner, SweepReport, Sweeper};
pub use traits::{AddressSource, DnsRecord, IpFamily, RecordProvider, RecordType};
