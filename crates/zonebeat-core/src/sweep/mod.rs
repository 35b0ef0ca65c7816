//! Zone stale-record sweep
//!
//! Independently of the reconciler, the sweep reads every TXT record in the
//! zone, treats the ones at managed names as heartbeats, and deletes every
//! record belonging to an owner whose heartbeat is stale or unreadable.
//!
//! ## Scope
//!
//! The managed-name set is the only thing standing between the sweep and
//! unrelated records in a shared zone:
//!
//! - a [`Sweeper`] cannot be built with an empty set
//! - TXT records outside the set are never evaluated, whatever they contain
//! - deletions only target names inside the set (or per-instance heartbeat
//!   names directly under one)
//!
//! ## Keying
//!
//! With [`HeartbeatKeying::PerName`] the owner is the managed name itself.
//! With [`HeartbeatKeying::PerInstance`] every record value under a managed
//! name is its own owner, proven alive by `_heartbeat-<value>.<name>`; owners
//! with records but no heartbeat at all are stale too.

use crate::clock::Clock;
use crate::config::normalize_name;
use crate::error::{Error, Result};
use crate::heartbeat::{
    HeartbeatKeying, StaleReason, StalenessVerdict, instance_label, split_instance_name,
};
use crate::reconcile::canonical_content;
use crate::traits::{DnsRecord, RecordProvider, RecordType};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// An owner that could not prove liveness
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleOwner {
    /// Managed name the owner lives under
    pub name: String,
    /// Instance label, for per-instance keying
    pub label: Option<String>,
    /// Why the owner is stale
    pub reason: StaleReason,
}

impl StaleOwner {
    /// Name of the heartbeat record that should have proven liveness
    pub fn heartbeat_name(&self) -> String {
        match &self.label {
            Some(label) => format!("{}.{}", label, self.name),
            None => self.name.clone(),
        }
    }
}

/// Outcome of one sweep cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Owners evaluated
    pub examined: usize,
    /// Owners found stale
    pub stale_owners: Vec<StaleOwner>,
    /// Records deleted
    pub deleted: usize,
    /// Listings or deletions that failed
    pub failed: usize,
}

/// Heartbeat-based garbage collector for one zone
pub struct Sweeper {
    provider: Arc<dyn RecordProvider>,
    clock: Arc<dyn Clock>,
    managed: BTreeSet<String>,
    threshold_secs: u64,
    record_types: Vec<RecordType>,
    keying: HeartbeatKeying,
}

impl Sweeper {
    /// Create a sweeper scoped to `managed`
    ///
    /// # Errors
    ///
    /// [`Error::Config`] when no managed name remains after normalization.
    pub fn new(
        provider: Arc<dyn RecordProvider>,
        clock: Arc<dyn Clock>,
        managed: impl IntoIterator<Item = String>,
        threshold_secs: u64,
    ) -> Result<Self> {
        let managed: BTreeSet<String> = managed
            .into_iter()
            .map(|name| normalize_name(&name))
            .filter(|name| !name.is_empty())
            .collect();

        if managed.is_empty() {
            return Err(Error::config(
                "Refusing to sweep: no managed names configured",
            ));
        }

        Ok(Self {
            provider,
            clock,
            managed,
            threshold_secs,
            record_types: RecordType::all().to_vec(),
            keying: HeartbeatKeying::default(),
        })
    }

    /// Restrict the record types deleted for a stale owner
    ///
    /// Duplicates are dropped and TXT always goes last, so an owner whose
    /// address deletions fail keeps its heartbeat for the next cycle.
    pub fn with_record_types(mut self, record_types: impl IntoIterator<Item = RecordType>) -> Self {
        let mut types: Vec<RecordType> = Vec::new();
        for record_type in record_types {
            if !types.contains(&record_type) {
                types.push(record_type);
            }
        }
        types.sort_by_key(|record_type| *record_type == RecordType::Txt);
        self.record_types = types;
        self
    }

    /// Select the heartbeat keying scheme
    pub fn with_keying(mut self, keying: HeartbeatKeying) -> Self {
        self.keying = keying;
        self
    }

    /// Names in scope
    pub fn managed_names(&self) -> &BTreeSet<String> {
        &self.managed
    }

    /// Run one sweep cycle
    ///
    /// # Errors
    ///
    /// Only when the zone-wide TXT listing fails. Failures on individual
    /// owners are counted in the report and never abort the cycle.
    pub async fn sweep(&self) -> Result<SweepReport> {
        let now = self.clock.now();
        let txt_records = self.provider.list_records_by_type(RecordType::Txt).await?;
        debug!(count = txt_records.len(), "Listed zone TXT records");

        let report = match self.keying {
            HeartbeatKeying::PerName => self.sweep_names(txt_records, now).await,
            HeartbeatKeying::PerInstance => self.sweep_instances(txt_records, now).await,
        };

        Ok(report)
    }

    /// Sweep on a fixed interval until Ctrl-C
    ///
    /// The first cycle runs immediately.
    pub async fn run(&self, interval: Duration) -> Result<()> {
        self.run_internal(interval, None).await
    }

    /// Sweep on a fixed interval until `shutdown` fires
    ///
    /// A cycle in progress always completes before the loop exits.
    pub async fn run_with_shutdown(
        &self,
        interval: Duration,
        shutdown: oneshot::Receiver<()>,
    ) -> Result<()> {
        self.run_internal(interval, Some(shutdown)).await
    }

    async fn run_internal(
        &self,
        interval: Duration,
        shutdown_rx: Option<oneshot::Receiver<()>>,
    ) -> Result<()> {
        if interval.is_zero() {
            return Err(Error::config("Sweep interval must be > 0"));
        }

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            managed = self.managed.len(),
            threshold_secs = self.threshold_secs,
            interval_secs = interval.as_secs(),
            keying = ?self.keying,
            "Sweep loop started"
        );

        if let Some(mut rx) = shutdown_rx {
            loop {
                tokio::select! {
                    _ = ticker.tick() => self.run_cycle().await,

                    _ = &mut rx => {
                        info!("Shutdown signal received");
                        break;
                    }
                }
            }
        } else {
            loop {
                tokio::select! {
                    _ = ticker.tick() => self.run_cycle().await,

                    _ = tokio::signal::ctrl_c() => {
                        info!("Shutdown signal received");
                        break;
                    }
                }
            }
        }

        info!("Sweep loop stopped");
        Ok(())
    }

    async fn run_cycle(&self) {
        match self.sweep().await {
            Ok(report) if report.stale_owners.is_empty() && report.failed == 0 => {
                debug!(examined = report.examined, "No stale owners");
            }
            Ok(report) => info!(
                examined = report.examined,
                stale = report.stale_owners.len(),
                deleted = report.deleted,
                failed = report.failed,
                "Sweep cycle completed"
            ),
            Err(e) => error!("Sweep cycle failed: {}", e),
        }
    }

    async fn sweep_names(&self, txt_records: Vec<DnsRecord>, now: i64) -> SweepReport {
        let mut heartbeats: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for record in txt_records {
            let name = normalize_name(&record.name);
            if self.managed.contains(&name) {
                heartbeats.entry(name).or_default().push(record.content);
            }
        }

        let mut report = SweepReport {
            examined: heartbeats.len(),
            ..SweepReport::default()
        };

        for (name, payloads) in heartbeats {
            let verdict = owner_verdict(payloads.iter().map(String::as_str), now, self.threshold_secs);
            let StalenessVerdict::Stale(reason) = verdict else {
                debug!(name = %name, "Heartbeat is fresh");
                continue;
            };

            warn!(name = %name, %reason, "Stale owner, deleting its records");
            let failed_before = report.failed;
            for record_type in &self.record_types {
                // the heartbeat is what brings the owner back next cycle
                if *record_type == RecordType::Txt && report.failed > failed_before {
                    warn!(name = %name, "Keeping heartbeat until the owner's other records are gone");
                    continue;
                }
                self.delete_at(&name, *record_type, &mut report).await;
            }
            report.stale_owners.push(StaleOwner {
                name,
                label: None,
                reason,
            });
        }

        report
    }

    async fn sweep_instances(&self, txt_records: Vec<DnsRecord>, now: i64) -> SweepReport {
        let mut report = SweepReport::default();

        let mut heartbeats: BTreeMap<(String, String), Vec<DnsRecord>> = BTreeMap::new();
        for record in txt_records {
            let name = normalize_name(&record.name);
            let Some((label, parent)) = split_instance_name(&name) else {
                continue;
            };
            if self.managed.contains(parent) {
                heartbeats
                    .entry((parent.to_string(), label.to_string()))
                    .or_default()
                    .push(record);
            }
        }

        let mut owned: BTreeMap<(String, String), Vec<DnsRecord>> = BTreeMap::new();
        let mut unlisted: BTreeSet<String> = BTreeSet::new();
        for name in &self.managed {
            for record_type in self.address_types() {
                match self.provider.list_records(name, record_type).await {
                    Ok(records) => {
                        for record in records {
                            let content = canonical_content(record_type, &record.content);
                            owned
                                .entry((name.clone(), instance_label(&content)))
                                .or_default()
                                .push(record);
                        }
                    }
                    Err(e) => {
                        warn!(name = %name, %record_type, error = %e, "Failed to list records, skipping name this cycle");
                        report.failed += 1;
                        unlisted.insert(name.clone());
                    }
                }
            }
        }

        let owners: BTreeSet<(String, String)> =
            heartbeats.keys().chain(owned.keys()).cloned().collect();

        for owner in owners {
            if unlisted.contains(&owner.0) {
                continue;
            }
            report.examined += 1;

            let beats = heartbeats.remove(&owner).unwrap_or_default();
            let verdict = owner_verdict(
                beats.iter().map(|record| record.content.as_str()),
                now,
                self.threshold_secs,
            );
            let StalenessVerdict::Stale(reason) = verdict else {
                continue;
            };

            let (name, label) = owner;
            warn!(name = %name, instance = %label, %reason, "Stale instance, deleting its records");

            let failed_before = report.failed;
            let mut records = owned.remove(&(name.clone(), label.clone())).unwrap_or_default();
            records.sort_by_key(|record| self.delete_rank(record.record_type));
            for record in &records {
                self.delete_one(record, &mut report).await;
            }
            if report.failed > failed_before {
                warn!(name = %name, instance = %label, "Keeping heartbeat until the instance's records are gone");
            } else if self.record_types.contains(&RecordType::Txt) {
                for record in &beats {
                    self.delete_one(record, &mut report).await;
                }
            }

            report.stale_owners.push(StaleOwner {
                name,
                label: Some(label),
                reason,
            });
        }

        report
    }

    fn address_types(&self) -> impl Iterator<Item = RecordType> + '_ {
        self.record_types
            .iter()
            .copied()
            .filter(|record_type| *record_type != RecordType::Txt)
    }

    fn delete_rank(&self, record_type: RecordType) -> usize {
        self.record_types
            .iter()
            .position(|candidate| *candidate == record_type)
            .unwrap_or(usize::MAX)
    }

    async fn delete_at(&self, name: &str, record_type: RecordType, report: &mut SweepReport) {
        match self.provider.list_records(name, record_type).await {
            Ok(records) => {
                for record in &records {
                    self.delete_one(record, report).await;
                }
            }
            Err(e) => {
                warn!(name, %record_type, error = %e, "Failed to list records for stale owner");
                report.failed += 1;
            }
        }
    }

    async fn delete_one(&self, record: &DnsRecord, report: &mut SweepReport) {
        match self
            .provider
            .delete_record(&record.id, &record.name, record.record_type)
            .await
        {
            Ok(()) => {
                info!(name = %record.name, record_type = %record.record_type, content = %record.content, "Deleted stale record");
                report.deleted += 1;
            }
            Err(e) => {
                warn!(name = %record.name, record_type = %record.record_type, error = %e, "Failed to delete stale record");
                report.failed += 1;
            }
        }
    }
}

/// Combine the verdicts of every heartbeat payload an owner has
///
/// Any fresh payload keeps the owner alive. Otherwise the youngest decodable
/// payload decides, and an owner with nothing decodable is malformed.
fn owner_verdict<'a>(
    payloads: impl IntoIterator<Item = &'a str>,
    now: i64,
    threshold_secs: u64,
) -> StalenessVerdict {
    use StalenessVerdict::{Fresh, Stale};

    let mut best: Option<StalenessVerdict> = None;
    for payload in payloads {
        let verdict = StalenessVerdict::assess(Some(payload), now, threshold_secs);
        best = Some(match (best, verdict) {
            (None, verdict) => verdict,
            (Some(Fresh { age: a }), Fresh { age: b }) => Fresh { age: a.min(b) },
            (Some(fresh @ Fresh { .. }), _) | (_, fresh @ Fresh { .. }) => fresh,
            (
                Some(Stale(StaleReason::AgeExceeded { age: a })),
                Stale(StaleReason::AgeExceeded { age: b }),
            ) => Stale(StaleReason::AgeExceeded { age: a.min(b) }),
            (Some(aged @ Stale(StaleReason::AgeExceeded { .. })), _)
            | (_, aged @ Stale(StaleReason::AgeExceeded { .. })) => aged,
            (Some(previous), _) => previous,
        });
    }

    best.unwrap_or(Stale(StaleReason::NoHeartbeat))
}
