//! Name reconciler
//!
//! Converges the provider's records for a `(name, type)` pair toward a
//! desired set and keeps the matching heartbeat alive. Every provider call
//! made here is reported back as a [`RecordChange`]; nothing is retried and
//! no failure aborts the remaining work.

mod change;

pub use change::{ChangeSet, ChangeSummary, Operation, RecordChange, RunReport};

use crate::clock::Clock;
use crate::error::Error;
use crate::heartbeat::{self, HeartbeatKeying};
use crate::plan::{Desired, NameTarget, SyncPlan};
use crate::traits::{DnsRecord, RecordProvider, RecordType};
use std::collections::{BTreeMap, BTreeSet};
use std::net::IpAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Picks the record an upsert should replace
type Selector = fn(&[DnsRecord]) -> Option<&DnsRecord>;

/// Drives one provider toward the desired state
pub struct Reconciler {
    provider: Arc<dyn RecordProvider>,
    clock: Arc<dyn Clock>,
    keying: HeartbeatKeying,
    owner_id: Option<String>,
}

impl Reconciler {
    /// Create a reconciler with per-name heartbeats
    pub fn new(provider: Arc<dyn RecordProvider>, clock: Arc<dyn Clock>) -> Self {
        Self {
            provider,
            clock,
            keying: HeartbeatKeying::default(),
            owner_id: None,
        }
    }

    /// Select the heartbeat keying scheme
    pub fn with_keying(mut self, keying: HeartbeatKeying) -> Self {
        self.keying = keying;
        self
    }

    /// Embed an owner identifier in heartbeat payloads
    pub fn with_owner_id(mut self, owner_id: Option<String>) -> Self {
        self.owner_id = owner_id.filter(|owner| !owner.is_empty());
        self
    }

    /// Heartbeat keying in use
    pub fn keying(&self) -> HeartbeatKeying {
        self.keying
    }

    /// Converge a multi-value `(name, type)` and maintain its heartbeat
    ///
    /// An empty `desired` set deletes every record of that type under the
    /// name, then its heartbeat once every one of those deletes succeeded.
    pub async fn reconcile(
        &self,
        name: &str,
        record_type: RecordType,
        desired: &BTreeSet<String>,
        proxied: bool,
    ) -> ChangeSet {
        let mut changes = self.converge(name, record_type, desired, proxied).await;
        if self.keying == HeartbeatKeying::PerName {
            if !desired.is_empty() {
                changes.push(self.upsert_heartbeat(name).await);
            } else if changes.is_success() {
                changes.extend(self.delete_heartbeats(name).await);
            } else {
                keep_heartbeat(name);
            }
        }
        changes
    }

    /// Replace-if-changed for a name holding at most one record of a type
    pub async fn upsert(
        &self,
        name: &str,
        record_type: RecordType,
        content: &str,
        proxied: bool,
    ) -> RecordChange {
        self.upsert_with(name, record_type, content, proxied, first_record)
            .await
    }

    /// Delete every record of `record_type` under `name`
    ///
    /// Nothing to delete counts as success and yields an empty set.
    pub async fn delete_all(&self, name: &str, record_type: RecordType) -> ChangeSet {
        let mut changes = ChangeSet::new();
        let existing = match self.provider.list_records(name, record_type).await {
            Ok(records) => records,
            Err(err) => {
                changes.push(RecordChange::failed(
                    name,
                    record_type,
                    None,
                    Operation::Fetch,
                    &err,
                ));
                return changes;
            }
        };

        for record in existing {
            let change = self.delete(&record).await;
            let deleted = change.succeeded();
            changes.push(change);
            if deleted && self.tracks_instances(record_type) {
                let content = canonical_content(record_type, &record.content);
                let heartbeat_name = self.keying.heartbeat_name(name, &content);
                changes.extend(self.delete_heartbeats(&heartbeat_name).await);
            }
        }
        changes
    }

    /// Write a fresh heartbeat at `heartbeat_name`
    ///
    /// Only a TXT record that already decodes as a heartbeat is replaced;
    /// other TXT records at the same name are left alone.
    pub async fn upsert_heartbeat(&self, heartbeat_name: &str) -> RecordChange {
        let payload = heartbeat::encode(self.clock.now(), self.owner_id.as_deref());
        self.upsert_with(
            heartbeat_name,
            RecordType::Txt,
            &payload,
            false,
            first_heartbeat,
        )
        .await
    }

    /// Delete the heartbeat TXT records at `heartbeat_name`
    pub async fn delete_heartbeats(&self, heartbeat_name: &str) -> ChangeSet {
        let mut changes = ChangeSet::new();
        match self.provider.list_records(heartbeat_name, RecordType::Txt).await {
            Ok(records) => {
                for record in records
                    .iter()
                    .filter(|record| heartbeat::decode(&record.content).is_ok())
                {
                    changes.push(self.delete(record).await);
                }
            }
            Err(err) => changes.push(RecordChange::failed(
                heartbeat_name,
                RecordType::Txt,
                None,
                Operation::Fetch,
                &err,
            )),
        }
        changes
    }

    /// Apply every binding of one name, then its name-level heartbeat
    pub async fn reconcile_target(&self, target: &NameTarget) -> ChangeSet {
        let name = target.name.as_str();
        let mut changes = ChangeSet::new();

        for binding in &target.bindings {
            match &binding.desired {
                Desired::Set(values) => changes.extend(
                    self.converge(name, binding.record_type, values, target.proxied)
                        .await,
                ),
                Desired::Single(Some(value)) => {
                    let change = self
                        .upsert(name, binding.record_type, value, target.proxied)
                        .await;
                    let applied = change.succeeded();
                    changes.push(change);
                    if applied && self.tracks_instances(binding.record_type) {
                        let content = canonical_content(binding.record_type, value);
                        let heartbeat_name = self.keying.heartbeat_name(name, &content);
                        changes.push(self.upsert_heartbeat(&heartbeat_name).await);
                    }
                }
                Desired::Single(None) => {
                    changes.extend(self.delete_all(name, binding.record_type).await)
                }
            }
        }

        if self.keying == HeartbeatKeying::PerName {
            if target.has_content() {
                changes.push(self.upsert_heartbeat(name).await);
            } else if changes.is_success() {
                changes.extend(self.delete_heartbeats(name).await);
            } else {
                keep_heartbeat(name);
            }
        }

        changes
    }

    /// Reconcile every target of a plan
    ///
    /// A failing name never stops the names after it.
    pub async fn run_plan(&self, plan: &SyncPlan) -> RunReport {
        let mut report = RunReport::default();
        for target in plan.targets() {
            info!(name = %target.name, bindings = target.bindings.len(), "Reconciling name");
            let changes = self.reconcile_target(target).await;
            changes.log();
            debug!(name = %target.name, summary = %changes.summary(), "Name reconciled");
            report.record(target.name.clone(), changes);
        }
        report
    }

    async fn converge(
        &self,
        name: &str,
        record_type: RecordType,
        desired: &BTreeSet<String>,
        proxied: bool,
    ) -> ChangeSet {
        let mut changes = ChangeSet::new();
        let existing = match self.provider.list_records(name, record_type).await {
            Ok(records) => records,
            Err(err) => {
                changes.push(RecordChange::failed(
                    name,
                    record_type,
                    None,
                    Operation::Fetch,
                    &err,
                ));
                return changes;
            }
        };

        let desired: BTreeSet<String> = desired
            .iter()
            .map(|value| canonical_content(record_type, value))
            .collect();

        let mut by_content: BTreeMap<String, DnsRecord> = BTreeMap::new();
        let mut surplus = Vec::new();
        for record in existing {
            let content = canonical_content(record_type, &record.content);
            if by_content.contains_key(&content) {
                surplus.push(record);
            } else {
                by_content.insert(content, record);
            }
        }

        for value in &desired {
            let change = if by_content.contains_key(value) {
                RecordChange::ok(name, record_type, Some(value.as_str()), Operation::Keep)
            } else {
                self.ensure_exists(name, record_type, value, proxied).await
            };
            let present = change.succeeded();
            changes.push(change);
            if present && self.tracks_instances(record_type) {
                let heartbeat_name = self.keying.heartbeat_name(name, value);
                changes.push(self.upsert_heartbeat(&heartbeat_name).await);
            }
        }

        for (content, record) in by_content {
            if desired.contains(&content) {
                continue;
            }
            let change = self.delete(&record).await;
            let deleted = change.succeeded();
            changes.push(change);
            if deleted && self.tracks_instances(record_type) {
                let heartbeat_name = self.keying.heartbeat_name(name, &content);
                changes.extend(self.delete_heartbeats(&heartbeat_name).await);
            }
        }

        // duplicates of a kept value
        for record in surplus {
            changes.push(self.delete(&record).await);
        }

        changes
    }

    async fn ensure_exists(
        &self,
        name: &str,
        record_type: RecordType,
        content: &str,
        proxied: bool,
    ) -> RecordChange {
        match self
            .provider
            .create_record(name, record_type, content, proxied)
            .await
        {
            Ok(_) => RecordChange::ok(name, record_type, Some(content), Operation::Create),
            Err(err) if err.is_already_exists() => {
                debug!(name, %record_type, content, "Record already exists");
                RecordChange::ok(name, record_type, Some(content), Operation::Keep)
            }
            Err(err) => {
                RecordChange::failed(name, record_type, Some(content), Operation::Create, &err)
            }
        }
    }

    async fn upsert_with(
        &self,
        name: &str,
        record_type: RecordType,
        content: &str,
        proxied: bool,
        select: Selector,
    ) -> RecordChange {
        let existing = match self.provider.list_records(name, record_type).await {
            Ok(records) => records,
            Err(err) => {
                return RecordChange::failed(
                    name,
                    record_type,
                    Some(content),
                    Operation::Fetch,
                    &err,
                );
            }
        };

        if let Some(record) = select(&existing) {
            if same_content(record_type, &record.content, content) {
                return RecordChange::ok(name, record_type, Some(content), Operation::Keep);
            }
            return self.update(record, content, proxied).await;
        }

        match self
            .provider
            .create_record(name, record_type, content, proxied)
            .await
        {
            Ok(_) => RecordChange::ok(name, record_type, Some(content), Operation::Create),
            Err(err) if err.is_already_exists() => {
                debug!(name, %record_type, "Create raced another writer, updating instead");
                self.update_after_conflict(name, record_type, content, proxied, select)
                    .await
            }
            Err(err) => {
                RecordChange::failed(name, record_type, Some(content), Operation::Create, &err)
            }
        }
    }

    async fn update_after_conflict(
        &self,
        name: &str,
        record_type: RecordType,
        content: &str,
        proxied: bool,
        select: Selector,
    ) -> RecordChange {
        let existing = match self.provider.list_records(name, record_type).await {
            Ok(records) => records,
            Err(err) => {
                return RecordChange::failed(
                    name,
                    record_type,
                    Some(content),
                    Operation::Fetch,
                    &err,
                );
            }
        };

        match select(&existing) {
            Some(record) => self.update(record, content, proxied).await,
            None => RecordChange::failed(
                name,
                record_type,
                Some(content),
                Operation::Update,
                &Error::not_found(format!(
                    "{} record for {} reported as existing but not listed",
                    record_type, name
                )),
            ),
        }
    }

    async fn update(&self, record: &DnsRecord, content: &str, proxied: bool) -> RecordChange {
        match self
            .provider
            .update_record(&record.id, &record.name, record.record_type, content, proxied)
            .await
        {
            Ok(()) => RecordChange::ok(
                &record.name,
                record.record_type,
                Some(content),
                Operation::Update,
            ),
            Err(err) => RecordChange::failed(
                &record.name,
                record.record_type,
                Some(content),
                Operation::Update,
                &err,
            ),
        }
    }

    async fn delete(&self, record: &DnsRecord) -> RecordChange {
        match self
            .provider
            .delete_record(&record.id, &record.name, record.record_type)
            .await
        {
            Ok(()) => RecordChange::ok(
                &record.name,
                record.record_type,
                Some(record.content.as_str()),
                Operation::Delete,
            ),
            Err(err) => RecordChange::failed(
                &record.name,
                record.record_type,
                Some(record.content.as_str()),
                Operation::Delete,
                &err,
            ),
        }
    }

    fn tracks_instances(&self, record_type: RecordType) -> bool {
        self.keying == HeartbeatKeying::PerInstance && record_type != RecordType::Txt
    }
}

/// A name whose records could not all be deleted keeps its heartbeat, so the
/// sweep can still find it
fn keep_heartbeat(name: &str) {
    warn!(name, "Record deletion failed, keeping heartbeat");
}

fn first_record(records: &[DnsRecord]) -> Option<&DnsRecord> {
    records.first()
}

fn first_heartbeat(records: &[DnsRecord]) -> Option<&DnsRecord> {
    records
        .iter()
        .find(|record| heartbeat::decode(&record.content).is_ok())
}

/// Content as compared by the reconciler
///
/// Addresses compare by value (`2001:DB8::1` equals `2001:db8::1`), aliases
/// without case or the root dot, TXT without provider quoting.
pub fn canonical_content(record_type: RecordType, content: &str) -> String {
    let trimmed = content.trim();
    match record_type {
        RecordType::A | RecordType::Aaaa => trimmed
            .parse::<IpAddr>()
            .map(|address| address.to_string())
            .unwrap_or_else(|_| trimmed.to_string()),
        RecordType::Cname => trimmed.trim_end_matches('.').to_ascii_lowercase(),
        RecordType::Txt => trimmed.trim_matches('"').to_string(),
    }
}

fn same_content(record_type: RecordType, existing: &str, desired: &str) -> bool {
    canonical_content(record_type, existing) == canonical_content(record_type, desired)
}
