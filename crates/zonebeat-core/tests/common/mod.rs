//! Test doubles and common utilities for contract tests
//!
//! `FakeZone` is an in-memory record provider that records every call, so
//! tests can assert both on the resulting zone state and on how many writes
//! it took to get there.

#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use zonebeat_core::clock::FixedClock;
use zonebeat_core::error::{Error, Result};
use zonebeat_core::traits::{DnsRecord, RecordProvider, RecordType};

/// A provider call, as seen by the fake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List { name: String, record_type: RecordType },
    ListByType { record_type: RecordType },
    Create { name: String, record_type: RecordType, content: String },
    Update { id: String, content: String },
    Delete { id: String },
}

impl Call {
    pub fn is_write(&self) -> bool {
        matches!(self, Call::Create { .. } | Call::Update { .. } | Call::Delete { .. })
    }
}

/// In-memory zone implementing `RecordProvider`
#[derive(Default)]
pub struct FakeZone {
    records: Mutex<Vec<DnsRecord>>,
    next_id: AtomicUsize,
    calls: Mutex<Vec<Call>>,
    failing_names: Mutex<HashSet<String>>,
    failing_deletes: Mutex<HashSet<RecordType>>,
    racers: Mutex<HashMap<(String, RecordType), String>>,
    phantoms: Mutex<HashSet<(String, RecordType)>>,
    fail_zone_listing: AtomicBool,
}

impl FakeZone {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Seed a record, returning its id
    pub fn insert(&self, name: &str, record_type: RecordType, content: &str) -> String {
        let id = format!("rec-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        self.records.lock().unwrap().push(DnsRecord {
            id: id.clone(),
            record_type,
            name: name.to_string(),
            content: content.to_string(),
            proxied: Some(false),
        });
        id
    }

    /// Sorted contents of `(name, type)`
    pub fn contents(&self, name: &str, record_type: RecordType) -> Vec<String> {
        let mut contents: Vec<String> = self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.name.eq_ignore_ascii_case(name) && r.record_type == record_type)
            .map(|r| r.content.clone())
            .collect();
        contents.sort();
        contents
    }

    /// Every record currently in the zone
    pub fn all(&self) -> Vec<DnsRecord> {
        self.records.lock().unwrap().clone()
    }

    /// Whether a record with this id still exists
    pub fn contains_id(&self, id: &str) -> bool {
        self.records.lock().unwrap().iter().any(|r| r.id == id)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn write_count(&self) -> usize {
        self.calls().iter().filter(|c| c.is_write()).count()
    }

    pub fn update_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Update { .. }))
            .count()
    }

    pub fn create_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Create { .. }))
            .count()
    }

    pub fn delete_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Delete { .. }))
            .count()
    }

    /// Every call touching `name` fails with a transport error
    pub fn fail_name(&self, name: &str) {
        self.failing_names
            .lock()
            .unwrap()
            .insert(name.to_ascii_lowercase());
    }

    /// Deletes of `record_type` fail with a transport error; everything else works
    pub fn fail_deletes(&self, record_type: RecordType) {
        self.failing_deletes.lock().unwrap().insert(record_type);
    }

    /// The zone-wide listing fails with a transport error
    pub fn fail_zone_listing(&self) {
        self.fail_zone_listing.store(true, Ordering::SeqCst);
    }

    /// The next create at `(name, type)` loses a race: another writer's
    /// record with `content` appears and the create reports AlreadyExists
    pub fn race_on_create(&self, name: &str, record_type: RecordType, content: &str) {
        self.racers
            .lock()
            .unwrap()
            .insert((name.to_string(), record_type), content.to_string());
    }

    /// Creates at `(name, type)` report AlreadyExists without any record
    /// becoming visible
    pub fn phantom_on_create(&self, name: &str, record_type: RecordType) {
        self.phantoms
            .lock()
            .unwrap()
            .insert((name.to_string(), record_type));
    }

    fn log(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_name(&self, name: &str) -> Result<()> {
        if self
            .failing_names
            .lock()
            .unwrap()
            .contains(&name.to_ascii_lowercase())
        {
            return Err(Error::transport(format!("simulated timeout for {}", name)));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordProvider for FakeZone {
    async fn list_records(&self, name: &str, record_type: RecordType) -> Result<Vec<DnsRecord>> {
        self.log(Call::List {
            name: name.to_string(),
            record_type,
        });
        self.check_name(name)?;
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.name.eq_ignore_ascii_case(name) && r.record_type == record_type)
            .cloned()
            .collect())
    }

    async fn list_records_by_type(&self, record_type: RecordType) -> Result<Vec<DnsRecord>> {
        self.log(Call::ListByType { record_type });
        if self.fail_zone_listing.load(Ordering::SeqCst) {
            return Err(Error::transport("simulated zone listing failure"));
        }
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.record_type == record_type)
            .cloned()
            .collect())
    }

    async fn create_record(
        &self,
        name: &str,
        record_type: RecordType,
        content: &str,
        _proxied: bool,
    ) -> Result<DnsRecord> {
        self.log(Call::Create {
            name: name.to_string(),
            record_type,
            content: content.to_string(),
        });
        self.check_name(name)?;

        let key = (name.to_string(), record_type);
        if self.phantoms.lock().unwrap().contains(&key) {
            return Err(Error::already_exists(name, record_type));
        }
        let racer = self.racers.lock().unwrap().remove(&key);
        if let Some(racer_content) = racer {
            self.insert(name, record_type, &racer_content);
            return Err(Error::already_exists(name, record_type));
        }

        let duplicate = self
            .records
            .lock()
            .unwrap()
            .iter()
            .any(|r| r.name == name && r.record_type == record_type && r.content == content);
        if duplicate {
            return Err(Error::already_exists(name, record_type));
        }

        let id = self.insert(name, record_type, content);
        Ok(DnsRecord {
            id,
            record_type,
            name: name.to_string(),
            content: content.to_string(),
            proxied: Some(false),
        })
    }

    async fn update_record(
        &self,
        id: &str,
        name: &str,
        _record_type: RecordType,
        content: &str,
        _proxied: bool,
    ) -> Result<()> {
        self.log(Call::Update {
            id: id.to_string(),
            content: content.to_string(),
        });
        self.check_name(name)?;

        let mut records = self.records.lock().unwrap();
        match records.iter_mut().find(|r| r.id == id) {
            Some(record) => {
                record.content = content.to_string();
                Ok(())
            }
            None => Err(Error::not_found(format!("record {}", id))),
        }
    }

    async fn delete_record(&self, id: &str, name: &str, record_type: RecordType) -> Result<()> {
        self.log(Call::Delete { id: id.to_string() });
        self.check_name(name)?;
        if self.failing_deletes.lock().unwrap().contains(&record_type) {
            return Err(Error::transport(format!("simulated delete timeout for {}", id)));
        }

        let mut records = self.records.lock().unwrap();
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Err(Error::not_found(format!("record {}", id)));
        }
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}

/// A clock pinned at `now`
pub fn clock_at(now: i64) -> Arc<FixedClock> {
    Arc::new(FixedClock::new(now))
}

/// Quoted heartbeat payload for `timestamp`
pub fn heartbeat(timestamp: i64) -> String {
    format!("\"{}\"", timestamp)
}

/// Build a desired set from string slices
pub fn desired(values: &[&str]) -> std::collections::BTreeSet<String> {
    values.iter().map(|v| v.to_string()).collect()
}
