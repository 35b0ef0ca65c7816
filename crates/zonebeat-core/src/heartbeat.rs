//! Heartbeat codec
//!
//! A heartbeat is a TXT record whose content is a provider-quoted Unix
//! timestamp, optionally followed by a comma and an owner identifier:
//!
//! ```text
//! "1700000000"
//! "1700000000,web-3"
//! ```
//!
//! This payload is the one wire format zonebeat owns. The sweep decodes
//! heartbeats written by any earlier version of the reconciler, so the format
//! must stay byte-stable.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// First-label prefix of per-instance heartbeat names
pub const INSTANCE_LABEL_PREFIX: &str = "_heartbeat-";

/// A decoded liveness signal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heartbeat {
    /// Unix timestamp (seconds) at which the owner last proved liveness
    pub timestamp: i64,
    /// Owner or instance identifier, when the writer included one
    pub owner: Option<String>,
}

impl Heartbeat {
    /// Age of the heartbeat at `now`
    pub fn age(&self, now: i64) -> i64 {
        now - self.timestamp
    }

    /// Whether the heartbeat is at most `threshold_secs` old
    pub fn is_fresh(&self, now: i64, threshold_secs: u64) -> bool {
        is_fresh(self, now, threshold_secs)
    }
}

/// Why a heartbeat payload could not be read
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Nothing left after stripping quotes and whitespace
    #[error("heartbeat payload is empty")]
    Empty,

    /// The first field is not a base-10 integer
    #[error("heartbeat timestamp {0:?} is not an integer")]
    InvalidTimestamp(String),
}

/// Encode a heartbeat payload for `now`
pub fn encode(now: i64, owner: Option<&str>) -> String {
    match owner {
        Some(owner) if !owner.is_empty() => format!("\"{},{}\"", now, owner),
        _ => format!("\"{}\"", now),
    }
}

/// Decode a heartbeat payload as returned by the provider
pub fn decode(raw: &str) -> Result<Heartbeat, DecodeError> {
    let content = raw.trim().trim_matches('"').trim();
    if content.is_empty() {
        return Err(DecodeError::Empty);
    }

    let mut fields = content.splitn(2, ',');
    let first = fields.next().unwrap_or_default().trim();
    if first.is_empty() {
        return Err(DecodeError::Empty);
    }

    let timestamp = first
        .parse::<i64>()
        .map_err(|_| DecodeError::InvalidTimestamp(first.to_string()))?;

    let owner = fields
        .next()
        .map(str::trim)
        .filter(|owner| !owner.is_empty())
        .map(str::to_string);

    Ok(Heartbeat { timestamp, owner })
}

/// `now − timestamp <= threshold`
///
/// A timestamp in the future (negative age) counts as fresh.
pub fn is_fresh(heartbeat: &Heartbeat, now: i64, threshold_secs: u64) -> bool {
    let threshold = i64::try_from(threshold_secs).unwrap_or(i64::MAX);
    heartbeat.age(now) <= threshold
}

/// Why an owner is considered gone
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    /// The owner has address records but no heartbeat at all
    NoHeartbeat,
    /// The heartbeat exists but cannot be decoded
    MalformedHeartbeat(DecodeError),
    /// The heartbeat is older than the threshold
    AgeExceeded {
        /// Age in seconds at evaluation time
        age: i64,
    },
}

impl fmt::Display for StaleReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StaleReason::NoHeartbeat => f.write_str("no heartbeat"),
            StaleReason::MalformedHeartbeat(err) => write!(f, "malformed heartbeat: {}", err),
            StaleReason::AgeExceeded { age } => write!(f, "stale heartbeat (age: {}s)", age),
        }
    }
}

/// Result of evaluating one owner's heartbeat
///
/// Derived on every sweep cycle and never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StalenessVerdict {
    /// The owner proved liveness recently enough
    Fresh {
        /// Age in seconds at evaluation time
        age: i64,
    },
    /// The owner cannot prove liveness
    Stale(StaleReason),
}

impl StalenessVerdict {
    /// Evaluate a raw heartbeat payload (or its absence)
    pub fn assess(raw: Option<&str>, now: i64, threshold_secs: u64) -> Self {
        let Some(raw) = raw else {
            return StalenessVerdict::Stale(StaleReason::NoHeartbeat);
        };

        match decode(raw) {
            Err(err) => StalenessVerdict::Stale(StaleReason::MalformedHeartbeat(err)),
            Ok(heartbeat) if heartbeat.is_fresh(now, threshold_secs) => StalenessVerdict::Fresh {
                age: heartbeat.age(now),
            },
            Ok(heartbeat) => StalenessVerdict::Stale(StaleReason::AgeExceeded {
                age: heartbeat.age(now),
            }),
        }
    }

    /// Whether the owner should be swept
    pub fn is_stale(&self) -> bool {
        matches!(self, StalenessVerdict::Stale(_))
    }

    /// The reason, when stale
    pub fn reason(&self) -> Option<&StaleReason> {
        match self {
            StalenessVerdict::Fresh { .. } => None,
            StalenessVerdict::Stale(reason) => Some(reason),
        }
    }
}

/// How heartbeats are keyed to owners
///
/// The reconciler and the sweep must agree on this. Mixing schemes leaves
/// orphaned heartbeats or hides stale instances behind a fresh name-level one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeartbeatKeying {
    /// One heartbeat TXT record at each managed name
    #[default]
    PerName,
    /// One heartbeat per record value, at `_heartbeat-<label>.<name>`
    PerInstance,
}

impl HeartbeatKeying {
    /// Name of the heartbeat record guarding `content` under `name`
    pub fn heartbeat_name(&self, name: &str, content: &str) -> String {
        match self {
            HeartbeatKeying::PerName => name.to_string(),
            HeartbeatKeying::PerInstance => format!("{}.{}", instance_label(content), name),
        }
    }
}

/// DNS-safe first label for a per-instance heartbeat
///
/// `10.0.0.5` becomes `_heartbeat-10-0-0-5`.
pub fn instance_label(content: &str) -> String {
    let label: String = content
        .trim()
        .chars()
        .map(|c| if c == '.' || c == ':' { '-' } else { c })
        .collect();
    format!("{}{}", INSTANCE_LABEL_PREFIX, label)
}

/// Split a per-instance heartbeat name into `(label, parent name)`
///
/// Returns `None` for names whose first label is not a heartbeat label.
pub fn split_instance_name(record_name: &str) -> Option<(&str, &str)> {
    let (label, parent) = record_name.split_once('.')?;
    if !label.starts_with(INSTANCE_LABEL_PREFIX) || label.len() == INSTANCE_LABEL_PREFIX.len() {
        return None;
    }
    if parent.is_empty() {
        return None;
    }
    Some((label, parent))
}
