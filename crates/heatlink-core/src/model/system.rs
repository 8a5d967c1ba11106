// ── Remote system, notices and status snapshots ──

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use super::device::DOMAIN;
use super::entity_id::{ParameterId, SystemId};

pub use heatlink_api::Parameter;

/// One physical system as described by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteSystem {
    pub system_id: SystemId,
    pub name: String,
    pub product_name: Option<String>,
}

// ── Notices ─────────────────────────────────────────────────────────

/// A remote-reported condition shown to the user until it clears.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub id: i64,
    pub title: String,
    pub description: String,
}

impl Notice {
    /// Host notice key for this record.
    pub fn key(&self) -> String {
        notice_key(self.id)
    }
}

/// Deterministic host notice key for a notice id. Stable across polls,
/// so re-creating the same id replaces rather than duplicates.
pub fn notice_key(id: i64) -> String {
    format!("{DOMAIN}:{id}")
}

// ── Status ──────────────────────────────────────────────────────────

/// A category of live readings as reported by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusIconGroup {
    pub title: String,
    pub parameters: Vec<Parameter>,
}

/// Flattened view of one status poll.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub statuses: BTreeSet<String>,
    pub parameters: HashMap<ParameterId, Parameter>,
}

impl StatusSnapshot {
    /// Flatten status icon groups. Built from scratch on every poll; when
    /// several groups carry the same parameter id the last one wins.
    pub fn from_groups(groups: Vec<StatusIconGroup>) -> Self {
        let mut snapshot = Self::default();
        for group in groups {
            snapshot.statuses.insert(group.title);
            for parameter in group.parameters {
                snapshot.parameters.insert(parameter.parameter_id, parameter);
            }
        }
        snapshot
    }
}
