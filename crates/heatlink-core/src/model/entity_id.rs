// ── Core identity types ──
//
// `EntryId` names one configured access point; `SystemId` names one
// physical system behind it. Every other domain type hangs off these.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Remote identifier of a heat-pump system.
pub type SystemId = u32;

/// Remote identifier of a live parameter.
pub type ParameterId = u32;

// ── EntryId ─────────────────────────────────────────────────────────

/// Identifier of one configured access point (credential set).
///
/// Stable across reloads; the host uses it to key everything it stores
/// for the access point (devices, persisted tokens, forwarded platforms).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntryId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for EntryId {
    fn from(s: String) -> Self {
        Self(s)
    }
}
