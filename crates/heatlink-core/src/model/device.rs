// ── Device domain types ──

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use super::entity_id::SystemId;
use super::system::RemoteSystem;

/// Integration domain, used as the namespace for device identifiers
/// and notice keys.
pub const DOMAIN: &str = "nibe";

pub const MANUFACTURER: &str = "NIBE Energy Systems";

/// Device description handed to the host's device registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// `(domain, id)` pairs that identify the device across restarts.
    pub identifiers: BTreeSet<(String, String)>,
    pub manufacturer: String,
    pub model: Option<String>,
    pub name: String,
}

impl DeviceInfo {
    /// Derive the device metadata for a fetched system.
    pub fn for_system(system: &RemoteSystem) -> Self {
        Self {
            identifiers: BTreeSet::from([(DOMAIN.to_owned(), system.system_id.to_string())]),
            manufacturer: MANUFACTURER.to_owned(),
            model: system.product_name.clone(),
            name: format!("{} - {}", system.name, system.system_id),
        }
    }

    pub fn system_id(&self) -> Option<SystemId> {
        self.identifiers
            .iter()
            .find(|(domain, _)| domain == DOMAIN)
            .and_then(|(_, id)| id.parse().ok())
    }
}

/// Entity platforms exposed to the host for every access point.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Climate,
    Switch,
    Sensor,
    BinarySensor,
    WaterHeater,
    Fan,
}

impl Platform {
    /// Platforms in forwarding order.
    pub fn forwarded() -> impl Iterator<Item = Self> {
        Self::iter()
    }
}
