// ── Runtime access point configuration ──
//
// These types describe *what* to set up for one access point: credentials,
// requested scope and the systems to poll. They never touch disk; the
// config crate resolves files and environment into an `AccessPointConfig`.

use std::collections::BTreeMap;
use std::time::Duration;

use heatlink_api::{AccessData, AccessDataWriter, Scope, SessionConfig, TransportConfig};
use secrecy::SecretString;
use url::Url;

use crate::model::{ParameterId, SystemId};

/// Default period of both polling loops.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Everything needed to acquire one access point's lifecycle chain.
///
/// Immutable for the lifetime of one run; a changed configuration is
/// applied by tearing the entry down and setting it up again.
#[derive(Debug, Clone)]
pub struct AccessPointConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    pub redirect_uri: Url,
    /// Request `WRITESYSTEM` in addition to `READSYSTEM`.
    pub write_access: bool,
    /// Tokens persisted by a previous run.
    pub access_data: Option<AccessData>,
    pub systems: BTreeMap<SystemId, SystemConfig>,
    pub poll_interval: Duration,
    pub transport: TransportConfig,
}

impl AccessPointConfig {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: SecretString,
        redirect_uri: Url,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
            redirect_uri,
            write_access: false,
            access_data: None,
            systems: BTreeMap::new(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            transport: TransportConfig::default(),
        }
    }

    /// OAuth scopes derived from the write-access flag.
    pub fn scope(&self) -> Vec<Scope> {
        Scope::for_write_access(self.write_access)
    }

    /// Session parameters for this access point.
    pub fn session_config(&self, access_data_write: Option<AccessDataWriter>) -> SessionConfig {
        SessionConfig {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            redirect_uri: self.redirect_uri.clone(),
            access_data: self.access_data.clone(),
            access_data_write,
            scope: self.scope(),
            transport: self.transport.clone(),
        }
    }

    /// Add systems that are known (e.g. from stored entry data) but not
    /// configured, with default per-system settings. Configured systems
    /// are left untouched.
    pub fn merge_known_systems(&mut self, known: impl IntoIterator<Item = SystemId>) {
        for system_id in known {
            self.systems.entry(system_id).or_default();
        }
    }
}

// ── Per-system selections ───────────────────────────────────────────

/// Which parameters of one system to expose, per entity platform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SystemConfig {
    pub units: BTreeMap<u32, UnitConfig>,
    pub sensors: Vec<ParameterId>,
    pub switches: Vec<ParameterId>,
    pub binary_sensors: Vec<ParameterId>,
    pub climates: Vec<String>,
    pub water_heaters: Vec<String>,
    pub fans: Vec<String>,
    pub thermostats: BTreeMap<u32, ThermostatConfig>,
}

/// A sub-device (indoor/outdoor module) of a system.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitConfig {
    pub categories: bool,
    pub statuses: bool,
}

/// A virtual thermostat feeding room temperature into climate systems.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThermostatConfig {
    pub name: String,
    pub climate_systems: Vec<u32>,
    pub current_temperature: Option<String>,
    pub valve_position: Option<String>,
}
