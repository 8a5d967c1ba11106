//! Configuration for the heatlink host.
//!
//! TOML access point profiles, credential resolution (env + plaintext),
//! persisted entry state, and translation to
//! `heatlink_core::AccessPointConfig`.

pub mod state;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use heatlink_api::{DEFAULT_API_URL, TransportConfig};
use heatlink_core::{AccessPointConfig, SystemConfig, ThermostatConfig, UnitConfig};

pub use state::{EntryState, read_state, state_path, write_state};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no client secret configured for access point '{entry}'")]
    NoCredentials { entry: String },

    #[error("access point '{entry}' not found in configuration")]
    UnknownEntry { entry: String },

    #[error("failed to serialize entry state: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("failed to parse entry state: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub defaults: Defaults,

    /// Access points keyed by entry id.
    #[serde(default)]
    pub access_points: BTreeMap<String, AccessPointProfile>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_api_url")]
    pub api_url: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            timeout_secs: default_timeout(),
            api_url: default_api_url(),
        }
    }
}

fn default_poll_interval() -> u64 {
    heatlink_core::DEFAULT_POLL_INTERVAL.as_secs()
}
fn default_timeout() -> u64 {
    30
}
fn default_api_url() -> String {
    DEFAULT_API_URL.into()
}

/// One registered Uplink application plus the systems it exposes.
#[derive(Debug, Deserialize, Serialize)]
pub struct AccessPointProfile {
    pub client_id: String,

    /// Client secret (plaintext, prefer `client_secret_env`).
    pub client_secret: Option<String>,

    /// Environment variable name containing the client secret.
    pub client_secret_env: Option<String>,

    pub redirect_uri: String,

    #[serde(default)]
    pub write_access: bool,

    /// Where refreshed tokens and known systems are kept.
    pub access_data_file: Option<PathBuf>,

    /// Override of `defaults.poll_interval_secs`.
    pub poll_interval_secs: Option<u64>,

    /// Keyed by system id.
    #[serde(default)]
    pub systems: BTreeMap<String, SystemProfile>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct SystemProfile {
    /// Keyed by unit id.
    #[serde(default)]
    pub units: BTreeMap<String, UnitProfile>,
    #[serde(default)]
    pub sensors: Vec<u32>,
    #[serde(default)]
    pub switches: Vec<u32>,
    #[serde(default)]
    pub binary_sensors: Vec<u32>,
    #[serde(default)]
    pub climates: Vec<String>,
    #[serde(default)]
    pub water_heaters: Vec<String>,
    #[serde(default)]
    pub fans: Vec<String>,
    /// Keyed by thermostat id.
    #[serde(default)]
    pub thermostats: BTreeMap<String, ThermostatProfile>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct UnitProfile {
    #[serde(default)]
    pub categories: bool,
    #[serde(default)]
    pub statuses: bool,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ThermostatProfile {
    pub name: String,
    #[serde(default = "default_climate_systems")]
    pub climate_systems: Vec<u32>,
    pub current_temperature: Option<String>,
    pub valve_position: Option<String>,
}

fn default_climate_systems() -> Vec<u32> {
    vec![1]
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "heatlink", "heatlink")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback(".config").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Directory holding per-entry state files.
pub fn data_dir() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback(".local/share"),
        |dirs| dirs.data_dir().to_path_buf(),
    )
}

fn dirs_fallback(base: &str) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(base);
    p.push("heatlink");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from file + environment.
///
/// Environment variables use `__` as the nesting separator, e.g.
/// `HEATLINK_DEFAULTS__POLL_INTERVAL_SECS=30`.
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("HEATLINK_").split("__"));

    let config: Config = figment.extract()?;
    tracing::debug!(
        path = %path.display(),
        access_points = config.access_points.len(),
        "configuration loaded"
    );
    Ok(config)
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the client secret: `client_secret_env` lookup, then plaintext.
pub fn resolve_client_secret(
    profile: &AccessPointProfile,
    entry: &str,
) -> Result<SecretString, ConfigError> {
    if let Some(ref env_name) = profile.client_secret_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    if let Some(ref secret) = profile.client_secret {
        return Ok(SecretString::from(secret.clone()));
    }

    Err(ConfigError::NoCredentials {
        entry: entry.into(),
    })
}

// ── Translation ─────────────────────────────────────────────────────

impl Config {
    pub fn profile(&self, entry: &str) -> Result<&AccessPointProfile, ConfigError> {
        self.access_points
            .get(entry)
            .ok_or_else(|| ConfigError::UnknownEntry {
                entry: entry.into(),
            })
    }

    /// Where `entry` keeps its state file.
    pub fn state_file(&self, entry: &str) -> Result<PathBuf, ConfigError> {
        let profile = self.profile(entry)?;
        Ok(profile
            .access_data_file
            .clone()
            .unwrap_or_else(|| state_path(&data_dir(), entry)))
    }
}

/// Build an `AccessPointConfig` from a profile, without persisted state.
pub fn profile_to_access_point_config(
    profile: &AccessPointProfile,
    entry: &str,
    defaults: &Defaults,
) -> Result<AccessPointConfig, ConfigError> {
    let redirect_uri = parse_url("redirect_uri", &profile.redirect_uri)?;
    let api_url = parse_url("api_url", &defaults.api_url)?;
    let client_secret = resolve_client_secret(profile, entry)?;

    let poll_secs = profile
        .poll_interval_secs
        .unwrap_or(defaults.poll_interval_secs);
    if poll_secs == 0 {
        return Err(ConfigError::Validation {
            field: "poll_interval_secs".into(),
            reason: "must be at least 1 second".into(),
        });
    }

    let mut config =
        AccessPointConfig::new(profile.client_id.clone(), client_secret, redirect_uri);
    config.write_access = profile.write_access;
    config.poll_interval = Duration::from_secs(poll_secs);
    config.transport = TransportConfig {
        timeout: Duration::from_secs(defaults.timeout_secs),
        ..TransportConfig::default()
    }
    .with_base_url(&api_url);

    for (key, system) in &profile.systems {
        let system_id = parse_id(&format!("access_points.{entry}.systems"), key)?;
        config.systems.insert(system_id, system_config(system, entry)?);
    }

    Ok(config)
}

/// Resolve `entry` fully: profile translation plus stored tokens and
/// systems remembered from earlier runs.
pub fn resolve_access_point(
    config: &Config,
    entry: &str,
) -> Result<AccessPointConfig, ConfigError> {
    let profile = config.profile(entry)?;
    let mut resolved = profile_to_access_point_config(profile, entry, &config.defaults)?;

    let state = read_state(&config.state_file(entry)?)?;
    resolved.access_data = state.access_data;
    resolved.merge_known_systems(state.systems);
    Ok(resolved)
}

fn system_config(profile: &SystemProfile, entry: &str) -> Result<SystemConfig, ConfigError> {
    let mut units = BTreeMap::new();
    for (key, unit) in &profile.units {
        let unit_id = parse_id(&format!("access_points.{entry}.units"), key)?;
        units.insert(
            unit_id,
            UnitConfig {
                categories: unit.categories,
                statuses: unit.statuses,
            },
        );
    }

    let mut thermostats = BTreeMap::new();
    for (key, thermostat) in &profile.thermostats {
        let thermostat_id = parse_id(&format!("access_points.{entry}.thermostats"), key)?;
        thermostats.insert(
            thermostat_id,
            ThermostatConfig {
                name: thermostat.name.clone(),
                climate_systems: thermostat.climate_systems.clone(),
                current_temperature: thermostat.current_temperature.clone(),
                valve_position: thermostat.valve_position.clone(),
            },
        );
    }

    Ok(SystemConfig {
        units,
        sensors: profile.sensors.clone(),
        switches: profile.switches.clone(),
        binary_sensors: profile.binary_sensors.clone(),
        climates: profile.climates.clone(),
        water_heaters: profile.water_heaters.clone(),
        fans: profile.fans.clone(),
        thermostats,
    })
}

fn parse_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL: {raw}"),
    })
}

fn parse_id(field: &str, raw: &str) -> Result<u32, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Validation {
        field: field.into(),
        reason: format!("expected a numeric id, got '{raw}'"),
    })
}
