// ── Persisted entry state ──
//
// Tokens written back by the session and the systems an entry has seen,
// one TOML file per entry. Missing files read as empty state.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use heatlink_api::AccessData;
use heatlink_core::SystemId;

use crate::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct EntryState {
    /// Systems loaded by an earlier run.
    #[serde(default)]
    pub systems: Vec<SystemId>,

    #[serde(default)]
    pub access_data: Option<AccessData>,
}

impl EntryState {
    /// Replace the stored tokens. Returns `false` when they were already
    /// identical.
    pub fn set_access_data(&mut self, data: &AccessData) -> bool {
        if self.access_data.as_ref() == Some(data) {
            return false;
        }
        self.access_data = Some(data.clone());
        true
    }

    /// Remember `systems` (sorted, deduplicated). Returns `false` when
    /// nothing changed.
    pub fn set_systems(&mut self, systems: impl IntoIterator<Item = SystemId>) -> bool {
        let mut systems: Vec<SystemId> = systems.into_iter().collect();
        systems.sort_unstable();
        systems.dedup();
        if systems == self.systems {
            return false;
        }
        self.systems = systems;
        true
    }
}

/// Default state file for `entry` under `dir`.
pub fn state_path(dir: &Path, entry: &str) -> PathBuf {
    dir.join(format!("{entry}.toml"))
}

pub fn read_state(path: &Path) -> Result<EntryState, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(raw) => Ok(toml::from_str(&raw)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(EntryState::default()),
        Err(e) => Err(e.into()),
    }
}

pub fn write_state(path: &Path, state: &EntryState) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(state)?;
    std::fs::write(path, toml_str)?;
    tracing::debug!(path = %path.display(), "entry state written");
    Ok(())
}
