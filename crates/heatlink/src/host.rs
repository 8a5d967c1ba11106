//! Host services for the command line: devices and platforms are logged,
//! notices go to the terminal, refreshed tokens go to each entry's state
//! file.

use std::collections::BTreeMap;
use std::path::PathBuf;

use owo_colors::OwoColorize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use heatlink_api::AccessData;
use heatlink_config::{read_state, write_state};
use heatlink_core::{
    DeviceInfo, DeviceRegistry, EntryId, EntryStore, HostError, NotificationSurface, Platform,
    PlatformForwarder, SystemId,
};

// ── Devices & platforms ──────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct LogDevices;

impl DeviceRegistry for LogDevices {
    fn register_device(&self, entry_id: &EntryId, device: &DeviceInfo) -> Result<(), HostError> {
        info!(
            entry = %entry_id,
            device = %device.name,
            model = device.model.as_deref().unwrap_or("unknown"),
            "device registered"
        );
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct LogPlatforms;

impl PlatformForwarder for LogPlatforms {
    fn setup_platform(&self, entry_id: &EntryId, platform: Platform) -> Result<(), HostError> {
        debug!(entry = %entry_id, %platform, "platform forwarded");
        Ok(())
    }

    fn unload_platform(&self, entry_id: &EntryId, platform: Platform) -> Result<(), HostError> {
        debug!(entry = %entry_id, %platform, "platform withdrawn");
        Ok(())
    }
}

// ── Notices ──────────────────────────────────────────────────────────

/// Prints notices as they appear and disappear.
#[derive(Debug)]
pub struct TerminalNotices {
    color: bool,
}

impl TerminalNotices {
    pub fn new(color: bool) -> Self {
        Self { color }
    }
}

impl NotificationSurface for TerminalNotices {
    fn create_notice(&self, message: &str, title: &str, key: &str) {
        if self.color {
            println!("{} {} {}", "▲".yellow().bold(), title.bold(), key.dimmed());
        } else {
            println!("▲ {title} {key}");
        }
        if !message.is_empty() {
            println!("  {message}");
        }
    }

    fn dismiss_notice(&self, key: &str) {
        if self.color {
            println!("{} dismissed {}", "✓".green().bold(), key.dimmed());
        } else {
            println!("✓ dismissed {key}");
        }
    }
}

// ── Entry state ──────────────────────────────────────────────────────

/// Persists refreshed tokens to each entry's state file and announces
/// the change on `updates`, the way a host reports an updated entry.
#[derive(Debug)]
pub struct StateStore {
    files: BTreeMap<EntryId, PathBuf>,
    updates: mpsc::UnboundedSender<EntryId>,
}

impl StateStore {
    pub fn new(
        files: BTreeMap<EntryId, PathBuf>,
        updates: mpsc::UnboundedSender<EntryId>,
    ) -> Self {
        Self { files, updates }
    }

    /// Remember the systems an entry loaded, so later runs keep them
    /// even when they drop out of the config file.
    pub fn remember_systems(
        &self,
        entry_id: &EntryId,
        systems: impl IntoIterator<Item = SystemId>,
    ) {
        let Some(path) = self.files.get(entry_id) else {
            return;
        };
        let result = read_state(path).and_then(|mut state| {
            if state.set_systems(systems) {
                write_state(path, &state)?;
            }
            Ok(())
        });
        if let Err(e) = result {
            warn!(entry = %entry_id, error = %e, "failed to remember systems");
        }
    }
}

impl EntryStore for StateStore {
    fn update_access_data(&self, entry_id: &EntryId, data: &AccessData) -> bool {
        let Some(path) = self.files.get(entry_id) else {
            warn!(entry = %entry_id, "no state file for entry, tokens not stored");
            return false;
        };

        let mut state = match read_state(path) {
            Ok(state) => state,
            Err(e) => {
                warn!(entry = %entry_id, error = %e, "failed to read entry state");
                return false;
            }
        };
        if !state.set_access_data(data) {
            return false;
        }
        if let Err(e) = write_state(path, &state) {
            warn!(entry = %entry_id, error = %e, "failed to store refreshed tokens");
            return false;
        }

        debug!(entry = %entry_id, "refreshed tokens stored");
        // The run loop may already be gone during shutdown.
        let _ = self.updates.send(entry_id.clone());
        true
    }
}
