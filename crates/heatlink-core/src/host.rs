// ── Host seams ──
//
// Everything the integration asks of the embedding application: a device
// registry, a notification surface, platform forwarding, persistence of
// refreshed tokens, a scheduler and the signal bus. Bundled into
// `HostServices` and passed explicitly to the entry point.

use std::fmt;
use std::sync::Arc;

use heatlink_api::AccessData;

use crate::bus::EventBus;
use crate::error::HostError;
use crate::model::{DeviceInfo, EntryId, Platform};
use crate::scheduler::Scheduler;

/// Records the physical devices behind an access point.
pub trait DeviceRegistry: Send + Sync {
    fn register_device(&self, entry_id: &EntryId, device: &DeviceInfo) -> Result<(), HostError>;
}

/// Persistent user-facing notices, keyed so that re-creating replaces.
pub trait NotificationSurface: Send + Sync {
    fn create_notice(&self, message: &str, title: &str, key: &str);
    fn dismiss_notice(&self, key: &str);
}

/// Exposes (and withdraws) an entity platform for an access point.
pub trait PlatformForwarder: Send + Sync {
    fn setup_platform(&self, entry_id: &EntryId, platform: Platform) -> Result<(), HostError>;
    fn unload_platform(&self, entry_id: &EntryId, platform: Platform) -> Result<(), HostError>;
}

/// Stores per-entry data that outlives a run.
pub trait EntryStore: Send + Sync {
    /// Persist refreshed access data. Returns `false` when the stored data
    /// was already identical, in which case no update callback will follow.
    fn update_access_data(&self, entry_id: &EntryId, data: &AccessData) -> bool;
}

/// The host capabilities handed to the integration.
#[derive(Clone)]
pub struct HostServices {
    pub devices: Arc<dyn DeviceRegistry>,
    pub notices: Arc<dyn NotificationSurface>,
    pub platforms: Arc<dyn PlatformForwarder>,
    pub entries: Arc<dyn EntryStore>,
    pub scheduler: Arc<dyn Scheduler>,
    pub bus: Arc<EventBus>,
}

impl fmt::Debug for HostServices {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostServices")
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}
