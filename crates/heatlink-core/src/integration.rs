// ── Integration entry point ──
//
// Registry of set-up access points. `setup_entry` acquires a chain through
// the `LifecycleManager` and keeps its handle; `unload_entry` releases it.
// Token write-backs raise the entry's `ReloadGate` so the config update
// they cause doesn't tear the entry down again.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use heatlink_api::{AccessData, AccessDataWriter};
use tracing::{debug, info};

use crate::config::AccessPointConfig;
use crate::controller::SystemController;
use crate::error::{AcquisitionError, EntryError};
use crate::host::HostServices;
use crate::lifecycle::ChainHandle;
use crate::manager::{AccessPoint, LifecycleManager};
use crate::model::{EntryId, SystemId};
use crate::remote::Connector;
use crate::switch::ParameterSwitch;

// ── ReloadGate ──────────────────────────────────────────────────────

/// Counts config updates that should not trigger a reload.
///
/// Raised once per local token write-back and lowered either when the
/// host reports nothing changed or when the resulting update arrives.
/// Never goes below zero: an unmatched decrement is a no-op.
#[derive(Debug, Default)]
pub struct ReloadGate {
    pending: AtomicU32,
}

impl ReloadGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect one more self-inflicted update.
    pub fn suppress_next(&self) {
        self.pending.fetch_add(1, Ordering::AcqRel);
    }

    /// Take back a suppression whose update will never arrive.
    pub fn withdraw(&self) {
        self.decrement();
    }

    /// Consume one suppression. Returns `false` when none was pending,
    /// meaning the update came from outside and should reload the entry.
    pub fn try_consume(&self) -> bool {
        self.decrement()
    }

    pub fn pending(&self) -> u32 {
        self.pending.load(Ordering::Acquire)
    }

    fn decrement(&self) -> bool {
        self.pending
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// What `handle_entry_updated` did with an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The update was our own token write-back.
    Suppressed,
    /// The entry was torn down and set up again.
    Reloaded,
}

// ── Integration ─────────────────────────────────────────────────────

struct EntryRecord<C: Connector> {
    access_point: AccessPoint<C>,
    handle: ChainHandle,
    switches: Vec<Arc<ParameterSwitch<C::Client>>>,
}

impl<C: Connector> EntryRecord<C> {
    /// Detach the switches, then release the chain.
    async fn release(&self) {
        for switch in &self.switches {
            switch.detach();
        }
        self.handle.release().await;
    }
}

/// Explicit registry of access points, keyed by entry id.
pub struct Integration<C: Connector> {
    manager: LifecycleManager<C>,
    entries: DashMap<EntryId, Arc<EntryRecord<C>>>,
    /// Outlive reloads; dropped on unload or a failed setup.
    gates: DashMap<EntryId, Arc<ReloadGate>>,
}

impl<C: Connector> Integration<C> {
    pub fn new(connector: Arc<C>, host: HostServices) -> Self {
        Self {
            manager: LifecycleManager::new(connector, host),
            entries: DashMap::new(),
            gates: DashMap::new(),
        }
    }

    pub fn host(&self) -> &HostServices {
        self.manager.host()
    }

    // ── Entry lifecycle ──────────────────────────────────────────

    /// Acquire and hold the full chain for one access point.
    pub async fn setup_entry(
        &self,
        entry_id: EntryId,
        config: &AccessPointConfig,
    ) -> Result<(), EntryError> {
        if self.entries.contains_key(&entry_id) {
            return Err(AcquisitionError::AlreadyLoaded { entry_id }.into());
        }
        debug!(entry_id = %entry_id, systems = config.systems.len(), "setting up entry");

        let writer = self.access_data_writer(&entry_id);
        let acquired = match self.manager.acquire(&entry_id, config, Some(writer)).await {
            Ok(acquired) => acquired,
            Err(e) => {
                if !self.entries.contains_key(&entry_id) {
                    self.gates.remove(&entry_id);
                }
                return Err(e.into());
            }
        };
        let (access_point, handle) = acquired.hand_off();

        let bus = &self.host().bus;
        let client = &access_point.client;
        let switches = config
            .systems
            .iter()
            .filter(|(system_id, _)| access_point.controllers.contains_key(*system_id))
            .flat_map(|(&system_id, system)| {
                system.switches.iter().map(move |&parameter_id| {
                    Arc::new(ParameterSwitch::new(
                        system_id,
                        parameter_id,
                        Arc::clone(client),
                        bus,
                    ))
                })
            })
            .collect();

        let record = Arc::new(EntryRecord {
            access_point,
            handle,
            switches,
        });

        let rejected = match self.entries.entry(entry_id.clone()) {
            Entry::Occupied(_) => Some(record),
            Entry::Vacant(slot) => {
                slot.insert(record);
                None
            }
        };
        if let Some(record) = rejected {
            record.release().await;
            return Err(AcquisitionError::AlreadyLoaded { entry_id }.into());
        }

        info!(entry_id = %entry_id, "entry set up");
        Ok(())
    }

    /// Release everything held for an access point.
    pub async fn unload_entry(&self, entry_id: &EntryId) -> Result<(), EntryError> {
        self.teardown(entry_id).await?;
        self.gates.remove(entry_id);
        info!(entry_id = %entry_id, "entry unloaded");
        Ok(())
    }

    /// Tear an entry down and set it up again with `config`.
    pub async fn reload_entry(
        &self,
        entry_id: &EntryId,
        config: &AccessPointConfig,
    ) -> Result<(), EntryError> {
        self.teardown(entry_id).await?;
        info!(entry_id = %entry_id, "reloading entry");
        self.setup_entry(entry_id.clone(), config).await
    }

    /// React to a change of the stored entry: our own token write-backs
    /// are swallowed, anything else reloads the entry.
    pub async fn handle_entry_updated(
        &self,
        entry_id: &EntryId,
        config: &AccessPointConfig,
    ) -> Result<UpdateOutcome, EntryError> {
        let suppressed = self
            .gates
            .get(entry_id)
            .is_some_and(|gate| gate.try_consume());
        if suppressed {
            debug!(entry_id = %entry_id, "entry update caused by token write-back; not reloading");
            return Ok(UpdateOutcome::Suppressed);
        }
        self.reload_entry(entry_id, config).await?;
        Ok(UpdateOutcome::Reloaded)
    }

    /// Unload every entry, e.g. on shutdown.
    pub async fn unload_all(&self) {
        let ids: Vec<EntryId> = self.entries.iter().map(|e| e.key().clone()).collect();
        for entry_id in ids {
            // Concurrent unloads may have raced us to it.
            let _ = self.unload_entry(&entry_id).await;
        }
    }

    async fn teardown(&self, entry_id: &EntryId) -> Result<(), EntryError> {
        let Some((_, record)) = self.entries.remove(entry_id) else {
            return Err(EntryError::NotLoaded {
                entry_id: entry_id.clone(),
            });
        };
        record.release().await;
        Ok(())
    }

    // ── Accessors ────────────────────────────────────────────────

    pub fn is_loaded(&self, entry_id: &EntryId) -> bool {
        self.entries.contains_key(entry_id)
    }

    pub fn entry_ids(&self) -> Vec<EntryId> {
        let mut ids: Vec<EntryId> = self.entries.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    /// The reload gate of an entry, if one has been handed to a session.
    pub fn gate(&self, entry_id: &EntryId) -> Option<Arc<ReloadGate>> {
        self.gates.get(entry_id).map(|gate| Arc::clone(gate.value()))
    }

    pub fn client(&self, entry_id: &EntryId) -> Option<Arc<C::Client>> {
        self.entries
            .get(entry_id)
            .map(|r| Arc::clone(&r.access_point.client))
    }

    pub fn controller(
        &self,
        entry_id: &EntryId,
        system_id: SystemId,
    ) -> Option<SystemController<C::Client>> {
        self.entries
            .get(entry_id)
            .and_then(|r| r.access_point.controller(system_id).cloned())
    }

    pub fn controllers(&self, entry_id: &EntryId) -> Vec<SystemController<C::Client>> {
        self.entries
            .get(entry_id)
            .map(|r| r.access_point.controllers.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn switches(&self, entry_id: &EntryId) -> Vec<Arc<ParameterSwitch<C::Client>>> {
        self.entries
            .get(entry_id)
            .map(|r| r.switches.clone())
            .unwrap_or_default()
    }

    // ── Internals ────────────────────────────────────────────────

    fn access_data_writer(&self, entry_id: &EntryId) -> AccessDataWriter {
        let gate = Arc::clone(self.gates.entry(entry_id.clone()).or_default().value());
        let store = Arc::clone(&self.host().entries);
        let entry_id = entry_id.clone();
        Arc::new(move |data: &AccessData| {
            gate.suppress_next();
            if !store.update_access_data(&entry_id, data) {
                gate.withdraw();
            }
        })
    }
}

impl<C: Connector> std::fmt::Debug for Integration<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Integration")
            .field("entries", &self.entry_ids())
            .finish_non_exhaustive()
    }
}
