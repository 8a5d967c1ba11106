// ── Resource lifecycle manager ──
//
// Acquires one access point's chain: session, client, every system
// controller (loaded concurrently), then device registration and platform
// forwarding. Each acquired step pushes its release onto a
// `LifecycleChain`; any failure unwinds what was acquired before the error
// reaches the caller.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::join_all;
use heatlink_api::AccessDataWriter;
use tracing::{debug, info, warn};

use crate::config::AccessPointConfig;
use crate::controller::SystemController;
use crate::error::{AcquisitionError, ReleaseError};
use crate::host::HostServices;
use crate::lifecycle::{ChainHandle, LifecycleChain};
use crate::model::{EntryId, Platform, SystemId};
use crate::remote::Connector;

/// Live resources of an acquired access point.
pub struct AccessPoint<C: Connector> {
    pub entry_id: EntryId,
    pub session: Arc<C::Session>,
    pub client: Arc<C::Client>,
    pub controllers: BTreeMap<SystemId, SystemController<C::Client>>,
}

impl<C: Connector> AccessPoint<C> {
    pub fn controller(&self, system_id: SystemId) -> Option<&SystemController<C::Client>> {
        self.controllers.get(&system_id)
    }
}

impl<C: Connector> std::fmt::Debug for AccessPoint<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessPoint")
            .field("entry_id", &self.entry_id)
            .field("systems", &self.controllers.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// A fully acquired access point together with the chain that releases it.
pub struct Acquired<C: Connector> {
    pub access_point: AccessPoint<C>,
    pub chain: LifecycleChain,
}

impl<C: Connector> std::fmt::Debug for Acquired<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Acquired")
            .field("access_point", &self.access_point)
            .field("chain", &self.chain)
            .finish()
    }
}

impl<C: Connector> Acquired<C> {
    /// Transfer release responsibility to a long-lived holder.
    pub fn hand_off(self) -> (AccessPoint<C>, ChainHandle) {
        (self.access_point, self.chain.hand_off())
    }

    /// Release everything right away.
    pub async fn release(self) {
        self.chain.release().await;
    }
}

// ── LifecycleManager ────────────────────────────────────────────────

/// Orchestrates acquisition and release of access point chains.
pub struct LifecycleManager<C> {
    connector: Arc<C>,
    host: HostServices,
}

impl<C: Connector> LifecycleManager<C> {
    pub fn new(connector: Arc<C>, host: HostServices) -> Self {
        Self { connector, host }
    }

    pub fn host(&self) -> &HostServices {
        &self.host
    }

    pub fn connector(&self) -> &Arc<C> {
        &self.connector
    }

    /// Acquire the full chain for one access point.
    ///
    /// All-or-nothing: on error every step already acquired has been
    /// released, last first, before this returns. Dropping the future
    /// part-way releases the steps acquired so far on a background task,
    /// and controllers still loading stop their polls when dropped.
    pub async fn acquire(
        &self,
        entry_id: &EntryId,
        config: &AccessPointConfig,
        access_data_write: Option<AccessDataWriter>,
    ) -> Result<Acquired<C>, AcquisitionError> {
        let mut chain = LifecycleChain::new(entry_id.to_string());
        match self
            .acquire_into(&mut chain, entry_id, config, access_data_write)
            .await
        {
            Ok(access_point) => {
                info!(
                    entry_id = %entry_id,
                    systems = access_point.controllers.len(),
                    resources = chain.len(),
                    "access point acquired"
                );
                Ok(Acquired {
                    access_point,
                    chain,
                })
            }
            Err(e) => {
                warn!(entry_id = %entry_id, error = %e, "acquisition failed, unwinding");
                chain.release().await;
                Err(e)
            }
        }
    }

    async fn acquire_into(
        &self,
        chain: &mut LifecycleChain,
        entry_id: &EntryId,
        config: &AccessPointConfig,
        access_data_write: Option<AccessDataWriter>,
    ) -> Result<AccessPoint<C>, AcquisitionError> {
        // 1. Session
        let session_config = config.session_config(access_data_write);
        let session = self
            .connector
            .open_session(session_config)
            .await
            .map_err(AcquisitionError::Session)?;
        {
            let connector = Arc::clone(&self.connector);
            let session = Arc::clone(&session);
            chain.push("session", move || {
                async move { connector.close_session(&session).await }.boxed()
            });
        }

        // 2. Client
        let client = self
            .connector
            .open_client(&session)
            .await
            .map_err(AcquisitionError::Client)?;
        {
            let connector = Arc::clone(&self.connector);
            let client = Arc::clone(&client);
            chain.push("client", move || {
                async move { connector.close_client(&client).await }.boxed()
            });
        }

        // 3. Controllers, loaded concurrently
        let controllers: Vec<SystemController<C::Client>> = config
            .systems
            .keys()
            .map(|&system_id| {
                SystemController::new(
                    system_id,
                    Arc::clone(&client),
                    self.host.clone(),
                    config.poll_interval,
                )
            })
            .collect();
        debug!(entry_id = %entry_id, count = controllers.len(), "loading system controllers");

        let results = join_all(controllers.iter().map(|c| c.load())).await;

        let mut first_failure = None;
        let mut loaded = BTreeMap::new();
        for (controller, result) in controllers.into_iter().zip(results) {
            let system_id = controller.system_id();
            match result {
                Ok(()) => {
                    let unload = controller.clone();
                    chain.push(format!("system {system_id}"), move || {
                        async move {
                            unload.unload().await;
                            Ok(())
                        }
                        .boxed()
                    });
                    loaded.insert(system_id, controller);
                }
                Err(source) => {
                    warn!(system_id, error = %source, "system controller failed to load");
                    if first_failure.is_none() {
                        first_failure = Some(AcquisitionError::SystemLoad { system_id, source });
                    }
                }
            }
        }
        if let Some(e) = first_failure {
            return Err(e);
        }

        // 4. Host exposure
        for controller in loaded.values() {
            let Some(device) = controller.device_info() else {
                continue;
            };
            self.host
                .devices
                .register_device(entry_id, &device)
                .map_err(|source| AcquisitionError::DeviceRegistration {
                    system_id: controller.system_id(),
                    source,
                })?;
        }

        for platform in Platform::forwarded() {
            self.host
                .platforms
                .setup_platform(entry_id, platform)
                .map_err(|source| AcquisitionError::Platform { platform, source })?;

            let platforms = Arc::clone(&self.host.platforms);
            let entry = entry_id.clone();
            chain.push(format!("platform {platform}"), move || {
                async move {
                    platforms
                        .unload_platform(&entry, platform)
                        .map_err(|e| ReleaseError::new(format!("platform {platform}"), e))
                }
                .boxed()
            });
        }

        Ok(AccessPoint {
            entry_id: entry_id.clone(),
            session,
            client,
            controllers: loaded,
        })
    }
}

impl<C> std::fmt::Debug for LifecycleManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LifecycleManager").finish_non_exhaustive()
    }
}
