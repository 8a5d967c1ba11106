// ── System controller ──
//
// Polling lifecycle for one remote system: fetch the system description,
// run an initial poll of notifications and statuses, then keep both fresh
// through two independent periodic tasks until unloaded.

use std::collections::BTreeSet;
use std::sync::{Arc, Weak};
use std::time::Duration;

use arc_swap::{ArcSwap, ArcSwapOption};
use futures_util::FutureExt;
use strum::Display;
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::Signal;
use crate::diff::diff_by_id;
use crate::error::RemoteFetchError;
use crate::host::HostServices;
use crate::model::{DeviceInfo, Notice, RemoteSystem, StatusSnapshot, SystemId};
use crate::remote::RemoteApi;
use crate::scheduler::{PollFn, TaskHandle};

// ── ControllerPhase ─────────────────────────────────────────────────

/// Lifecycle phase observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ControllerPhase {
    Unloaded,
    Loading,
    Active,
    Unloading,
}

/// The two periodic tasks every controller runs, in start order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum PollKind {
    Notifications,
    Statuses,
}

// ── SystemController ────────────────────────────────────────────────

/// Owns the polling lifecycle of one remote system.
///
/// Cheaply cloneable via `Arc`. Cached state is written only by the
/// controller's own polls and read lock-free through the accessors.
pub struct SystemController<A: RemoteApi> {
    inner: Arc<ControllerInner<A>>,
}

impl<A: RemoteApi> Clone for SystemController<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ControllerInner<A> {
    system_id: SystemId,
    client: Arc<A>,
    host: HostServices,
    poll_interval: Duration,
    phase: watch::Sender<ControllerPhase>,
    /// Replaced on every load, cancelled on unload.
    cancel: ArcSwap<CancellationToken>,
    system: ArcSwapOption<RemoteSystem>,
    device_info: ArcSwapOption<DeviceInfo>,
    notices: ArcSwap<Vec<Notice>>,
    statuses: ArcSwap<BTreeSet<String>>,
    /// Serializes notification polls so diff-then-store never interleaves.
    notice_poll: Mutex<()>,
    tasks: Mutex<Vec<TaskHandle>>,
}

impl<A: RemoteApi> SystemController<A> {
    pub fn new(
        system_id: SystemId,
        client: Arc<A>,
        host: HostServices,
        poll_interval: Duration,
    ) -> Self {
        let (phase, _) = watch::channel(ControllerPhase::Unloaded);
        Self {
            inner: Arc::new(ControllerInner {
                system_id,
                client,
                host,
                poll_interval,
                phase,
                cancel: ArcSwap::from_pointee(CancellationToken::new()),
                system: ArcSwapOption::empty(),
                device_info: ArcSwapOption::empty(),
                notices: ArcSwap::from_pointee(Vec::new()),
                statuses: ArcSwap::from_pointee(BTreeSet::new()),
                notice_poll: Mutex::new(()),
                tasks: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn system_id(&self) -> SystemId {
        self.inner.system_id
    }

    pub fn client(&self) -> &Arc<A> {
        &self.inner.client
    }

    pub fn phase(&self) -> ControllerPhase {
        *self.inner.phase.borrow()
    }

    /// Subscribe to phase transitions.
    pub fn watch_phase(&self) -> watch::Receiver<ControllerPhase> {
        self.inner.phase.subscribe()
    }

    /// The system description fetched by the last successful load.
    pub fn system(&self) -> Option<Arc<RemoteSystem>> {
        self.inner.system.load_full()
    }

    pub fn device_info(&self) -> Option<Arc<DeviceInfo>> {
        self.inner.device_info.load_full()
    }

    /// Last observed notification snapshot.
    pub fn notices(&self) -> Arc<Vec<Notice>> {
        self.inner.notices.load_full()
    }

    /// Last observed status categories.
    pub fn statuses(&self) -> Arc<BTreeSet<String>> {
        self.inner.statuses.load_full()
    }

    /// Number of periodic tasks currently scheduled.
    pub async fn task_count(&self) -> usize {
        self.inner.tasks.lock().await.len()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Fetch the system, run one initial poll of each kind and start the
    /// periodic tasks.
    ///
    /// Any fetch failure is fatal: the controller returns to `Unloaded`
    /// without scheduling anything.
    pub async fn load(&self) -> Result<(), RemoteFetchError> {
        let system_id = self.inner.system_id;
        let cancel = CancellationToken::new();
        self.inner.cancel.store(Arc::new(cancel.clone()));
        self.set_phase(ControllerPhase::Loading);

        let system = match self.inner.client.get_system(system_id).await {
            Ok(system) => system,
            Err(e) => {
                self.set_phase(ControllerPhase::Unloaded);
                return Err(e);
            }
        };
        debug!(system_id, name = %system.name, "system description fetched");
        self.inner
            .device_info
            .store(Some(Arc::new(DeviceInfo::for_system(&system))));
        self.inner.system.store(Some(Arc::new(system)));

        for kind in [PollKind::Notifications, PollKind::Statuses] {
            if let Err(e) = self.poll(kind).await {
                warn!(system_id, poll = %kind, error = %e, "initial poll failed");
                self.set_phase(ControllerPhase::Unloaded);
                return Err(e);
            }
        }

        {
            let mut tasks = self.inner.tasks.lock().await;
            if cancel.is_cancelled() {
                debug!(system_id, "unloaded while loading; not starting polls");
                return Ok(());
            }
            for kind in [PollKind::Notifications, PollKind::Statuses] {
                let handle = self
                    .inner
                    .host
                    .scheduler
                    .schedule(self.inner.poll_interval, self.poll_fn(kind));
                tasks.push(handle);
            }
        }

        self.set_phase(ControllerPhase::Active);
        info!(system_id, interval = ?self.inner.poll_interval, "system controller active");
        Ok(())
    }

    /// Cancel the periodic tasks in reverse start order.
    ///
    /// Safe on a controller that never loaded or is still loading; a poll
    /// in flight at this point is discarded when its fetch returns.
    pub async fn unload(&self) {
        let system_id = self.inner.system_id;
        self.set_phase(ControllerPhase::Unloading);
        self.inner.cancel.load().cancel();

        let handles = std::mem::take(&mut *self.inner.tasks.lock().await);
        let stopped = handles.len();
        for handle in handles.into_iter().rev() {
            handle.stop().await;
        }

        self.set_phase(ControllerPhase::Unloaded);
        debug!(system_id, stopped, "system controller unloaded");
    }

    // ── Polls ────────────────────────────────────────────────────

    pub async fn poll(&self, kind: PollKind) -> Result<(), RemoteFetchError> {
        match kind {
            PollKind::Notifications => self.poll_notifications().await,
            PollKind::Statuses => self.poll_statuses().await,
        }
    }

    /// Refresh the status categories and publish both status signals.
    ///
    /// Publishes on every successful poll, whether or not anything changed.
    pub async fn poll_statuses(&self) -> Result<(), RemoteFetchError> {
        let system_id = self.inner.system_id;
        let groups = self.inner.client.get_status(system_id).await?;
        if self.is_cancelled() {
            debug!(system_id, "discarding status poll after cancellation");
            return Ok(());
        }

        let snapshot = StatusSnapshot::from_groups(groups);
        let statuses = Arc::new(snapshot.statuses);
        self.inner.statuses.store(Arc::clone(&statuses));

        let bus = &self.inner.host.bus;
        bus.publish(Signal::ParametersUpdated {
            system_id,
            parameters: Arc::new(snapshot.parameters),
        });
        bus.publish(Signal::StatusesUpdated {
            system_id,
            statuses,
        });
        Ok(())
    }

    /// Refresh the notices, dismissing vanished ones and creating new ones.
    ///
    /// A failed fetch leaves the cached snapshot untouched.
    pub async fn poll_notifications(&self) -> Result<(), RemoteFetchError> {
        let system_id = self.inner.system_id;
        let _serial = self.inner.notice_poll.lock().await;

        let fetched = self.inner.client.get_notifications(system_id).await?;
        if self.is_cancelled() {
            debug!(system_id, "discarding notification poll after cancellation");
            return Ok(());
        }

        let current = self.inner.notices.load_full();
        {
            let diff = diff_by_id(&current, &fetched, |n| n.id);
            if !diff.is_empty() {
                debug!(
                    system_id,
                    added = diff.added.len(),
                    removed = diff.removed.len(),
                    "notices changed"
                );
            }

            let surface = &self.inner.host.notices;
            for notice in diff.removed {
                surface.dismiss_notice(&notice.key());
            }
            for notice in diff.added {
                surface.create_notice(&notice.description, &notice.title, &notice.key());
            }
        }
        self.inner.notices.store(Arc::new(fetched));
        Ok(())
    }

    // ── Internals ────────────────────────────────────────────────

    fn is_cancelled(&self) -> bool {
        self.inner.cancel.load().is_cancelled()
    }

    fn set_phase(&self, phase: ControllerPhase) {
        self.inner.phase.send_replace(phase);
    }

    /// Periodic callback for one poll kind. Holds only a weak reference so
    /// a dropped controller doesn't stay alive through its own tasks.
    fn poll_fn(&self, kind: PollKind) -> PollFn {
        let weak: Weak<ControllerInner<A>> = Arc::downgrade(&self.inner);
        Arc::new(move || {
            let weak = weak.clone();
            async move {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let controller = SystemController { inner };
                if let Err(e) = controller.poll(kind).await {
                    warn!(
                        system_id = controller.system_id(),
                        poll = %kind,
                        error = %e,
                        "poll failed"
                    );
                }
            }
            .boxed()
        })
    }
}

impl<A> Drop for ControllerInner<A> {
    fn drop(&mut self) {
        self.cancel.load().cancel();
        for task in self.tasks.get_mut().iter() {
            task.cancel();
        }
    }
}

impl<A: RemoteApi> std::fmt::Debug for SystemController<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SystemController")
            .field("system_id", &self.inner.system_id)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}
