// ── Lifecycle chain ──
//
// An undo stack: every successfully acquired resource pushes its release
// action, and releasing pops them last-in first-out. A failing release is
// logged and the unwind carries on with the next resource.

use std::fmt;

use futures_util::future::BoxFuture;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::ReleaseError;

type ReleaseFn = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), ReleaseError>> + Send>;

struct Release {
    resource: String,
    run: ReleaseFn,
}

/// Ordered set of acquired resources, released in reverse.
///
/// Meant to be consumed by [`release`](Self::release) or
/// [`hand_off`](Self::hand_off). A non-empty chain that is dropped, for
/// instance because the future acquiring it was cancelled, is released on
/// a background task; outside a tokio runtime its resources leak with a
/// warning.
pub struct LifecycleChain {
    label: String,
    stack: Vec<Release>,
}

impl LifecycleChain {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            stack: Vec::new(),
        }
    }

    /// Record an acquired resource together with the action that releases it.
    pub fn push<F>(&mut self, resource: impl Into<String>, release: F)
    where
        F: FnOnce() -> BoxFuture<'static, Result<(), ReleaseError>> + Send + 'static,
    {
        let resource = resource.into();
        debug!(chain = %self.label, %resource, "acquired");
        self.stack.push(Release {
            resource,
            run: Box::new(release),
        });
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Held resources in acquisition order.
    pub fn resources(&self) -> impl Iterator<Item = &str> {
        self.stack.iter().map(|r| r.resource.as_str())
    }

    /// Release every resource, last acquired first. Never fails; each
    /// release error is logged and the unwind continues.
    pub async fn release(mut self) {
        let stack = std::mem::take(&mut self.stack);
        unwind(&self.label, stack).await;
    }

    /// Move the chain into a handle owned by a longer-lived holder.
    /// Nothing is released.
    pub fn hand_off(self) -> ChainHandle {
        ChainHandle {
            label: self.label.clone(),
            chain: Mutex::new(Some(self)),
        }
    }
}

impl Drop for LifecycleChain {
    fn drop(&mut self) {
        if self.stack.is_empty() {
            return;
        }
        let pending = self.stack.len();
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(chain = %self.label, leaked = pending, "lifecycle chain dropped without release");
            return;
        };

        warn!(chain = %self.label, pending, "lifecycle chain dropped, releasing in background");
        let label = self.label.clone();
        let stack = std::mem::take(&mut self.stack);
        runtime.spawn(async move { unwind(&label, stack).await });
    }
}

async fn unwind(label: &str, stack: Vec<Release>) {
    let total = stack.len();
    let mut failed = 0usize;

    for entry in stack.into_iter().rev() {
        match (entry.run)().await {
            Ok(()) => debug!(chain = %label, resource = %entry.resource, "released"),
            Err(e) => {
                failed += 1;
                warn!(
                    chain = %label,
                    resource = %entry.resource,
                    error = %e,
                    "release failed"
                );
            }
        }
    }

    debug!(chain = %label, total, failed, "chain released");
}

impl fmt::Debug for LifecycleChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleChain")
            .field("label", &self.label)
            .field("resources", &self.resources().collect::<Vec<_>>())
            .finish()
    }
}

// ── ChainHandle ─────────────────────────────────────────────────────

/// Ownership token for a handed-off chain.
///
/// The only capability is [`release`](Self::release); the first call
/// tears the chain down, later calls return immediately.
pub struct ChainHandle {
    label: String,
    chain: Mutex<Option<LifecycleChain>>,
}

impl ChainHandle {
    pub async fn release(&self) {
        let chain = self.chain.lock().await.take();
        match chain {
            Some(chain) => chain.release().await,
            None => debug!(chain = %self.label, "chain already released"),
        }
    }

    pub async fn is_released(&self) -> bool {
        self.chain.lock().await.is_none()
    }
}

impl fmt::Debug for ChainHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainHandle")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}
