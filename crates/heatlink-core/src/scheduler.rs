// ── Periodic scheduler ──
//
// The host's timer primitive. `TokioScheduler` runs every task as its own
// tokio task with a cancellation token; a tick that is still running when
// the token fires is abandoned at its next suspension point.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// One tick of a periodic task.
pub type PollFn = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Runs callbacks on a fixed period until their handle is cancelled.
pub trait Scheduler: Send + Sync {
    /// Start `task` every `period`, first tick one period from now.
    fn schedule(&self, period: Duration, task: PollFn) -> TaskHandle;
}

// ── TaskHandle ──────────────────────────────────────────────────────

/// Cancellable handle to a scheduled task.
#[derive(Debug)]
pub struct TaskHandle {
    cancel: CancellationToken,
    join: Option<JoinHandle<()>>,
}

impl TaskHandle {
    pub fn new(cancel: CancellationToken, join: Option<JoinHandle<()>>) -> Self {
        Self { cancel, join }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Cancel and wait for the task to wind down.
    pub async fn stop(mut self) {
        self.cancel.cancel();
        if let Some(join) = self.join.take() {
            let _ = join.await;
        }
    }
}

// ── TokioScheduler ──────────────────────────────────────────────────

/// Scheduler backed by `tokio::time::interval`.
#[derive(Debug, Default)]
pub struct TokioScheduler {
    active: Arc<AtomicUsize>,
}

impl TokioScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tasks currently running (scheduled and not yet wound down).
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, period: Duration, task: PollFn) -> TaskHandle {
        let cancel = CancellationToken::new();
        let guard = ActiveGuard::enter(Arc::clone(&self.active));
        let join = tokio::spawn(periodic_task(period, task, cancel.clone(), guard));
        TaskHandle::new(cancel, Some(join))
    }
}

async fn periodic_task(
    period: Duration,
    task: PollFn,
    cancel: CancellationToken,
    _guard: ActiveGuard,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = task() => {}
                }
            }
        }
    }
    debug!(?period, "periodic task stopped");
}

/// Counts a running task for as long as it lives.
#[derive(Debug)]
struct ActiveGuard(Arc<AtomicUsize>);

impl ActiveGuard {
    fn enter(counter: Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::FutureExt;

    fn counting_task(counter: &Arc<AtomicUsize>) -> PollFn {
        let counter = Arc::clone(counter);
        Arc::new(move || {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
            .boxed()
        })
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_once_per_period_after_the_first() {
        let scheduler = TokioScheduler::new();
        let ticks = Arc::new(AtomicUsize::new(0));
        let handle = scheduler.schedule(Duration::from_secs(60), counting_task(&ticks));

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 3);

        handle.stop().await;
        assert_eq!(scheduler.active(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn stopped_task_never_ticks_again() {
        let scheduler = TokioScheduler::new();
        let ticks = Arc::new(AtomicUsize::new(0));
        let handle = scheduler.schedule(Duration::from_secs(10), counting_task(&ticks));
        assert_eq!(scheduler.active(), 1);

        handle.stop().await;
        tokio::time::sleep(Duration::from_secs(100)).await;
        assert_eq!(ticks.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.active(), 0);
    }
}
