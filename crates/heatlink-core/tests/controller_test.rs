#![allow(clippy::unwrap_used)]
// Polling, diffing and dispatch of `SystemController`.

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use pretty_assertions::assert_eq;
use tokio::sync::Notify;

use common::{FakeRemote, Harness, group, parameter};
use heatlink_core::{
    ControllerPhase, HostServices, RemoteFetchError, Signal, SystemController, TokioScheduler,
    Topic,
};

const INTERVAL: Duration = Duration::from_secs(60);

fn controller(h: &Harness, system_id: u32) -> SystemController<FakeRemote> {
    SystemController::new(system_id, Arc::clone(&h.remote), h.services.clone(), INTERVAL)
}

// ── Load / unload ───────────────────────────────────────────────────

#[tokio::test]
async fn load_polls_once_then_schedules_both_tasks() {
    let h = Harness::new();
    h.remote.set_notices(7, &[1]);
    h.remote.set_status(7, vec![group("Compressor", vec![])]);
    let ctrl = controller(&h, 7);

    ctrl.load().await.unwrap();

    assert_eq!(ctrl.phase(), ControllerPhase::Active);
    assert_eq!(ctrl.notices().len(), 1);
    assert_eq!(*ctrl.statuses(), BTreeSet::from(["Compressor".to_owned()]));
    assert_eq!(ctrl.device_info().unwrap().name, "System 7 - 7");
    assert_eq!(h.scheduler.periods(), vec![INTERVAL, INTERVAL]);
    assert_eq!(ctrl.task_count().await, 2);

    ctrl.unload().await;
    assert_eq!(ctrl.phase(), ControllerPhase::Unloaded);
    assert_eq!(h.scheduler.active(), 0);
    assert_eq!(ctrl.task_count().await, 0);
}

#[tokio::test]
async fn failed_load_schedules_nothing() {
    let h = Harness::new();
    h.remote.fail_system(7);
    let ctrl = controller(&h, 7);

    assert!(ctrl.load().await.is_err());
    assert_eq!(ctrl.phase(), ControllerPhase::Unloaded);
    assert_eq!(h.scheduler.scheduled(), 0);
}

#[tokio::test]
async fn initial_poll_failure_fails_load() {
    let h = Harness::new();
    h.remote.fail_polls.store(true, Ordering::SeqCst);
    let ctrl = controller(&h, 7);

    assert!(matches!(
        ctrl.load().await,
        Err(RemoteFetchError::Unreachable { .. })
    ));
    assert_eq!(ctrl.phase(), ControllerPhase::Unloaded);
    assert_eq!(h.scheduler.scheduled(), 0);
    assert_eq!(ctrl.task_count().await, 0);
}

#[tokio::test]
async fn unload_without_load_is_safe() {
    let h = Harness::new();
    let ctrl = controller(&h, 7);
    ctrl.unload().await;
    ctrl.unload().await;
    assert_eq!(ctrl.phase(), ControllerPhase::Unloaded);
}

// ── Notifications ───────────────────────────────────────────────────

#[tokio::test]
async fn notification_diff_creates_and_dismisses_by_key() {
    let h = Harness::new();
    h.remote.set_notices(7, &[1, 2]);
    let ctrl = controller(&h, 7);
    ctrl.load().await.unwrap();

    assert_eq!(
        h.log(),
        [
            "create nibe:1 title 1: description 1",
            "create nibe:2 title 2: description 2",
        ]
    );
    h.clear_log();

    h.remote.set_notices(7, &[2, 3]);
    h.scheduler.tick().await;

    assert_eq!(
        h.log(),
        ["dismiss nibe:1", "create nibe:3 title 3: description 3"]
    );
    let ids: Vec<i64> = ctrl.notices().iter().map(|n| n.id).collect();
    assert_eq!(ids, vec![2, 3]);
    ctrl.unload().await;
}

#[tokio::test]
async fn failed_notification_poll_keeps_snapshot() {
    let h = Harness::new();
    h.remote.set_notices(7, &[1]);
    let ctrl = controller(&h, 7);
    ctrl.load().await.unwrap();
    h.clear_log();

    h.remote.fail_polls.store(true, Ordering::SeqCst);
    assert!(ctrl.poll_notifications().await.is_err());
    assert!(h.log().is_empty());
    assert_eq!(ctrl.notices().len(), 1);

    // Next tick recovers independently.
    h.remote.fail_polls.store(false, Ordering::SeqCst);
    h.remote.set_notices(7, &[]);
    h.scheduler.tick().await;
    assert_eq!(h.log(), ["dismiss nibe:1"]);
    ctrl.unload().await;
}

// ── Statuses ────────────────────────────────────────────────────────

#[tokio::test]
async fn every_status_poll_publishes_both_signals() {
    let h = Harness::new();
    h.remote.set_status(
        7,
        vec![
            group("Compressor", vec![parameter(43416, 1523)]),
            group("Hot water", vec![parameter(40013, 48)]),
        ],
    );
    let ctrl = controller(&h, 7);
    let mut statuses = h.services.bus.subscribe(Topic::StatusesUpdated);
    let mut parameters = h.services.bus.subscribe(Topic::ParametersUpdated);

    ctrl.poll_statuses().await.unwrap();
    ctrl.poll_statuses().await.unwrap();

    let first = statuses.recv().await.unwrap();
    let second = statuses.recv().await.unwrap();
    assert_eq!(first, second);
    match first {
        Signal::StatusesUpdated {
            system_id,
            statuses,
        } => {
            assert_eq!(system_id, 7);
            assert_eq!(statuses.len(), 2);
        }
        other @ Signal::ParametersUpdated { .. } => panic!("unexpected signal {other:?}"),
    }

    let first = parameters.recv().await.unwrap();
    let second = parameters.recv().await.unwrap();
    assert_eq!(first, second);
    match first {
        Signal::ParametersUpdated { parameters, .. } => {
            assert_eq!(parameters[&43416].raw_value, 1523);
            assert_eq!(parameters[&40013].raw_value, 48);
        }
        other @ Signal::StatusesUpdated { .. } => panic!("unexpected signal {other:?}"),
    }
}

#[tokio::test]
async fn poll_after_cancellation_is_discarded() {
    let h = Harness::new();
    let ctrl = controller(&h, 7);
    ctrl.load().await.unwrap();

    let gate = Arc::new(Notify::new());
    *h.remote.status_gate.lock().unwrap() = Some(Arc::clone(&gate));
    h.remote.set_status(7, vec![group("Defrosting", vec![])]);
    let mut signals = h.services.bus.subscribe(Topic::StatusesUpdated);

    let in_flight = {
        let ctrl = ctrl.clone();
        tokio::spawn(async move { ctrl.poll_statuses().await })
    };
    tokio::task::yield_now().await;

    ctrl.unload().await;
    gate.notify_one();
    in_flight.await.unwrap().unwrap();

    assert!(ctrl.statuses().is_empty());
    assert!(signals.try_recv().is_err());
}

#[tokio::test]
async fn notification_poll_after_cancellation_is_discarded() {
    let h = Harness::new();
    h.remote.set_notices(7, &[1]);
    let ctrl = controller(&h, 7);
    ctrl.load().await.unwrap();
    h.clear_log();

    let gate = Arc::new(Notify::new());
    *h.remote.notice_gate.lock().unwrap() = Some(Arc::clone(&gate));
    h.remote.set_notices(7, &[2]);

    let in_flight = {
        let ctrl = ctrl.clone();
        tokio::spawn(async move { ctrl.poll_notifications().await })
    };
    tokio::task::yield_now().await;

    ctrl.unload().await;
    gate.notify_one();
    in_flight.await.unwrap().unwrap();

    assert!(h.log().is_empty());
    let ids: Vec<i64> = ctrl.notices().iter().map(|n| n.id).collect();
    assert_eq!(ids, vec![1]);
}

// ── Real scheduler ──────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn periodic_poll_survives_failures() {
    let h = Harness::new();
    let scheduler = Arc::new(TokioScheduler::new());
    let services = HostServices {
        scheduler: scheduler.clone(),
        ..h.services.clone()
    };
    let ctrl = SystemController::new(7, Arc::clone(&h.remote), services, INTERVAL);
    ctrl.load().await.unwrap();
    assert_eq!(scheduler.active(), 2);

    h.remote.fail_polls.store(true, Ordering::SeqCst);
    tokio::time::sleep(INTERVAL + Duration::from_secs(1)).await;
    assert!(ctrl.notices().is_empty());

    h.remote.fail_polls.store(false, Ordering::SeqCst);
    h.remote.set_notices(7, &[5]);
    tokio::time::sleep(INTERVAL).await;
    assert_eq!(ctrl.notices().len(), 1);
    assert_eq!(h.log(), ["create nibe:5 title 5: description 5"]);

    ctrl.unload().await;
    assert_eq!(scheduler.active(), 0);
}
