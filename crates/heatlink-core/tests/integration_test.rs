#![allow(clippy::unwrap_used)]
// Entry-point behavior: setup/unload bookkeeping, reload suppression and
// parameter switches.

mod common;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use pretty_assertions::assert_eq;

use common::{Harness, access_data, access_point_config, group, parameter};
use heatlink_core::{
    AcquisitionError, EntryError, EntryId, Integration, Signal, SystemConfig, UpdateOutcome,
};

fn integration(h: &Harness) -> Integration<common::FakeConnector> {
    Integration::new(Arc::clone(&h.connector), h.services.clone())
}

fn opened_sessions(h: &Harness) -> usize {
    h.log().iter().filter(|l| *l == "open session").count()
}

// ── Setup / unload ──────────────────────────────────────────────────

#[tokio::test]
async fn setup_and_unload_entry() {
    let h = Harness::new();
    let integration = integration(&h);
    let home = EntryId::from("home");

    integration
        .setup_entry(home.clone(), &access_point_config(&[1, 2]))
        .await
        .unwrap();
    assert!(integration.is_loaded(&home));
    assert_eq!(integration.controllers(&home).len(), 2);
    assert_eq!(integration.entry_ids(), vec![home.clone()]);

    integration.unload_entry(&home).await.unwrap();
    assert!(!integration.is_loaded(&home));
    assert_eq!(h.scheduler.active(), 0);
    assert_eq!(h.log().last().map(String::as_str), Some("close session"));

    assert!(matches!(
        integration.unload_entry(&home).await,
        Err(EntryError::NotLoaded { .. })
    ));
}

#[tokio::test]
async fn second_setup_of_same_entry_is_rejected() {
    let h = Harness::new();
    let integration = integration(&h);
    let home = EntryId::from("home");
    let config = access_point_config(&[1]);

    integration.setup_entry(home.clone(), &config).await.unwrap();
    let again = integration.setup_entry(home.clone(), &config).await;

    assert!(matches!(
        again,
        Err(EntryError::Setup(AcquisitionError::AlreadyLoaded { .. }))
    ));
    assert_eq!(opened_sessions(&h), 1);
    integration.unload_all().await;
}

#[tokio::test]
async fn failed_setup_leaves_no_entry() {
    let h = Harness::new();
    h.remote.fail_system(2);
    let integration = integration(&h);
    let home = EntryId::from("home");

    let result = integration
        .setup_entry(home.clone(), &access_point_config(&[1, 2, 3]))
        .await;

    assert!(matches!(
        result,
        Err(EntryError::Setup(AcquisitionError::SystemLoad { system_id: 2, .. }))
    ));
    assert!(!integration.is_loaded(&home));
    assert!(integration.gate(&home).is_none());
    assert_eq!(h.scheduler.active(), 0);
}

#[tokio::test]
async fn entries_are_isolated() {
    let h = Harness::new();
    let integration = integration(&h);
    let (home, cabin) = (EntryId::from("home"), EntryId::from("cabin"));

    integration
        .setup_entry(home.clone(), &access_point_config(&[1]))
        .await
        .unwrap();
    integration
        .setup_entry(cabin.clone(), &access_point_config(&[2]))
        .await
        .unwrap();

    integration.unload_entry(&home).await.unwrap();
    assert!(integration.is_loaded(&cabin));
    assert_eq!(h.scheduler.active(), 2);
    integration.unload_all().await;
    assert!(integration.entry_ids().is_empty());
}

// ── Reload suppression ──────────────────────────────────────────────

#[tokio::test]
async fn token_write_back_suppresses_exactly_one_reload() {
    let h = Harness::new();
    let integration = integration(&h);
    let home = EntryId::from("home");
    let config = access_point_config(&[1]);
    integration.setup_entry(home.clone(), &config).await.unwrap();

    // The session refreshed its tokens; the host stored them.
    (h.connector.writer())(&access_data("fresh"));
    assert_eq!(h.host.stored.lock().unwrap().len(), 1);
    assert_eq!(integration.gate(&home).unwrap().pending(), 1);

    let outcome = integration.handle_entry_updated(&home, &config).await.unwrap();
    assert_eq!(outcome, UpdateOutcome::Suppressed);
    assert_eq!(opened_sessions(&h), 1);

    // A later, external change reloads.
    let outcome = integration.handle_entry_updated(&home, &config).await.unwrap();
    assert_eq!(outcome, UpdateOutcome::Reloaded);
    assert_eq!(opened_sessions(&h), 2);
    assert!(integration.is_loaded(&home));
    integration.unload_all().await;
}

#[tokio::test]
async fn unchanged_write_back_does_not_suppress() {
    let h = Harness::new();
    h.host.store_changes.store(false, Ordering::SeqCst);
    let integration = integration(&h);
    let home = EntryId::from("home");
    let config = access_point_config(&[1]);
    integration.setup_entry(home.clone(), &config).await.unwrap();

    (h.connector.writer())(&access_data("same"));
    assert_eq!(integration.gate(&home).unwrap().pending(), 0);

    let outcome = integration.handle_entry_updated(&home, &config).await.unwrap();
    assert_eq!(outcome, UpdateOutcome::Reloaded);
    integration.unload_all().await;
}

// ── Switches ────────────────────────────────────────────────────────

async fn settle() {
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn switch_follows_parameter_updates_and_writes() {
    let h = Harness::new();
    let integration = integration(&h);
    let home = EntryId::from("home");
    let mut config = access_point_config(&[1]);
    config.systems.insert(
        1,
        SystemConfig {
            switches: vec![47371],
            ..SystemConfig::default()
        },
    );
    h.remote.set_status(1, vec![group("Hot water", vec![parameter(47371, 1)])]);

    integration.setup_entry(home.clone(), &config).await.unwrap();
    let switches = integration.switches(&home);
    assert_eq!(switches.len(), 1);
    let switch = &switches[0];
    assert_eq!(switch.is_on(), None);

    h.scheduler.tick().await;
    settle().await;
    assert_eq!(switch.is_on(), Some(true));

    h.remote.set_status(1, vec![group("Hot water", vec![parameter(47371, 0)])]);
    h.scheduler.tick().await;
    settle().await;
    assert_eq!(switch.is_on(), Some(false));

    switch.turn_on().await.unwrap();
    switch.turn_off().await.unwrap();
    assert_eq!(
        *h.remote.writes.lock().unwrap(),
        vec![(1, 47371, "1".to_owned()), (1, 47371, "0".to_owned())]
    );

    integration.unload_all().await;
}

#[tokio::test]
async fn unloaded_entry_detaches_its_switches() {
    let h = Harness::new();
    let integration = integration(&h);
    let home = EntryId::from("home");
    let mut config = access_point_config(&[1]);
    config.systems.insert(
        1,
        SystemConfig {
            switches: vec![47371],
            ..SystemConfig::default()
        },
    );
    h.remote.set_status(1, vec![group("Hot water", vec![parameter(47371, 1)])]);

    integration.setup_entry(home.clone(), &config).await.unwrap();
    let switch = Arc::clone(&integration.switches(&home)[0]);
    h.scheduler.tick().await;
    settle().await;
    assert_eq!(switch.is_on(), Some(true));

    integration.unload_entry(&home).await.unwrap();
    settle().await;
    assert!(!switch.is_attached());

    // Updates published after the unload no longer reach the switch.
    h.services.bus.publish(Signal::ParametersUpdated {
        system_id: 1,
        parameters: Arc::new(HashMap::from([(47371, parameter(47371, 0))])),
    });
    settle().await;
    assert_eq!(switch.is_on(), Some(true));
}
