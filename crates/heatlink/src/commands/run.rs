//! `heatlink run`: set up access points and follow their systems until
//! interrupted.

use std::collections::BTreeMap;
use std::sync::Arc;

use owo_colors::OwoColorize;
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tracing::{info, warn};

use heatlink_config::{Config, load_config};
use heatlink_core::{
    AccessPointConfig, EntryId, EventBus, HostServices, Integration, SystemController, Topic,
    TokioScheduler, UpdateOutcome, UplinkConnector,
};

use crate::cli::{GlobalOpts, RunArgs};
use crate::commands::resolve_entry;
use crate::error::CliError;
use crate::host::{LogDevices, LogPlatforms, StateStore, TerminalNotices};
use crate::output;

pub async fn handle(args: RunArgs, config: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let color = output::should_color(global.color);
    let selected: Vec<String> = if args.entries.is_empty() {
        config.access_points.keys().cloned().collect()
    } else {
        args.entries
    };

    let mut resolved: Vec<(EntryId, AccessPointConfig)> = Vec::with_capacity(selected.len());
    let mut files = BTreeMap::new();
    for entry in &selected {
        let (entry_id, access_point) = resolve_entry(config, entry)?;
        files.insert(entry_id.clone(), config.state_file(entry)?);
        resolved.push((entry_id, access_point));
    }

    let (updates_tx, mut updates) = mpsc::unbounded_channel();
    let store = Arc::new(StateStore::new(files, updates_tx));
    let bus = Arc::new(EventBus::new());
    let services = HostServices {
        devices: Arc::new(LogDevices),
        notices: Arc::new(TerminalNotices::new(color)),
        platforms: Arc::new(LogPlatforms),
        entries: store.clone(),
        scheduler: Arc::new(TokioScheduler::new()),
        bus: Arc::clone(&bus),
    };
    let integration = Integration::new(Arc::new(UplinkConnector), services);

    // Subscribe before the first poll so initial statuses are printed.
    let statuses = bus.stream(Topic::StatusesUpdated);
    let parameters = bus.stream(Topic::ParametersUpdated);
    let signals = statuses.merge(parameters);
    tokio::pin!(signals);

    let mut first_error: Option<CliError> = None;
    for (entry_id, access_point) in &resolved {
        if access_point.access_data.is_none() {
            warn!(entry = %entry_id, "entry has no stored tokens, skipping");
            if first_error.is_none() {
                first_error = Some(CliError::NotAuthorized {
                    entry: entry_id.to_string(),
                });
            }
            continue;
        }
        match integration.setup_entry(entry_id.clone(), access_point).await {
            Ok(()) => {
                let systems = integration
                    .controllers(entry_id)
                    .iter()
                    .map(SystemController::system_id)
                    .collect::<Vec<_>>();
                store.remember_systems(entry_id, systems.iter().copied());
                let line = format!("{entry_id}: following {} system(s)", systems.len());
                if color {
                    println!("{}", line.green());
                } else {
                    println!("{line}");
                }
            }
            Err(e) => {
                warn!(entry = %entry_id, error = %e, "entry setup failed");
                if first_error.is_none() {
                    first_error = Some(e.into());
                }
            }
        }
    }

    if integration.entry_ids().is_empty() {
        return match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        };
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, shutting down");
                break;
            }
            Some(signal) = signals.next() => {
                if let Some(line) = output::render_signal(&signal, color, args.parameters) {
                    println!("{line}");
                }
            }
            Some(entry_id) = updates.recv() => {
                entry_updated(&integration, &entry_id, global).await;
            }
        }
    }

    integration.unload_all().await;
    Ok(())
}

/// Re-resolve the entry and let the integration decide between
/// suppressing and reloading.
async fn entry_updated(
    integration: &Integration<UplinkConnector>,
    entry_id: &EntryId,
    global: &GlobalOpts,
) {
    let resolved = load_config(global.config.as_deref())
        .map_err(CliError::from)
        .and_then(|config| resolve_entry(&config, entry_id.as_str()));
    let access_point = match resolved {
        Ok((_, access_point)) => access_point,
        Err(e) => {
            warn!(entry = %entry_id, error = %e, "cannot re-read configuration");
            return;
        }
    };

    match integration.handle_entry_updated(entry_id, &access_point).await {
        Ok(UpdateOutcome::Suppressed) => {}
        Ok(UpdateOutcome::Reloaded) => info!(entry = %entry_id, "entry reloaded"),
        Err(e) => warn!(entry = %entry_id, error = %e, "entry reload failed"),
    }
}
