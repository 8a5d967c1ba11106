//! `heatlink set-parameter`: one-shot write of a system parameter.

use std::collections::BTreeMap;
use std::sync::Arc;

use owo_colors::OwoColorize;
use tokio::sync::mpsc;
use tracing::debug;

use heatlink_api::{AccessData, AccessDataWriter, Uplink, UplinkSession};
use heatlink_config::Config;
use heatlink_core::{EntryStore, RemoteFetchError};

use crate::cli::SetParameterArgs;
use crate::commands::resolve_entry;
use crate::error::CliError;
use crate::host::StateStore;

pub async fn handle(args: SetParameterArgs, config: &Config) -> Result<(), CliError> {
    let (entry_id, access_point) = resolve_entry(config, &args.entry)?;
    if !access_point.write_access {
        return Err(CliError::ReadOnly { entry: args.entry });
    }
    if access_point.access_data.is_none() {
        return Err(CliError::NotAuthorized { entry: args.entry });
    }

    // Tokens refreshed during the write still need to reach disk; nobody
    // listens for the update notification of a one-shot command.
    let (updates, _) = mpsc::unbounded_channel();
    let store = StateStore::new(
        BTreeMap::from([(entry_id.clone(), config.state_file(&args.entry)?)]),
        updates,
    );
    let writer_entry = entry_id.clone();
    let writer: AccessDataWriter = Arc::new(move |data: &AccessData| {
        store.update_access_data(&writer_entry, data);
    });

    let session = Arc::new(UplinkSession::open(access_point.session_config(Some(writer)))?);
    let client = Uplink::new(Arc::clone(&session));

    let result = client
        .put_parameter(args.system, args.parameter, &args.value)
        .await
        .map_err(RemoteFetchError::from);
    client.close();
    session.close();

    match result {
        Ok(()) => {
            debug!(
                entry = %entry_id,
                system = args.system,
                parameter = args.parameter,
                "parameter written"
            );
            println!(
                "{} system {} parameter {} = {}",
                "✓".green().bold(),
                args.system,
                args.parameter,
                args.value
            );
            Ok(())
        }
        Err(RemoteFetchError::NotAuthorized) => Err(CliError::NotAuthorized { entry: args.entry }),
        Err(RemoteFetchError::Remote { status: 404, .. }) => Err(CliError::SystemNotFound {
            system_id: args.system,
        }),
        Err(e) => Err(e.into()),
    }
}
