//! Command dispatch: bridges CLI args -> integration operations.

pub mod authorize;
pub mod run;
pub mod set_parameter;

use heatlink_config::{Config, ConfigError, config_path, resolve_access_point};
use heatlink_core::{AccessPointConfig, EntryId};

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a config-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, config: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    if config.access_points.is_empty() {
        return Err(CliError::NoConfig {
            path: global
                .config
                .clone()
                .unwrap_or_else(config_path)
                .display()
                .to_string(),
        });
    }

    match cmd {
        Command::Run(args) => run::handle(args, config, global).await,
        Command::Authorize(args) => authorize::handle(args, config).await,
        Command::SetParameter(args) => set_parameter::handle(args, config).await,
        // Completions are handled before dispatch
        Command::Completions(_) => Ok(()),
    }
}

/// Resolve one configured access point, naming the alternatives when it
/// does not exist.
pub fn resolve_entry(
    config: &Config,
    entry: &str,
) -> Result<(EntryId, AccessPointConfig), CliError> {
    match resolve_access_point(config, entry) {
        Ok(resolved) => Ok((EntryId::from(entry), resolved)),
        Err(ConfigError::UnknownEntry { entry }) => Err(CliError::UnknownEntry {
            entry,
            available: config
                .access_points
                .keys()
                .cloned()
                .collect::<Vec<_>>()
                .join(", "),
        }),
        Err(e) => Err(e.into()),
    }
}

/// Map a dialoguer / interactive I/O failure into CliError.
pub fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Prompt(e.to_string())
}
