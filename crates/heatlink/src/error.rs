//! CLI error types with miette diagnostics.
//!
//! Maps config, acquisition and remote errors into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use heatlink_config::ConfigError;
use heatlink_core::{AcquisitionError, EntryError, RemoteFetchError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const PERMISSION: i32 = 5;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Configuration ────────────────────────────────────────────────

    #[error("No access points configured")]
    #[diagnostic(
        code(heatlink::no_config),
        help(
            "Add an [access_points.<name>] table with client_id, client_secret\n\
             and redirect_uri.\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Access point '{entry}' not found in configuration")]
    #[diagnostic(
        code(heatlink::unknown_entry),
        help("Configured access points: {available}")
    )]
    UnknownEntry { entry: String, available: String },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(heatlink::validation))]
    Validation { field: String, reason: String },

    #[error(transparent)]
    #[diagnostic(code(heatlink::config))]
    Config(Box<ConfigError>),

    // ── Authorization ────────────────────────────────────────────────

    #[error("Access point '{entry}' is not authorized")]
    #[diagnostic(
        code(heatlink::not_authorized),
        help("Run: heatlink authorize {entry}")
    )]
    NotAuthorized { entry: String },

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(heatlink::auth_failed),
        help(
            "Verify client_id and client_secret, then re-run the authorization flow:\n\
             heatlink authorize <entry>"
        )
    )]
    AuthFailed { message: String },

    #[error("Access point '{entry}' is read-only")]
    #[diagnostic(
        code(heatlink::read_only),
        help(
            "Set write_access = true for [access_points.{entry}] and re-run\n\
             heatlink authorize {entry} to grant the WRITESYSTEM scope."
        )
    )]
    ReadOnly { entry: String },

    // ── Remote ───────────────────────────────────────────────────────

    #[error("System {system_id} not found")]
    #[diagnostic(
        code(heatlink::not_found),
        help("Check the system ids under [access_points.<entry>.systems]")
    )]
    SystemNotFound { system_id: u32 },

    #[error("Could not reach the Uplink service: {reason}")]
    #[diagnostic(code(heatlink::connection_failed))]
    ConnectionFailed { reason: String },

    #[error(transparent)]
    #[diagnostic(code(heatlink::remote))]
    Remote(RemoteFetchError),

    #[error(transparent)]
    #[diagnostic(code(heatlink::setup))]
    Setup(Box<EntryError>),

    // ── Interactive ──────────────────────────────────────────────────

    #[error("Prompt failed: {0}")]
    #[diagnostic(code(heatlink::prompt))]
    Prompt(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NoConfig { .. }
            | Self::UnknownEntry { .. }
            | Self::Validation { .. }
            | Self::Config(_) => exit_code::USAGE,
            Self::NotAuthorized { .. } | Self::AuthFailed { .. } => exit_code::AUTH,
            Self::ReadOnly { .. } => exit_code::PERMISSION,
            Self::SystemNotFound { .. } => exit_code::NOT_FOUND,
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            _ => exit_code::GENERAL,
        }
    }
}

// ── Conversions ──────────────────────────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(Box::new(other)),
        }
    }
}

impl From<RemoteFetchError> for CliError {
    fn from(err: RemoteFetchError) -> Self {
        match err {
            RemoteFetchError::Authentication { message } => Self::AuthFailed { message },
            RemoteFetchError::Unreachable { reason } => Self::ConnectionFailed { reason },
            other => Self::Remote(other),
        }
    }
}

impl From<heatlink_api::Error> for CliError {
    fn from(err: heatlink_api::Error) -> Self {
        RemoteFetchError::from(err).into()
    }
}

impl From<EntryError> for CliError {
    fn from(err: EntryError) -> Self {
        match err {
            EntryError::Setup(
                AcquisitionError::Session(source) | AcquisitionError::Client(source),
            ) => source.into(),
            EntryError::Setup(AcquisitionError::SystemLoad {
                system_id,
                source: RemoteFetchError::Remote { status: 404, .. },
            }) => Self::SystemNotFound { system_id },
            other => Self::Setup(Box::new(other)),
        }
    }
}
