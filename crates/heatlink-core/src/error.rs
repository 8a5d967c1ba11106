// ── Core error types ──
//
// Domain errors for heatlink-core. Consumers never see HTTP status codes
// or JSON parse failures directly: `From<heatlink_api::Error>` translates
// transport-layer errors into `RemoteFetchError` variants.

use thiserror::Error;

use crate::model::{EntryId, Platform, SystemId};

/// A single remote call failed.
///
/// Fatal to a controller while it loads; logged and retried on the next
/// tick while it polls.
#[derive(Debug, Clone, Error)]
pub enum RemoteFetchError {
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    #[error("Access point is not authorized -- run the authorization flow")]
    NotAuthorized,

    #[error("Cannot reach the uplink service: {reason}")]
    Unreachable { reason: String },

    #[error("Uplink returned HTTP {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("Unexpected uplink payload: {message}")]
    Decode { message: String },

    #[error("Uplink session closed")]
    SessionClosed,
}

/// Acquiring one step of an access point's lifecycle chain failed.
///
/// Every step acquired before the failing one has already been released
/// by the time the caller sees this error.
#[derive(Debug, Error)]
pub enum AcquisitionError {
    #[error("Failed to open uplink session: {0}")]
    Session(#[source] RemoteFetchError),

    #[error("Failed to open uplink client: {0}")]
    Client(#[source] RemoteFetchError),

    #[error("Failed to load system {system_id}: {source}")]
    SystemLoad {
        system_id: SystemId,
        source: RemoteFetchError,
    },

    #[error("Failed to register device for system {system_id}: {source}")]
    DeviceRegistration {
        system_id: SystemId,
        source: HostError,
    },

    #[error("Failed to set up {platform} platform: {source}")]
    Platform { platform: Platform, source: HostError },

    #[error("Access point {entry_id} is already set up")]
    AlreadyLoaded { entry_id: EntryId },
}

/// Tearing down one resource failed. Logged during unwind, never raised.
#[derive(Debug, Clone, Error)]
#[error("Failed to release {resource}: {reason}")]
pub struct ReleaseError {
    pub resource: String,
    pub reason: String,
}

impl ReleaseError {
    pub fn new(resource: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self {
            resource: resource.into(),
            reason: reason.to_string(),
        }
    }
}

/// A host seam (device registry, platform forwarder, ...) refused a request.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct HostError {
    pub message: String,
}

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Errors from the entry-point operations.
#[derive(Debug, Error)]
pub enum EntryError {
    #[error("Access point {entry_id} is not set up")]
    NotLoaded { entry_id: EntryId },

    #[error(transparent)]
    Setup(#[from] AcquisitionError),
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<heatlink_api::Error> for RemoteFetchError {
    fn from(err: heatlink_api::Error) -> Self {
        match err {
            heatlink_api::Error::Authentication { message } => Self::Authentication { message },
            heatlink_api::Error::NotAuthorized => Self::NotAuthorized,
            heatlink_api::Error::MissingRefreshToken => Self::Authentication {
                message: "access token expired and no refresh token is stored".into(),
            },
            heatlink_api::Error::SessionClosed => Self::SessionClosed,
            heatlink_api::Error::Transport(ref e) => match e.status() {
                Some(status) => Self::Remote {
                    status: status.as_u16(),
                    message: e.to_string(),
                },
                None => Self::Unreachable {
                    reason: e.to_string(),
                },
            },
            heatlink_api::Error::InvalidUrl(e) => Self::Unreachable {
                reason: format!("invalid URL: {e}"),
            },
            heatlink_api::Error::ClientBuild(reason) => Self::Unreachable { reason },
            heatlink_api::Error::Remote { status, message } => Self::Remote { status, message },
            heatlink_api::Error::Deserialization { message, body: _ } => Self::Decode { message },
        }
    }
}
