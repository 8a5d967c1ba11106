use thiserror::Error;

/// Top-level error type for the `heatlink-api` crate.
///
/// Covers every failure mode of the Uplink surface: OAuth, transport,
/// remote status errors, and payload decoding. `heatlink-core` maps these
/// into domain errors so consumers never branch on HTTP details.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Token endpoint or API rejected our credentials.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// No access data yet -- the authorization-code flow has not run.
    #[error("Session is not authorized -- run the authorization flow first")]
    NotAuthorized,

    /// Access token expired and no refresh token is available.
    #[error("Access token expired and no refresh token is available")]
    MissingRefreshToken,

    /// The session was closed; no further requests are allowed.
    #[error("Session closed")]
    SessionClosed,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The HTTP client could not be constructed.
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    // ── Remote ──────────────────────────────────────────────────────
    /// Non-success status from the Uplink API.
    #[error("Uplink API error (HTTP {status}): {message}")]
    Remote { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if re-running the authorization flow might resolve it.
    pub fn is_auth_expired(&self) -> bool {
        matches!(
            self,
            Self::Authentication { .. } | Self::NotAuthorized | Self::MissingRefreshToken
        )
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Remote { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Remote { status: 404, .. } => true,
            _ => false,
        }
    }
}

/// First 200 characters of a response body, for error messages.
pub(crate) fn preview(body: &str) -> String {
    body.chars().take(200).collect()
}
