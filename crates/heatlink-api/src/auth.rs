use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// OAuth scopes understood by the Uplink API.
///
/// Read-only integrations request [`ReadSystem`](Self::ReadSystem); write
/// access adds [`WriteSystem`](Self::WriteSystem).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize)]
pub enum Scope {
    #[strum(serialize = "READSYSTEM")]
    #[serde(rename = "READSYSTEM")]
    ReadSystem,
    #[strum(serialize = "WRITESYSTEM")]
    #[serde(rename = "WRITESYSTEM")]
    WriteSystem,
}

impl Scope {
    /// Scopes to request for the given write-access flag.
    pub fn for_write_access(write_access: bool) -> Vec<Self> {
        if write_access {
            vec![Self::ReadSystem, Self::WriteSystem]
        } else {
            vec![Self::ReadSystem]
        }
    }

    /// Space-separated scope string as sent to the token endpoint.
    pub fn join(scopes: &[Self]) -> String {
        scopes
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Persistable OAuth token state.
///
/// Handed to the [`AccessDataWriter`] every time the session obtains new
/// tokens, so the host can store them and pass them back on the next start.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessData {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub scope: Option<String>,
    #[serde(default = "default_token_type")]
    pub token_type: String,
}

fn default_token_type() -> String {
    "bearer".into()
}

impl AccessData {
    /// Whether the access token is expired or expires within `skew`.
    pub fn expires_within(&self, skew: Duration) -> bool {
        self.expires_at
            .is_some_and(|expires_at| {
                expires_at
                    .checked_sub_signed(skew)
                    .is_none_or(|refresh_at| refresh_at <= Utc::now())
            })
    }
}

impl fmt::Debug for AccessData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessData")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .field("scope", &self.scope)
            .field("token_type", &self.token_type)
            .finish()
    }
}

/// Callback invoked whenever the session refreshes its access data.
pub type AccessDataWriter = Arc<dyn Fn(&AccessData) + Send + Sync>;
