// OAuth session for the Uplink API
//
// Owns the HTTP client and the current token state. The API client borrows
// the session for every request via `bearer()`, which transparently runs the
// refresh-token grant when the access token is about to expire.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, trace};
use url::Url;

use crate::auth::{AccessData, AccessDataWriter, Scope};
use crate::error::{Error, preview};
use crate::transport::TransportConfig;

/// Tokens expiring within this window are refreshed before use.
const EXPIRY_SKEW_SECS: i64 = 30;

/// Everything needed to open a session.
pub struct SessionConfig {
    pub client_id: String,
    pub client_secret: SecretString,
    pub redirect_uri: Url,
    /// Tokens persisted by a previous run, if any.
    pub access_data: Option<AccessData>,
    /// Invoked with the new tokens after every successful token request.
    pub access_data_write: Option<AccessDataWriter>,
    pub scope: Vec<Scope>,
    pub transport: TransportConfig,
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("client_id", &self.client_id)
            .field("redirect_uri", &self.redirect_uri.as_str())
            .field("access_data", &self.access_data)
            .field("scope", &self.scope)
            .field("transport", &self.transport)
            .finish_non_exhaustive()
    }
}

/// Raw token endpoint response.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    token_type: Option<String>,
}

/// An authenticated connection to the Uplink service.
///
/// Shared read-only (behind an `Arc`) by the API client and everything
/// built on top of it. Token state is the only interior mutability.
pub struct UplinkSession {
    http: reqwest::Client,
    base_url: Url,
    client_id: String,
    client_secret: SecretString,
    redirect_uri: Url,
    scope: Vec<Scope>,
    access_data: RwLock<Option<AccessData>>,
    /// Serializes token requests so concurrent callers refresh once.
    refresh_lock: Mutex<()>,
    writer: Option<AccessDataWriter>,
    closed: AtomicBool,
}

impl UplinkSession {
    /// Open a session. Does no network I/O -- tokens are validated lazily.
    pub fn open(config: SessionConfig) -> Result<Self, Error> {
        let http = config.transport.build_client()?;
        debug!(
            client_id = %config.client_id,
            scope = %Scope::join(&config.scope),
            authorized = config.access_data.is_some(),
            "opening uplink session"
        );
        Ok(Self {
            http,
            base_url: config.transport.base_url,
            client_id: config.client_id,
            client_secret: config.client_secret,
            redirect_uri: config.redirect_uri,
            scope: config.scope,
            access_data: RwLock::new(config.access_data),
            refresh_lock: Mutex::new(()),
            writer: config.access_data_write,
            closed: AtomicBool::new(false),
        })
    }

    /// The underlying HTTP client.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Root URL of the Uplink service.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Scopes this session was opened with.
    pub fn scope(&self) -> &[Scope] {
        &self.scope
    }

    /// Current token state (cloned).
    pub async fn access_data(&self) -> Option<AccessData> {
        self.access_data.read().await.clone()
    }

    /// Whether a refresh token is available.
    pub async fn can_refresh(&self) -> bool {
        self.access_data
            .read()
            .await
            .as_ref()
            .is_some_and(|d| d.refresh_token.is_some())
    }

    // ── Authorization-code flow ──────────────────────────────────────

    /// URL the user must visit to grant access. `state` is echoed back
    /// to the redirect URI.
    pub fn authorize_url(&self, state: &str) -> Result<Url, Error> {
        let mut url = self.base_url.join("oauth/authorize")?;
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("scope", &Scope::join(&self.scope))
            .append_pair("redirect_uri", self.redirect_uri.as_str())
            .append_pair("state", state);
        Ok(url)
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(&self, code: &str) -> Result<AccessData, Error> {
        let _guard = self.refresh_lock.lock().await;
        let scope = Scope::join(&self.scope);
        self.token_request(&[
            ("grant_type", "authorization_code"),
            ("client_id", &self.client_id),
            ("client_secret", self.client_secret.expose_secret()),
            ("code", code),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("scope", &scope),
        ])
        .await
    }

    /// Run the refresh-token grant.
    pub async fn refresh(&self) -> Result<AccessData, Error> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> Result<AccessData, Error> {
        let refresh_token = self
            .access_data
            .read()
            .await
            .as_ref()
            .ok_or(Error::NotAuthorized)?
            .refresh_token
            .clone()
            .ok_or(Error::MissingRefreshToken)?;

        debug!("refreshing uplink access token");
        self.token_request(&[
            ("grant_type", "refresh_token"),
            ("client_id", &self.client_id),
            ("client_secret", self.client_secret.expose_secret()),
            ("refresh_token", &refresh_token),
        ])
        .await
    }

    /// A valid access token, refreshed first if it is about to expire.
    pub async fn bearer(&self) -> Result<String, Error> {
        self.ensure_open()?;

        {
            let guard = self.access_data.read().await;
            let data = guard.as_ref().ok_or(Error::NotAuthorized)?;
            if !data.expires_within(Duration::seconds(EXPIRY_SKEW_SECS)) {
                return Ok(data.access_token.clone());
            }
        }

        let _guard = self.refresh_lock.lock().await;
        // Another caller may have refreshed while we waited for the lock.
        if let Some(data) = self.access_data.read().await.as_ref() {
            if !data.expires_within(Duration::seconds(EXPIRY_SKEW_SECS)) {
                return Ok(data.access_token.clone());
            }
        }
        Ok(self.refresh_locked().await?.access_token)
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Close the session. Idempotent.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("uplink session closed");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn ensure_open(&self) -> Result<(), Error> {
        if self.is_closed() {
            Err(Error::SessionClosed)
        } else {
            Ok(())
        }
    }

    // ── Token endpoint ───────────────────────────────────────────────

    /// POST to the token endpoint, store the result, notify the writer.
    /// Caller must hold `refresh_lock`.
    async fn token_request(&self, form: &[(&str, &str)]) -> Result<AccessData, Error> {
        self.ensure_open()?;
        let url = self.base_url.join("oauth/token")?;
        trace!("POST {}", url);

        let resp = self.http.post(url).form(form).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Authentication {
                message: format!("token request failed (HTTP {status}): {}", preview(&body)),
            });
        }

        let body = resp.text().await?;
        let token: TokenResponse =
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: format!("invalid token response: {e}"),
                body: body.clone(),
            })?;

        let expires_at = token
            .expires_in
            .map(|secs| {
                Duration::try_seconds(secs)
                    .and_then(|lifetime| Utc::now().checked_add_signed(lifetime))
                    .ok_or_else(|| Error::Deserialization {
                        message: format!("token lifetime out of range: {secs}s"),
                        body: body.clone(),
                    })
            })
            .transpose()?;

        let mut guard = self.access_data.write().await;
        // Providers may omit the refresh token on refresh; keep the old one.
        let refresh_token = token
            .refresh_token
            .or_else(|| guard.as_ref().and_then(|d| d.refresh_token.clone()));
        let data = AccessData {
            access_token: token.access_token,
            refresh_token,
            expires_at,
            scope: token.scope,
            token_type: token.token_type.unwrap_or_else(|| "bearer".into()),
        };
        *guard = Some(data.clone());
        drop(guard);

        debug!(expires_at = ?data.expires_at, "stored new uplink access data");
        if let Some(writer) = &self.writer {
            writer(&data);
        }
        Ok(data)
    }
}

impl fmt::Debug for UplinkSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UplinkSession")
            .field("base_url", &self.base_url.as_str())
            .field("client_id", &self.client_id)
            .field("scope", &self.scope)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
