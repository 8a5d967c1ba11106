// Uplink REST client
//
// Thin wrapper over the session's `reqwest::Client`: URL construction,
// bearer-token injection with one refresh-and-retry on 401, and response
// decoding. Endpoint methods return wire models from `crate::models`.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::error::{Error, preview};
use crate::models::{Notification, Page, StatusIcon, System};
use crate::session::UplinkSession;

const API_PREFIX: &str = "api/v1/";
const NOTIFICATIONS_PER_PAGE: &str = "100";

/// Client for the Uplink system endpoints.
///
/// Cheap to clone; all clones share one [`UplinkSession`] and one
/// closed flag.
#[derive(Debug, Clone)]
pub struct Uplink {
    session: Arc<UplinkSession>,
    closed: Arc<AtomicBool>,
}

impl Uplink {
    pub fn new(session: Arc<UplinkSession>) -> Self {
        Self {
            session,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Stop issuing requests through this client. The session stays open.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// The session this client is bound to.
    pub fn session(&self) -> &Arc<UplinkSession> {
        &self.session
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// Fetch the description of one system.
    pub async fn get_system(&self, system_id: u32) -> Result<System, Error> {
        self.get(&format!("systems/{system_id}"), &[]).await
    }

    /// Fetch the status icon groups (live parameters grouped by category).
    pub async fn get_status(&self, system_id: u32) -> Result<Vec<StatusIcon>, Error> {
        self.get(&format!("systems/{system_id}/status/system"), &[])
            .await
    }

    /// Fetch the currently active notifications.
    pub async fn get_notifications(&self, system_id: u32) -> Result<Vec<Notification>, Error> {
        let page: Page<Notification> = self
            .get(
                &format!("systems/{system_id}/notifications"),
                &[("active", "True"), ("itemsPerPage", NOTIFICATIONS_PER_PAGE)],
            )
            .await?;
        Ok(page.objects)
    }

    /// Write a parameter value. Requires the `WRITESYSTEM` scope.
    pub async fn put_parameter(
        &self,
        system_id: u32,
        parameter_id: u32,
        value: &str,
    ) -> Result<(), Error> {
        let settings: HashMap<String, &str> = HashMap::from([(parameter_id.to_string(), value)]);
        let body = json!({ "settings": settings });
        let url = self.api_url(&format!("systems/{system_id}/parameters"))?;
        let resp = self.send(Method::PUT, url, Some(&body)).await?;
        check_status(resp).await.map(|_| ())
    }

    // ── Request helpers ──────────────────────────────────────────────

    fn api_url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.session.base_url().join(API_PREFIX)?.join(path)?)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, Error> {
        let mut url = self.api_url(path)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        let resp = self.send(Method::GET, url, None).await?;
        let body = check_status(resp).await?;
        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&body)),
            body,
        })
    }

    /// Send with the current bearer token; on 401 refresh once and retry.
    async fn send(
        &self,
        method: Method,
        url: Url,
        body: Option<&serde_json::Value>,
    ) -> Result<reqwest::Response, Error> {
        if self.is_closed() {
            return Err(Error::SessionClosed);
        }
        debug!("{method} {url}");
        let token = self.session.bearer().await?;
        let resp = self
            .request(method.clone(), url.clone(), body, &token)
            .send()
            .await?;

        if resp.status() == StatusCode::UNAUTHORIZED && self.session.can_refresh().await {
            debug!("access token rejected, refreshing and retrying once");
            let token = self.session.refresh().await?.access_token;
            return Ok(self.request(method, url, body, &token).send().await?);
        }
        Ok(resp)
    }

    fn request(
        &self,
        method: Method,
        url: Url,
        body: Option<&serde_json::Value>,
        token: &str,
    ) -> reqwest::RequestBuilder {
        let builder = self.session.http().request(method, url).bearer_auth(token);
        match body {
            Some(body) => builder.json(body),
            None => builder,
        }
    }
}

/// Map non-success statuses to errors and return the body text.
async fn check_status(resp: reqwest::Response) -> Result<String, Error> {
    let status = resp.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(Error::Authentication {
            message: "access token rejected".into(),
        });
    }
    let body = resp.text().await?;
    if !status.is_success() {
        return Err(Error::Remote {
            status: status.as_u16(),
            message: preview(&body),
        });
    }
    Ok(body)
}
