// ── Remote seams ──
//
// `RemoteApi` is what a controller needs from the uplink client;
// `Connector` opens and closes the session and client that make up the
// first two links of an access point's lifecycle chain. Both are
// implemented for the real `heatlink_api` types and faked in tests.

use std::future::Future;
use std::sync::Arc;

use heatlink_api::{SessionConfig, Uplink, UplinkSession};
use tracing::debug;

use crate::error::{ReleaseError, RemoteFetchError};
use crate::model::{Notice, ParameterId, RemoteSystem, StatusIconGroup, SystemId};

/// Remote calls made by a system controller.
pub trait RemoteApi: Send + Sync + 'static {
    fn get_system(
        &self,
        system_id: SystemId,
    ) -> impl Future<Output = Result<RemoteSystem, RemoteFetchError>> + Send;

    fn get_status(
        &self,
        system_id: SystemId,
    ) -> impl Future<Output = Result<Vec<StatusIconGroup>, RemoteFetchError>> + Send;

    fn get_notifications(
        &self,
        system_id: SystemId,
    ) -> impl Future<Output = Result<Vec<Notice>, RemoteFetchError>> + Send;

    fn put_parameter(
        &self,
        system_id: SystemId,
        parameter_id: ParameterId,
        value: &str,
    ) -> impl Future<Output = Result<(), RemoteFetchError>> + Send;
}

impl RemoteApi for Uplink {
    async fn get_system(&self, system_id: SystemId) -> Result<RemoteSystem, RemoteFetchError> {
        Ok(Uplink::get_system(self, system_id).await?.into())
    }

    async fn get_status(
        &self,
        system_id: SystemId,
    ) -> Result<Vec<StatusIconGroup>, RemoteFetchError> {
        let icons = Uplink::get_status(self, system_id).await?;
        Ok(icons.into_iter().map(Into::into).collect())
    }

    async fn get_notifications(&self, system_id: SystemId) -> Result<Vec<Notice>, RemoteFetchError> {
        let notifications = Uplink::get_notifications(self, system_id).await?;
        Ok(notifications.into_iter().map(Into::into).collect())
    }

    async fn put_parameter(
        &self,
        system_id: SystemId,
        parameter_id: ParameterId,
        value: &str,
    ) -> Result<(), RemoteFetchError> {
        Ok(Uplink::put_parameter(self, system_id, parameter_id, value).await?)
    }
}

// ── Connector ───────────────────────────────────────────────────────

/// Opens and closes the session and client of an access point.
pub trait Connector: Send + Sync + 'static {
    type Session: Send + Sync + 'static;
    type Client: RemoteApi;

    fn open_session(
        &self,
        config: SessionConfig,
    ) -> impl Future<Output = Result<Arc<Self::Session>, RemoteFetchError>> + Send;

    fn open_client(
        &self,
        session: &Arc<Self::Session>,
    ) -> impl Future<Output = Result<Arc<Self::Client>, RemoteFetchError>> + Send;

    fn close_client(
        &self,
        client: &Self::Client,
    ) -> impl Future<Output = Result<(), ReleaseError>> + Send;

    fn close_session(
        &self,
        session: &Self::Session,
    ) -> impl Future<Output = Result<(), ReleaseError>> + Send;
}

/// Connector for the real uplink service.
#[derive(Debug, Clone, Copy, Default)]
pub struct UplinkConnector;

impl Connector for UplinkConnector {
    type Session = UplinkSession;
    type Client = Uplink;

    async fn open_session(
        &self,
        config: SessionConfig,
    ) -> Result<Arc<UplinkSession>, RemoteFetchError> {
        let session = UplinkSession::open(config)?;
        debug!(base_url = %session.base_url(), "uplink session opened");
        Ok(Arc::new(session))
    }

    async fn open_client(&self, session: &Arc<UplinkSession>) -> Result<Arc<Uplink>, RemoteFetchError> {
        Ok(Arc::new(Uplink::new(Arc::clone(session))))
    }

    async fn close_client(&self, client: &Uplink) -> Result<(), ReleaseError> {
        client.close();
        Ok(())
    }

    async fn close_session(&self, session: &UplinkSession) -> Result<(), ReleaseError> {
        if session.is_closed() {
            return Err(ReleaseError::new("session", "already closed"));
        }
        session.close();
        Ok(())
    }
}
