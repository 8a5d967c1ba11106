// Shared fakes for heatlink-core integration tests: a scripted remote,
// a connector that logs open/close, a recording host, a scheduler that
// only ticks when told to and a capture of tracing output.

#![allow(dead_code, clippy::unwrap_used)]

use std::collections::{HashMap, HashSet};
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::join_all;
use heatlink_api::{AccessData, AccessDataWriter, SessionConfig};
use secrecy::SecretString;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;
use url::Url;

use heatlink_core::{
    AccessPointConfig, Connector, DeviceInfo, DeviceRegistry, EntryId, EntryStore, EventBus,
    HostError, HostServices, Notice, NotificationSurface, Parameter, ParameterId, Platform,
    PlatformForwarder, PollFn, ReleaseError, RemoteApi, RemoteFetchError, RemoteSystem,
    Scheduler, StatusIconGroup, SystemConfig, SystemId, TaskHandle,
};

pub type Log = Arc<Mutex<Vec<String>>>;

pub fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

fn record(log: &Log, line: impl Into<String>) {
    log.lock().unwrap().push(line.into());
}

// ── Builders ────────────────────────────────────────────────────────

pub fn notice(id: i64) -> Notice {
    Notice {
        id,
        title: format!("title {id}"),
        description: format!("description {id}"),
    }
}

pub fn parameter(id: ParameterId, raw: i64) -> Parameter {
    Parameter {
        parameter_id: id,
        name: String::new(),
        title: format!("parameter {id}"),
        designation: String::new(),
        unit: String::new(),
        display_value: raw.to_string(),
        raw_value: raw,
    }
}

pub fn group(title: &str, parameters: Vec<Parameter>) -> StatusIconGroup {
    StatusIconGroup {
        title: title.to_owned(),
        parameters,
    }
}

pub fn access_point_config(systems: &[SystemId]) -> AccessPointConfig {
    let mut config = AccessPointConfig::new(
        "client",
        SecretString::from("secret".to_string()),
        Url::parse("https://example.invalid/callback").unwrap(),
    );
    config.poll_interval = Duration::from_secs(60);
    config.systems = systems.iter().map(|&id| (id, SystemConfig::default())).collect();
    config
}

pub fn access_data(token: &str) -> AccessData {
    AccessData {
        access_token: token.into(),
        refresh_token: Some("refresh".into()),
        expires_at: None,
        scope: Some("READSYSTEM".into()),
        token_type: "bearer".into(),
    }
}

// ── FakeRemote ──────────────────────────────────────────────────────

/// Scripted remote: per-system notices and status groups, plus switches
/// to fail or stall calls.
#[derive(Default)]
pub struct FakeRemote {
    pub unknown_systems: Mutex<HashSet<SystemId>>,
    pub notices: Mutex<HashMap<SystemId, Vec<Notice>>>,
    pub status: Mutex<HashMap<SystemId, Vec<StatusIconGroup>>>,
    pub fail_polls: AtomicBool,
    /// When set, `get_status` waits for a notification before answering.
    pub status_gate: Mutex<Option<Arc<Notify>>>,
    /// Same for `get_notifications`.
    pub notice_gate: Mutex<Option<Arc<Notify>>>,
    pub writes: Mutex<Vec<(SystemId, ParameterId, String)>>,
}

impl FakeRemote {
    pub fn set_notices(&self, system_id: SystemId, ids: &[i64]) {
        let notices = ids.iter().map(|&id| notice(id)).collect();
        self.notices.lock().unwrap().insert(system_id, notices);
    }

    pub fn set_status(&self, system_id: SystemId, groups: Vec<StatusIconGroup>) {
        self.status.lock().unwrap().insert(system_id, groups);
    }

    pub fn fail_system(&self, system_id: SystemId) {
        self.unknown_systems.lock().unwrap().insert(system_id);
    }

    fn poll_error(&self) -> Option<RemoteFetchError> {
        self.fail_polls
            .load(Ordering::SeqCst)
            .then(|| RemoteFetchError::Unreachable {
                reason: "connection reset".into(),
            })
    }
}

impl RemoteApi for FakeRemote {
    async fn get_system(&self, system_id: SystemId) -> Result<RemoteSystem, RemoteFetchError> {
        if self.unknown_systems.lock().unwrap().contains(&system_id) {
            return Err(RemoteFetchError::Remote {
                status: 404,
                message: format!("no system {system_id}"),
            });
        }
        Ok(RemoteSystem {
            system_id,
            name: format!("System {system_id}"),
            product_name: Some("F1255".into()),
        })
    }

    async fn get_status(
        &self,
        system_id: SystemId,
    ) -> Result<Vec<StatusIconGroup>, RemoteFetchError> {
        let gate = self.status_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if let Some(e) = self.poll_error() {
            return Err(e);
        }
        Ok(self
            .status
            .lock()
            .unwrap()
            .get(&system_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_notifications(&self, system_id: SystemId) -> Result<Vec<Notice>, RemoteFetchError> {
        let gate = self.notice_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if let Some(e) = self.poll_error() {
            return Err(e);
        }
        Ok(self
            .notices
            .lock()
            .unwrap()
            .get(&system_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn put_parameter(
        &self,
        system_id: SystemId,
        parameter_id: ParameterId,
        value: &str,
    ) -> Result<(), RemoteFetchError> {
        self.writes
            .lock()
            .unwrap()
            .push((system_id, parameter_id, value.to_owned()));
        Ok(())
    }
}

// ── FakeConnector ───────────────────────────────────────────────────

pub struct FakeSession;

/// Logs every open and close into the shared log.
pub struct FakeConnector {
    pub log: Log,
    pub remote: Arc<FakeRemote>,
    pub fail_session: AtomicBool,
    pub fail_client: AtomicBool,
    pub fail_close_client: AtomicBool,
    pub scopes: Mutex<Vec<String>>,
    pub writer: Mutex<Option<AccessDataWriter>>,
}

impl FakeConnector {
    pub fn new(log: &Log, remote: &Arc<FakeRemote>) -> Self {
        Self {
            log: Arc::clone(log),
            remote: Arc::clone(remote),
            fail_session: AtomicBool::new(false),
            fail_client: AtomicBool::new(false),
            fail_close_client: AtomicBool::new(false),
            scopes: Mutex::default(),
            writer: Mutex::default(),
        }
    }

    /// The access-data writer handed to the most recent session.
    pub fn writer(&self) -> AccessDataWriter {
        self.writer.lock().unwrap().clone().expect("session opened")
    }
}

impl Connector for FakeConnector {
    type Session = FakeSession;
    type Client = FakeRemote;

    async fn open_session(
        &self,
        config: SessionConfig,
    ) -> Result<Arc<FakeSession>, RemoteFetchError> {
        record(&self.log, "open session");
        if self.fail_session.load(Ordering::SeqCst) {
            return Err(RemoteFetchError::NotAuthorized);
        }
        *self.scopes.lock().unwrap() = config.scope.iter().map(ToString::to_string).collect();
        *self.writer.lock().unwrap() = config.access_data_write;
        Ok(Arc::new(FakeSession))
    }

    async fn open_client(
        &self,
        _session: &Arc<FakeSession>,
    ) -> Result<Arc<FakeRemote>, RemoteFetchError> {
        record(&self.log, "open client");
        if self.fail_client.load(Ordering::SeqCst) {
            return Err(RemoteFetchError::Unreachable {
                reason: "refused".into(),
            });
        }
        Ok(Arc::clone(&self.remote))
    }

    async fn close_client(&self, _client: &FakeRemote) -> Result<(), ReleaseError> {
        record(&self.log, "close client");
        if self.fail_close_client.load(Ordering::SeqCst) {
            return Err(ReleaseError::new("client", "socket already gone"));
        }
        Ok(())
    }

    async fn close_session(&self, _session: &FakeSession) -> Result<(), ReleaseError> {
        record(&self.log, "close session");
        Ok(())
    }
}

// ── RecordingHost ───────────────────────────────────────────────────

/// Device registry, notification surface, platform forwarder and entry
/// store in one, logging every call.
pub struct RecordingHost {
    pub log: Log,
    pub fail_platform: Mutex<Option<Platform>>,
    pub store_changes: AtomicBool,
    pub stored: Mutex<Vec<(EntryId, AccessData)>>,
    pub devices: Mutex<Vec<DeviceInfo>>,
}

impl RecordingHost {
    pub fn new(log: &Log) -> Self {
        Self {
            log: Arc::clone(log),
            fail_platform: Mutex::new(None),
            store_changes: AtomicBool::new(true),
            stored: Mutex::default(),
            devices: Mutex::default(),
        }
    }
}

impl DeviceRegistry for RecordingHost {
    fn register_device(&self, _entry_id: &EntryId, device: &DeviceInfo) -> Result<(), HostError> {
        record(&self.log, format!("register {}", device.name));
        self.devices.lock().unwrap().push(device.clone());
        Ok(())
    }
}

impl NotificationSurface for RecordingHost {
    fn create_notice(&self, message: &str, title: &str, key: &str) {
        record(&self.log, format!("create {key} {title}: {message}"));
    }

    fn dismiss_notice(&self, key: &str) {
        record(&self.log, format!("dismiss {key}"));
    }
}

impl PlatformForwarder for RecordingHost {
    fn setup_platform(&self, _entry_id: &EntryId, platform: Platform) -> Result<(), HostError> {
        record(&self.log, format!("setup {platform}"));
        if *self.fail_platform.lock().unwrap() == Some(platform) {
            return Err(HostError::new(format!("{platform} unavailable")));
        }
        Ok(())
    }

    fn unload_platform(&self, _entry_id: &EntryId, platform: Platform) -> Result<(), HostError> {
        record(&self.log, format!("unload {platform}"));
        Ok(())
    }
}

impl EntryStore for RecordingHost {
    fn update_access_data(&self, entry_id: &EntryId, data: &AccessData) -> bool {
        self.stored
            .lock()
            .unwrap()
            .push((entry_id.clone(), data.clone()));
        self.store_changes.load(Ordering::SeqCst)
    }
}

// ── ManualScheduler ─────────────────────────────────────────────────

struct Scheduled {
    period: Duration,
    task: PollFn,
    cancel: CancellationToken,
}

/// Records scheduled tasks; they only run when the test calls `tick`.
#[derive(Default)]
pub struct ManualScheduler {
    tasks: Mutex<Vec<Scheduled>>,
}

impl ManualScheduler {
    /// Tasks ever scheduled.
    pub fn scheduled(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }

    /// Tasks scheduled and not cancelled.
    pub fn active(&self) -> usize {
        self.tasks
            .lock()
            .unwrap()
            .iter()
            .filter(|t| !t.cancel.is_cancelled())
            .count()
    }

    pub fn periods(&self) -> Vec<Duration> {
        self.tasks.lock().unwrap().iter().map(|t| t.period).collect()
    }

    /// Run one tick of every live task.
    pub async fn tick(&self) {
        let live: Vec<PollFn> = self
            .tasks
            .lock()
            .unwrap()
            .iter()
            .filter(|t| !t.cancel.is_cancelled())
            .map(|t| Arc::clone(&t.task))
            .collect();
        join_all(live.iter().map(|task| task())).await;
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, period: Duration, task: PollFn) -> TaskHandle {
        let cancel = CancellationToken::new();
        self.tasks.lock().unwrap().push(Scheduled {
            period,
            task,
            cancel: cancel.clone(),
        });
        TaskHandle::new(cancel, None)
    }
}

// ── Harness ─────────────────────────────────────────────────────────

pub struct Harness {
    pub log: Log,
    pub remote: Arc<FakeRemote>,
    pub connector: Arc<FakeConnector>,
    pub host: Arc<RecordingHost>,
    pub scheduler: Arc<ManualScheduler>,
    pub services: HostServices,
}

impl Harness {
    pub fn new() -> Self {
        let log = Log::default();
        let remote = Arc::new(FakeRemote::default());
        let connector = Arc::new(FakeConnector::new(&log, &remote));
        let host = Arc::new(RecordingHost::new(&log));
        let scheduler = Arc::new(ManualScheduler::default());
        let services = HostServices {
            devices: host.clone(),
            notices: host.clone(),
            platforms: host.clone(),
            entries: host.clone(),
            scheduler: scheduler.clone(),
            bus: Arc::new(EventBus::new()),
        };
        Self {
            log,
            remote,
            connector,
            host,
            scheduler,
            services,
        }
    }

    pub fn log(&self) -> Vec<String> {
        entries(&self.log)
    }

    pub fn clear_log(&self) {
        self.log.lock().unwrap().clear();
    }
}

// ── LogCapture ──────────────────────────────────────────────────────

/// Collects formatted tracing output while its guard is held.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Route debug-level events of the current thread into the capture.
    pub fn install(&self) -> DefaultGuard {
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(self.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.0.lock().unwrap())
            .lines()
            .map(str::to_owned)
            .collect()
    }

    /// Lines carrying `message` and the field `system_id={system_id}`.
    pub fn count_for_system(&self, message: &str, system_id: SystemId) -> usize {
        let field = format!("system_id={system_id}");
        self.lines()
            .iter()
            .filter(|line| line.contains(message))
            .filter(|line| line.split_whitespace().any(|word| word == field))
            .count()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
