//! Lifecycle management, polling and change dispatch for NIBE Uplink systems.
//!
//! This crate sits between `heatlink-api` and a host application:
//!
//! - **[`Integration`]** — Explicit registry of configured access points.
//!   [`setup_entry()`](Integration::setup_entry) acquires everything one
//!   access point needs; [`unload_entry()`](Integration::unload_entry)
//!   releases it again.
//!
//! - **[`LifecycleManager`]** — Acquires session → client → system
//!   controllers → host exposure, recording each step on a
//!   [`LifecycleChain`] so that any failure, and every later unload, tears
//!   down in strict reverse order.
//!
//! - **[`SystemController`]** — Per-system polling: one initial poll at load,
//!   then two periodic tasks (notifications, statuses) that diff against the
//!   last observation and publish on the [`EventBus`].
//!
//! - **Host seams** ([`host`]) — Device registry, notification surface,
//!   platform forwarding, entry storage and a [`Scheduler`], all injected
//!   through [`HostServices`].

pub mod bus;
pub mod config;
pub mod controller;
pub mod convert;
pub mod diff;
pub mod error;
pub mod host;
pub mod integration;
pub mod lifecycle;
pub mod manager;
pub mod model;
pub mod remote;
pub mod scheduler;
pub mod switch;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bus::{EventBus, Signal, Topic};
pub use config::{
    AccessPointConfig, DEFAULT_POLL_INTERVAL, SystemConfig, ThermostatConfig, UnitConfig,
};
pub use controller::{ControllerPhase, PollKind, SystemController};
pub use diff::{Diff, diff_by_id};
pub use error::{AcquisitionError, EntryError, HostError, ReleaseError, RemoteFetchError};
pub use host::{DeviceRegistry, EntryStore, HostServices, NotificationSurface, PlatformForwarder};
pub use integration::{Integration, ReloadGate, UpdateOutcome};
pub use lifecycle::{ChainHandle, LifecycleChain};
pub use manager::{AccessPoint, Acquired, LifecycleManager};
pub use remote::{Connector, RemoteApi, UplinkConnector};
pub use scheduler::{PollFn, Scheduler, TaskHandle, TokioScheduler};
pub use switch::ParameterSwitch;

pub use model::{
    DOMAIN, DeviceInfo, EntryId, MANUFACTURER, Notice, Parameter, ParameterId, Platform,
    RemoteSystem, StatusIconGroup, StatusSnapshot, SystemId, notice_key,
};
