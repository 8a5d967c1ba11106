// heatlink-api: Async Rust client for the NIBE Uplink cloud API (OAuth + REST)

pub mod auth;
pub mod client;
pub mod error;
pub mod models;
pub mod session;
pub mod transport;

pub use auth::{AccessData, AccessDataWriter, Scope};
pub use client::Uplink;
pub use error::Error;
pub use models::{Notification, NotificationInfo, Parameter, StatusIcon, System};
pub use session::{SessionConfig, UplinkSession};
pub use transport::{DEFAULT_API_URL, TransportConfig};
