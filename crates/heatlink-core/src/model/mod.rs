// ── Domain model ──
//
// Canonical types shared by the controller, the lifecycle manager and
// the host seams. Wire types from `heatlink-api` are converted into these
// in `crate::convert`.

pub mod device;
pub mod entity_id;
pub mod system;

pub use device::{DOMAIN, DeviceInfo, MANUFACTURER, Platform};
pub use entity_id::{EntryId, ParameterId, SystemId};
pub use system::{
    Notice, Parameter, RemoteSystem, StatusIconGroup, StatusSnapshot, notice_key,
};
