// ── API-to-domain type conversions ──
//
// Bridges raw `heatlink_api` response types into `heatlink_core::model`
// domain types. An empty product name is treated as absent.

use heatlink_api::{Notification, StatusIcon, System};

use crate::model::{Notice, RemoteSystem, StatusIconGroup};

impl From<System> for RemoteSystem {
    fn from(s: System) -> Self {
        Self {
            system_id: s.system_id,
            name: s.name,
            product_name: s.product_name.filter(|p| !p.is_empty()),
        }
    }
}

impl From<Notification> for Notice {
    fn from(n: Notification) -> Self {
        Self {
            id: n.notification_id,
            title: n.info.title,
            description: n.info.description,
        }
    }
}

impl From<StatusIcon> for StatusIconGroup {
    fn from(icon: StatusIcon) -> Self {
        Self {
            title: icon.title,
            parameters: icon.parameters,
        }
    }
}
