// Wire types for the Uplink REST API.
//
// Field names follow the API's camelCase JSON. Only the fields the
// integration consumes are modelled; everything else is ignored.

use serde::{Deserialize, Deserializer, Serialize};

/// A heat-pump system as returned by `GET systems/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct System {
    pub system_id: u32,
    pub name: String,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub security_level: Option<String>,
    #[serde(default)]
    pub connection_status: Option<String>,
    #[serde(default)]
    pub has_alarmed: bool,
}

/// A single live reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    pub parameter_id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub designation: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub display_value: String,
    #[serde(deserialize_with = "int_or_string")]
    pub raw_value: i64,
}

/// A category of parameters, e.g. "Compressor" or "Hot water".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusIcon {
    pub title: String,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
}

/// An active notification (alarm or information notice).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub notification_id: i64,
    pub info: NotificationInfo,
    #[serde(default)]
    pub severity: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationInfo {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
}

/// Paged list envelope used by collection endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Page<T> {
    #[serde(default = "Vec::new")]
    pub objects: Vec<T>,
}

/// `rawValue` is a number on most firmware but a string on some.
fn int_or_string<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Int(v) => Ok(v),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}
