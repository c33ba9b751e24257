use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// Open JSON object describing the device and network an event came from.
/// Unknown keys written by other clients are kept as-is.
pub type DeviceInfo = Map<String, Value>;

pub const CHECK_OUT_KEY: &str = "checkOut";

/// The per-event snapshot stored at check-in, and under `checkOut` at check-out.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSnapshot {
    pub device_id: Option<String>,
    pub device_name: Option<String>,
    pub method: String,
    pub timestamp: String,
    pub wifi_network: Option<String>,
    pub wifi_verified: Option<bool>,
    pub network_info: Option<Value>,
}

impl DeviceSnapshot {
    pub fn new(method: &str, at: DateTime<Utc>) -> Self {
        Self {
            method: method.to_string(),
            timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            ..Default::default()
        }
    }

    pub fn into_map(self) -> DeviceInfo {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Adds the check-out snapshot next to whatever was captured at check-in.
pub fn with_check_out(existing: &DeviceInfo, snapshot: DeviceSnapshot) -> DeviceInfo {
    let mut merged = existing.clone();
    merged.insert(CHECK_OUT_KEY.to_string(), Value::Object(snapshot.into_map()));
    merged
}

/// Parses a stored blob. Anything that is not a JSON object is kept under `raw`.
pub fn parse_stored(raw: &str) -> DeviceInfo {
    if raw.trim().is_empty() {
        return Map::new();
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        Ok(other) => Map::from_iter([("raw".to_string(), other)]),
        Err(_) => Map::from_iter([("raw".to_string(), Value::String(raw.to_string()))]),
    }
}
