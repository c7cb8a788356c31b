//! Broadcast event payloads

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Kind of live event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A new alert entered the ledger
    AlertCreated,
    /// An alert was acknowledged or resolved
    AlertUpdated,
    /// A telemetry reading crossed a threshold
    SensorUpdate,
}

/// Typed payload pushed to observers, serialized as `{"type": ..., "data": ...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub data: Value,
}

impl BroadcastEvent {
    pub fn new(kind: EventKind, data: Value) -> Self {
        Self { kind, data }
    }

    /// Build an event from any serializable payload
    pub fn from_payload<T: Serialize>(
        kind: EventKind,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(kind, serde_json::to_value(payload)?))
    }

    /// Wire form sent to observers
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wire_format() {
        let event = BroadcastEvent::new(EventKind::SensorUpdate, json!({"wetland_id": 3}));
        let text = event.to_json().unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "sensor_update");
        assert_eq!(value["data"]["wetland_id"], 3);
    }
}
