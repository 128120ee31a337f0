use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Address, Destination};

/// A payload bound to its resolved address, built just before the push.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEnvelope {
    pub id: Uuid,
    pub destination: Destination,
    pub address: Address,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl NotificationEnvelope {
    pub fn new(destination: Destination, address: Address, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            destination,
            address,
            payload,
            timestamp: Utc::now(),
        }
    }
}

/// "Something changed, re-fetch" signal pushed on the global channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataUpdate {
    pub entity: String,
    /// 0 when the change has no single id
    pub id: i64,
    pub action: String,
    /// Epoch milliseconds at construction
    pub timestamp: i64,
}

impl DataUpdate {
    pub fn new(entity: impl Into<String>, id: Option<i64>, action: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            id: id.unwrap_or(0),
            action: action.into(),
            timestamp: Utc::now().timestamp_millis(),
        }
    }

    pub fn to_payload(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
