//! Wire format of the order event bus.
//!
//! ```json
//! {"event":"orderStatusUpdate","data":{ ...full order... }}
//! {"event":"newOrder","data":{ ...full order... }}
//! ```

use crate::bus::BusError;
use crate::model::Order;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum BusMessage {
    /// A full order snapshot, sent whenever its status changes.
    #[serde(rename = "orderStatusUpdate")]
    OrderStatusUpdate(Order),
    /// Announced once by the placement coordinator.
    #[serde(rename = "newOrder")]
    NewOrder(Order),
}

impl BusMessage {
    pub fn order(&self) -> &Order {
        match self {
            BusMessage::OrderStatusUpdate(order) | BusMessage::NewOrder(order) => order,
        }
    }

    pub fn event_name(&self) -> &'static str {
        match self {
            BusMessage::OrderStatusUpdate(_) => "orderStatusUpdate",
            BusMessage::NewOrder(_) => "newOrder",
        }
    }

    pub fn encode(&self) -> Result<String, BusError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn decode(frame: &str) -> Result<Self, BusError> {
        Ok(serde_json::from_str(frame)?)
    }
}
