//! Represents a placed order as the Remote Order Authority reports it.
//!
//! Orders are created server-side from a cart snapshot and are immutable
//! except for `status` and the cancellation metadata. The client only holds
//! read snapshots and overlays status changes observed on the event bus.
use crate::model::{CartItem, RestaurantId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Type-safe identifier for Orders.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub String);

impl From<u32> for OrderId {
    fn from(id: u32) -> Self {
        Self(format!("order_{id}"))
    }
}

impl From<&str> for OrderId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Delivery,
    Pickup,
}

/// Order lifecycle as observed by the client.
///
/// ```text
/// ORDER_PLACED -> ACCEPTED -> ORDER_READY | ORDER_DELIVERY_READY | ORDER_PICKUP_READY
///              -> OUT_FOR_DELIVERY (delivery only) -> ORDER_DELIVERED | ORDER_PICKED_UP
/// CANCELLED from any non-terminal state
/// ```
///
/// Transitions arrive from the server and are trusted as-is; the only one the
/// client issues itself is the cancel from `ORDER_PLACED`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    OrderPlaced,
    Accepted,
    OrderReady,
    OrderDeliveryReady,
    OrderPickupReady,
    OutForDelivery,
    OrderDelivered,
    OrderPickedUp,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::OrderDelivered | OrderStatus::OrderPickedUp | OrderStatus::Cancelled
        )
    }

    /// The customer may cancel only before the restaurant accepts.
    pub fn is_cancellable_by_customer(self) -> bool {
        self == OrderStatus::OrderPlaced
    }

    /// Short human-readable phrase used in notifications.
    pub fn describe(self) -> &'static str {
        match self {
            OrderStatus::OrderPlaced => "has been placed",
            OrderStatus::Accepted => "was accepted",
            OrderStatus::OrderReady => "is ready",
            OrderStatus::OrderDeliveryReady => "is ready for delivery",
            OrderStatus::OrderPickupReady => "is ready for pickup",
            OrderStatus::OutForDelivery => "is out for delivery",
            OrderStatus::OrderDelivered => "was delivered",
            OrderStatus::OrderPickedUp => "was picked up",
            OrderStatus::Cancelled => "was cancelled",
        }
    }
}

/// Who cancelled an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CancelledBy {
    Customer,
    Restaurant,
    Admin,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    /// Frozen copy of the cart lines at placement time.
    pub items: Vec<CartItem>,
    pub total_amount: f64,
    pub order_type: OrderType,
    pub status: OrderStatus,
    pub restaurant_id: RestaurantId,
    pub restaurant_name: String,
    pub payment_method: PaymentMethod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_by: Option<CancelledBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// True when the order was cancelled by someone other than the customer.
    pub fn is_cancelled_by_counterparty(&self) -> bool {
        self.status == OrderStatus::Cancelled
            && !matches!(self.cancelled_by, Some(CancelledBy::Customer))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Card,
    Upi,
}

/// Identifier of an address saved in the customer's profile.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AddressId(pub String);

/// Address entered during checkout when no saved address is chosen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerAddress {
    pub name: String,
    pub phone: String,
    pub street: String,
    pub city: String,
    pub pincode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub landmark: Option<String>,
}

impl CustomerAddress {
    /// Names of the required fields that are blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("name", &self.name),
            ("phone", &self.phone),
            ("street", &self.street),
            ("city", &self.city),
            ("pincode", &self.pincode),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| field)
        .collect()
    }
}

/// Payload for `POST /orders/place-order`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub items: Vec<CartItem>,
    pub total_amount: f64,
    pub payment_method: PaymentMethod,
    pub order_type: OrderType,
    pub restaurant_id: RestaurantId,
    pub restaurant_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address_id: Option<AddressId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_address_data: Option<CustomerAddress>,
}

/// Payload for `PATCH /orders/:id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub status: OrderStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancelled_by: Option<CancelledBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cancel_reason: Option<String>,
}

impl StatusChange {
    pub fn to(status: OrderStatus) -> Self {
        Self {
            status,
            cancelled_by: None,
            cancel_reason: None,
        }
    }

    pub fn cancel(by: CancelledBy, reason: Option<String>) -> Self {
        Self {
            status: OrderStatus::Cancelled,
            cancelled_by: Some(by),
            cancel_reason: reason,
        }
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// A freshly placed pickup order with one line.
    pub(crate) fn order(id: &str, user: &str) -> Order {
        let now = Utc::now();
        Order {
            id: OrderId::from(id),
            user_id: UserId::from(user),
            items: vec![CartItem::new("I1", "Dosa", 2, 50.0)],
            total_amount: 100.0,
            order_type: OrderType::Pickup,
            status: OrderStatus::OrderPlaced,
            restaurant_id: RestaurantId::from("R1"),
            restaurant_name: "Spice Hub".into(),
            payment_method: PaymentMethod::Cash,
            cancelled_by: None,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn with_status(mut order: Order, status: OrderStatus) -> Order {
        order.status = status;
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_uses_screaming_snake_case_on_the_wire() {
        let json = serde_json::to_string(&OrderStatus::OrderDeliveryReady).unwrap();
        assert_eq!(json, "\"ORDER_DELIVERY_READY\"");
        let parsed: OrderStatus = serde_json::from_str("\"OUT_FOR_DELIVERY\"").unwrap();
        assert_eq!(parsed, OrderStatus::OutForDelivery);
    }

    #[test]
    fn terminal_states() {
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(OrderStatus::OrderDelivered.is_terminal());
        assert!(OrderStatus::OrderPickedUp.is_terminal());
        assert!(!OrderStatus::OutForDelivery.is_terminal());
        assert!(OrderStatus::OrderPlaced.is_cancellable_by_customer());
        assert!(!OrderStatus::Accepted.is_cancellable_by_customer());
    }

    #[test]
    fn missing_address_fields_are_reported_by_name() {
        let address = CustomerAddress {
            name: "Asha".into(),
            phone: " ".into(),
            street: "12 MG Road".into(),
            ..Default::default()
        };
        assert_eq!(address.missing_fields(), vec!["phone", "city", "pincode"]);
    }
}
