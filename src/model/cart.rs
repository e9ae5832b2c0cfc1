//! Cart data as exchanged with the Remote Cart Authority.
//!
//! A [`CartBucket`] groups items by restaurant; at most one bucket is active
//! per identity. [`CartItem`] prices are derived from `unit_price` and
//! `quantity` and are never authoritative on their own.
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Reference to a catalog item. The cart does not own the catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub String);

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RestaurantId(pub String);

impl From<&str> for RestaurantId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl Display for RestaurantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// How a restaurant serves its orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    Delivery,
    Pickup,
    Both,
}

impl ServiceType {
    /// Whether an order of `order_type` can be served by this restaurant.
    pub fn supports(self, order_type: crate::model::OrderType) -> bool {
        use crate::model::OrderType;
        matches!(
            (self, order_type),
            (ServiceType::Both, _)
                | (ServiceType::Delivery, OrderType::Delivery)
                | (ServiceType::Pickup, OrderType::Pickup)
        )
    }
}

/// Identifies the restaurant that currently owns the cart.
///
/// Carried by the "different restaurant" conflict so the caller can tell the
/// user which cart would be discarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantRef {
    pub restaurant_id: RestaurantId,
    pub restaurant_name: String,
}

impl Display for RestaurantRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.restaurant_name, self.restaurant_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub item_id: ItemId,
    pub name: String,
    pub quantity: u32,
    /// Display unit, e.g. "g" or "pcs".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity_label: Option<String>,
    /// Amount of `quantity_label` in one unit, e.g. 250 (grams).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity_value: Option<f64>,
    pub unit_price: f64,
    pub total_price: f64,
    #[serde(default)]
    pub photos: Vec<String>,
    #[serde(default)]
    pub food_type: String,
}

impl CartItem {
    /// Creates an item with `total_price` derived from `unit_price`.
    pub fn new(
        item_id: impl Into<String>,
        name: impl Into<String>,
        quantity: u32,
        unit_price: f64,
    ) -> Self {
        Self {
            item_id: ItemId(item_id.into()),
            name: name.into(),
            quantity,
            quantity_label: None,
            quantity_value: None,
            unit_price,
            total_price: unit_price * f64::from(quantity),
            photos: Vec::new(),
            food_type: String::new(),
        }
    }

    /// Sets the quantity and recomputes the line total.
    pub fn set_quantity(&mut self, quantity: u32) {
        self.quantity = quantity;
        self.total_price = self.unit_price * f64::from(quantity);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartBucket {
    pub restaurant_id: RestaurantId,
    pub restaurant_name: String,
    pub service_type: ServiceType,
    pub items: Vec<CartItem>,
}

impl CartBucket {
    pub fn restaurant(&self) -> RestaurantRef {
        RestaurantRef {
            restaurant_id: self.restaurant_id.clone(),
            restaurant_name: self.restaurant_name.clone(),
        }
    }

    /// Sum of quantities, saturating at `u32::MAX`.
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0u32, |count, item| count.saturating_add(item.quantity))
    }

    pub fn total_amount(&self) -> f64 {
        self.items.iter().map(|item| item.total_price).sum()
    }
}

/// Payload for `POST /cart`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCart {
    pub restaurant_id: RestaurantId,
    pub restaurant_name: String,
    pub service_type: ServiceType,
    pub items: Vec<CartItem>,
    /// Set once the user confirmed discarding a cart from another restaurant.
    #[serde(rename = "replaceExisting", default, skip_serializing_if = "std::ops::Not::not")]
    pub reset: bool,
}

impl AddToCart {
    pub fn new(
        restaurant_id: impl Into<String>,
        restaurant_name: impl Into<String>,
        service_type: ServiceType,
        items: Vec<CartItem>,
    ) -> Self {
        Self {
            restaurant_id: RestaurantId(restaurant_id.into()),
            restaurant_name: restaurant_name.into(),
            service_type,
            items,
            reset: false,
        }
    }

    /// Marks the request as confirmed to replace a cart from another restaurant.
    pub fn with_reset(mut self) -> Self {
        self.reset = true;
        self
    }

    pub fn restaurant(&self) -> RestaurantRef {
        RestaurantRef {
            restaurant_id: self.restaurant_id.clone(),
            restaurant_name: self.restaurant_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OrderType;

    #[test]
    fn set_quantity_recomputes_line_total() {
        let mut item = CartItem::new("I1", "Paneer Tikka", 1, 50.0);
        item.set_quantity(3);
        assert_eq!(item.total_price, 150.0);
    }

    #[test]
    fn add_request_serializes_reset_only_when_set() {
        let request = AddToCart::new("R1", "Spice Hub", ServiceType::Both, vec![]);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["restaurantId"], "R1");
        assert!(json.get("replaceExisting").is_none());

        let json = serde_json::to_value(request.with_reset()).unwrap();
        assert_eq!(json["replaceExisting"], true);
    }

    #[test]
    fn service_type_gates_order_type() {
        assert!(ServiceType::Both.supports(OrderType::Pickup));
        assert!(ServiceType::Delivery.supports(OrderType::Delivery));
        assert!(!ServiceType::Delivery.supports(OrderType::Pickup));
        assert!(!ServiceType::Pickup.supports(OrderType::Delivery));
    }
}
