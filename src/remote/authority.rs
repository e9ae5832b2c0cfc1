use crate::model::{
    AddToCart, CartBucket, Identity, ItemId, Order, OrderId, PlaceOrderRequest, StatusChange,
};
use crate::remote::RemoteError;
use async_trait::async_trait;

/// Server-side source of truth for the identity's active cart.
///
/// Mirrors `GET/POST/DELETE /cart` and `PATCH/DELETE /cart/:itemId`.
#[async_trait]
pub trait CartAuthority: Send + Sync {
    async fn fetch(&self, identity: &Identity) -> Result<Vec<CartBucket>, RemoteError>;

    /// Returns the server's view of the bucket after the add.
    async fn add(&self, identity: &Identity, request: &AddToCart)
        -> Result<CartBucket, RemoteError>;

    async fn update_quantity(
        &self,
        identity: &Identity,
        item_id: &ItemId,
        quantity: u32,
    ) -> Result<(), RemoteError>;

    async fn remove(&self, identity: &Identity, item_id: &ItemId) -> Result<(), RemoteError>;

    async fn clear(&self, identity: &Identity) -> Result<(), RemoteError>;
}

/// Server-side owner of placed orders.
///
/// Mirrors `POST /orders/place-order`, `GET /orders/:id`,
/// `PATCH /orders/:id` and `GET /orders/order-history`.
#[async_trait]
pub trait OrderAuthority: Send + Sync {
    async fn place_order(
        &self,
        identity: &Identity,
        request: &PlaceOrderRequest,
    ) -> Result<Order, RemoteError>;

    async fn get_order(&self, identity: &Identity, id: &OrderId) -> Result<Order, RemoteError>;

    async fn update_status(
        &self,
        identity: &Identity,
        id: &OrderId,
        change: &StatusChange,
    ) -> Result<Order, RemoteError>;

    /// Newest first.
    async fn order_history(&self, identity: &Identity) -> Result<Vec<Order>, RemoteError>;
}
