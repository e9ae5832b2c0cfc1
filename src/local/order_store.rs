//! In-process order authority built on the generic resource actor.
//!
//! Every status change is pushed to the owner's open connections from the
//! entity's `on_update` hook, which is how the real server behaves.

use crate::bus::BusMessage;
use crate::framework::{ActorEntity, FrameworkError, ResourceActor, ResourceClient};
use crate::local::LocalEventServer;
use crate::model::{Identity, Order, OrderId, OrderStatus, PlaceOrderRequest, StatusChange, UserId};
use crate::remote::{OrderAuthority, RemoteError};
use async_trait::async_trait;
use chrono::Utc;
use std::convert::Infallible;
use thiserror::Error;
use tracing::{info, instrument};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum OrderStoreError {
    #[error("Order validation error: {0}")]
    Validation(String),

    #[error("Order {0} is already {1:?}")]
    Terminal(OrderId, OrderStatus),
}

/// Payload for creating an order server-side.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub request: PlaceOrderRequest,
}

#[async_trait]
impl ActorEntity for Order {
    type Id = OrderId;
    type Create = NewOrder;
    type Update = StatusChange;
    type Action = Infallible;
    type ActionResult = ();
    type Context = LocalEventServer;
    type Error = OrderStoreError;

    fn from_create_params(id: OrderId, params: NewOrder) -> Result<Self, OrderStoreError> {
        let NewOrder { user_id, request } = params;
        if request.items.is_empty() {
            return Err(OrderStoreError::Validation("order has no items".into()));
        }
        let now = Utc::now();
        Ok(Order {
            id,
            user_id,
            items: request.items,
            total_amount: request.total_amount,
            order_type: request.order_type,
            status: OrderStatus::OrderPlaced,
            restaurant_id: request.restaurant_id,
            restaurant_name: request.restaurant_name,
            payment_method: request.payment_method,
            cancelled_by: None,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        })
    }

    async fn on_update(
        &mut self,
        change: StatusChange,
        events: &LocalEventServer,
    ) -> Result<(), OrderStoreError> {
        if self.status.is_terminal() {
            return Err(OrderStoreError::Terminal(self.id.clone(), self.status));
        }
        self.status = change.status;
        self.cancelled_by = change.cancelled_by;
        self.cancel_reason = change.cancel_reason;
        self.updated_at = Utc::now();

        let delivered = events.publish(&self.user_id, &BusMessage::OrderStatusUpdate(self.clone()));
        info!(order_id = %self.id, status = ?self.status, delivered, "Status pushed");
        Ok(())
    }

    async fn handle_action(&mut self, action: Infallible, _events: &LocalEventServer) -> Result<(), OrderStoreError> {
        match action {}
    }
}

fn to_remote(e: FrameworkError) -> RemoteError {
    if let Some(store) = e.entity_error::<OrderStoreError>() {
        return RemoteError::Status {
            status: 400,
            message: store.to_string(),
        };
    }
    match e {
        FrameworkError::NotFound(id) => RemoteError::NotFound(id),
        other => RemoteError::Transport(other.to_string()),
    }
}

#[derive(Clone)]
pub struct InMemoryOrderAuthority {
    orders: ResourceClient<Order>,
}

impl InMemoryOrderAuthority {
    /// Creates the authority and the actor that must be spawned with a
    /// [`LocalEventServer`] as its context.
    pub fn new(buffer_size: usize) -> (ResourceActor<Order>, Self) {
        let (actor, orders) = ResourceActor::new(buffer_size);
        (actor, Self::with_client(orders))
    }

    pub fn with_client(orders: ResourceClient<Order>) -> Self {
        Self { orders }
    }

    /// Restaurant-side status change; not scoped to a customer identity.
    #[instrument(skip(self))]
    pub async fn set_status(&self, id: &OrderId, change: StatusChange) -> Result<Order, RemoteError> {
        self.orders.update(id.clone(), change).await.map_err(to_remote)
    }

    async fn owned(&self, identity: &Identity, id: &OrderId) -> Result<Order, RemoteError> {
        match self.orders.get(id.clone()).await.map_err(to_remote)? {
            Some(order) if order.user_id == identity.user_id => Ok(order),
            _ => Err(RemoteError::NotFound(id.to_string())),
        }
    }
}

#[async_trait]
impl OrderAuthority for InMemoryOrderAuthority {
    async fn place_order(
        &self,
        identity: &Identity,
        request: &PlaceOrderRequest,
    ) -> Result<Order, RemoteError> {
        let id = self
            .orders
            .create(NewOrder {
                user_id: identity.user_id.clone(),
                request: request.clone(),
            })
            .await
            .map_err(to_remote)?;
        self.owned(identity, &id).await
    }

    async fn get_order(&self, identity: &Identity, id: &OrderId) -> Result<Order, RemoteError> {
        self.owned(identity, id).await
    }

    async fn update_status(
        &self,
        identity: &Identity,
        id: &OrderId,
        change: &StatusChange,
    ) -> Result<Order, RemoteError> {
        self.owned(identity, id).await?;
        self.orders
            .update(id.clone(), change.clone())
            .await
            .map_err(to_remote)
    }

    async fn order_history(&self, identity: &Identity) -> Result<Vec<Order>, RemoteError> {
        let mut orders: Vec<Order> = self
            .orders
            .list()
            .await
            .map_err(to_remote)?
            .into_iter()
            .filter(|order| order.user_id == identity.user_id)
            .collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }
}
