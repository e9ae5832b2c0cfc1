//! In-process cart authority: one `ServerCart` entity per user, driven by
//! [`CartCommand`] actions on the generic resource actor.

use crate::cart::{CartError, CartState};
use crate::framework::{ActorEntity, FrameworkError, ResourceActor, ResourceClient};
use crate::model::{AddToCart, CartBucket, Identity, ItemId, RestaurantRef, UserId};
use crate::remote::{CartAuthority, RemoteError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt::Display;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CartId(u32);

impl From<u32> for CartId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl Display for CartId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cart_{}", self.0)
    }
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CartStoreError {
    #[error("Cart belongs to {0}")]
    Conflict(RestaurantRef),

    #[error("Item not in cart: {0}")]
    NotInCart(ItemId),

    #[error("Cart validation error: {0}")]
    Validation(String),
}

impl From<CartError> for CartStoreError {
    fn from(e: CartError) -> Self {
        match e {
            CartError::DifferentRestaurant { current } => CartStoreError::Conflict(current),
            CartError::ItemNotInCart(id) => CartStoreError::NotInCart(id),
            other => CartStoreError::Validation(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub enum CartCommand {
    Fetch,
    Add(AddToCart),
    SetQuantity(ItemId, u32),
    Remove(ItemId),
    Clear,
}

/// The server's copy of one user's cart.
#[derive(Debug, Clone)]
pub struct ServerCart {
    pub id: CartId,
    pub user_id: UserId,
    state: CartState,
}

#[async_trait]
impl ActorEntity for ServerCart {
    type Id = CartId;
    type Create = UserId;
    type Update = Infallible;
    type Action = CartCommand;
    type ActionResult = Vec<CartBucket>;
    type Context = ();
    type Error = CartStoreError;

    fn from_create_params(id: CartId, user_id: UserId) -> Result<Self, CartStoreError> {
        Ok(Self {
            id,
            user_id,
            state: CartState::default(),
        })
    }

    async fn on_update(&mut self, update: Infallible, _ctx: &()) -> Result<(), CartStoreError> {
        match update {}
    }

    async fn handle_action(
        &mut self,
        command: CartCommand,
        _ctx: &(),
    ) -> Result<Vec<CartBucket>, CartStoreError> {
        match command {
            CartCommand::Fetch => {}
            CartCommand::Add(request) => self.state.add(&request)?,
            CartCommand::SetQuantity(item_id, quantity) => {
                if quantity < 1 {
                    return Err(CartStoreError::Validation("quantity must be at least 1".into()));
                }
                self.state.set_quantity(&item_id, quantity)?
            }
            CartCommand::Remove(item_id) => self.state.remove_item(&item_id)?,
            CartCommand::Clear => self.state.clear(),
        }
        Ok(self.state.buckets().to_vec())
    }
}

fn to_remote(e: FrameworkError) -> RemoteError {
    match e.entity_error::<CartStoreError>() {
        Some(CartStoreError::Conflict(current)) => RemoteError::Conflict(current.clone()),
        Some(CartStoreError::NotInCart(id)) => RemoteError::NotFound(id.to_string()),
        Some(CartStoreError::Validation(message)) => RemoteError::Status {
            status: 400,
            message: message.clone(),
        },
        None => match e {
            FrameworkError::NotFound(id) => RemoteError::NotFound(id),
            other => RemoteError::Transport(other.to_string()),
        },
    }
}

#[derive(Clone)]
pub struct InMemoryCartAuthority {
    carts: ResourceClient<ServerCart>,
    by_user: Arc<Mutex<HashMap<UserId, CartId>>>,
}

impl InMemoryCartAuthority {
    /// Creates the authority and the actor that must be spawned with `()`.
    pub fn new(buffer_size: usize) -> (ResourceActor<ServerCart>, Self) {
        let (actor, carts) = ResourceActor::new(buffer_size);
        let authority = Self {
            carts,
            by_user: Arc::new(Mutex::new(HashMap::new())),
        };
        (actor, authority)
    }

    async fn cart_for(&self, identity: &Identity) -> Result<CartId, RemoteError> {
        let mut by_user = self.by_user.lock().await;
        if let Some(id) = by_user.get(&identity.user_id) {
            return Ok(*id);
        }
        let id = self
            .carts
            .create(identity.user_id.clone())
            .await
            .map_err(to_remote)?;
        debug!(%id, user_id = %identity.user_id, "Cart created");
        by_user.insert(identity.user_id.clone(), id);
        Ok(id)
    }

    async fn run(&self, identity: &Identity, command: CartCommand) -> Result<Vec<CartBucket>, RemoteError> {
        let id = self.cart_for(identity).await?;
        self.carts
            .perform_action(id, command)
            .await
            .map_err(to_remote)
    }
}

#[async_trait]
impl CartAuthority for InMemoryCartAuthority {
    async fn fetch(&self, identity: &Identity) -> Result<Vec<CartBucket>, RemoteError> {
        self.run(identity, CartCommand::Fetch).await
    }

    async fn add(&self, identity: &Identity, request: &AddToCart) -> Result<CartBucket, RemoteError> {
        let buckets = self.run(identity, CartCommand::Add(request.clone())).await?;
        buckets
            .into_iter()
            .find(|bucket| bucket.restaurant_id == request.restaurant_id)
            .ok_or_else(|| RemoteError::NotFound(request.restaurant_id.to_string()))
    }

    async fn update_quantity(
        &self,
        identity: &Identity,
        item_id: &ItemId,
        quantity: u32,
    ) -> Result<(), RemoteError> {
        self.run(identity, CartCommand::SetQuantity(item_id.clone(), quantity))
            .await
            .map(|_| ())
    }

    async fn remove(&self, identity: &Identity, item_id: &ItemId) -> Result<(), RemoteError> {
        self.run(identity, CartCommand::Remove(item_id.clone()))
            .await
            .map(|_| ())
    }

    async fn clear(&self, identity: &Identity) -> Result<(), RemoteError> {
        self.run(identity, CartCommand::Clear).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framework::mock::MockClient;
    use crate::model::{CartItem, ServiceType};

    fn start() -> InMemoryCartAuthority {
        let (actor, authority) = InMemoryCartAuthority::new(8);
        tokio::spawn(actor.run(()));
        authority
    }

    fn dosa() -> AddToCart {
        AddToCart::new("R1", "Spice Hub", ServiceType::Both, vec![CartItem::new("I1", "Dosa", 1, 50.0)])
    }

    #[tokio::test]
    async fn carts_are_per_user() {
        let authority = start();
        let u1 = Identity::new("u1", "t");
        let u2 = Identity::new("u2", "t");

        authority.add(&u1, &dosa()).await.unwrap();
        assert_eq!(authority.fetch(&u1).await.unwrap().len(), 1);
        assert!(authority.fetch(&u2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn conflict_reports_current_restaurant() {
        let authority = start();
        let u1 = Identity::new("u1", "t");
        authority.add(&u1, &dosa()).await.unwrap();

        let pizza = AddToCart::new("R2", "Pizza Place", ServiceType::Delivery, vec![CartItem::new("P1", "Margherita", 1, 300.0)]);
        let err = authority.add(&u1, &pizza).await.unwrap_err();
        assert!(matches!(err, RemoteError::Conflict(current) if current.restaurant_id.0 == "R1"));

        let bucket = authority.add(&u1, &pizza.with_reset()).await.unwrap();
        assert_eq!(bucket.restaurant_id.0, "R2");
    }

    #[tokio::test]
    async fn missing_item_is_not_found() {
        let authority = start();
        let u1 = Identity::new("u1", "t");
        let err = authority.remove(&u1, &"I1".into()).await.unwrap_err();
        assert_eq!(err, RemoteError::NotFound("I1".into()));
    }

    #[tokio::test]
    async fn closed_actor_is_a_transport_failure() {
        let mut mock = MockClient::<ServerCart>::new();
        mock.expect_create().return_ok(CartId(1));
        mock.expect_action().return_err(FrameworkError::ActorClosed);
        let authority = InMemoryCartAuthority {
            carts: mock.client(),
            by_user: Arc::new(Mutex::new(HashMap::new())),
        };

        let err = authority.fetch(&Identity::new("u1", "t")).await.unwrap_err();
        assert!(matches!(err, RemoteError::Transport(_)));
        mock.verify();
    }
}
