use crate::cart::actor::{CartRequest, Reply};
use crate::cart::{CartError, CartState};
use crate::model::{AddToCart, Identity, ItemId, RestaurantRef};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::instrument;

/// The Cart State Manager handle.
///
/// One logical cart exists per session; every surface holds a clone of the
/// same `CartClient` and therefore sees the same optimistic state. Mutations
/// return once the remote call settles, with the local change already
/// committed or rolled back.
#[derive(Clone)]
pub struct CartClient {
    sender: mpsc::Sender<CartRequest>,
    state: watch::Receiver<CartState>,
}

impl CartClient {
    pub(crate) fn new(sender: mpsc::Sender<CartRequest>, state: watch::Receiver<CartState>) -> Self {
        Self { sender, state }
    }

    async fn request(
        &self,
        build: impl FnOnce(Reply) -> CartRequest,
    ) -> Result<(), CartError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(build(respond_to))
            .await
            .map_err(|_| CartError::ActorClosed)?;
        response.await.map_err(|_| CartError::ActorClosed)?
    }

    /// Sets the identity and loads its cart.
    #[instrument(skip(self), fields(identity = %identity))]
    pub async fn sign_in(&self, identity: Identity) -> Result<(), CartError> {
        self.request(|respond_to| CartRequest::SignIn {
            identity,
            respond_to,
        })
        .await
    }

    /// Drops the identity and the local cart. Pending mutations become no-ops.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<(), CartError> {
        self.request(|respond_to| CartRequest::SignOut { respond_to })
            .await
    }

    /// Replaces local state with the authoritative cart.
    #[instrument(skip(self))]
    pub async fn fetch(&self) -> Result<(), CartError> {
        self.request(|respond_to| CartRequest::Fetch { respond_to })
            .await
    }

    /// Adds items, creating or merging into the active bucket.
    ///
    /// Without `request.reset`, items for a restaurant other than the active
    /// bucket's fail with [`CartError::DifferentRestaurant`]; the caller asks
    /// the user and retries with [`AddToCart::with_reset`].
    #[instrument(skip(self, request), fields(restaurant = %request.restaurant_id, reset = request.reset))]
    pub async fn add(&self, request: AddToCart) -> Result<(), CartError> {
        self.request(|respond_to| CartRequest::Add {
            request,
            respond_to,
        })
        .await
    }

    /// Rejects `quantity < 1` without touching state; use [`remove`](Self::remove).
    #[instrument(skip(self))]
    pub async fn update_quantity(&self, item_id: ItemId, quantity: u32) -> Result<(), CartError> {
        self.request(|respond_to| CartRequest::UpdateQuantity {
            item_id,
            quantity,
            respond_to,
        })
        .await
    }

    #[instrument(skip(self))]
    pub async fn remove(&self, item_id: ItemId) -> Result<(), CartError> {
        self.request(|respond_to| CartRequest::Remove {
            item_id,
            respond_to,
        })
        .await
    }

    /// Empties the cart immediately; restored only if the remote call fails.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<(), CartError> {
        self.request(|respond_to| CartRequest::Clear { respond_to })
            .await
    }

    pub fn snapshot(&self) -> CartState {
        self.state.borrow().clone()
    }

    pub fn is_in_cart(&self, item_id: &ItemId) -> bool {
        self.state.borrow().is_in_cart(item_id)
    }

    pub fn total_item_count(&self) -> u32 {
        self.state.borrow().total_item_count()
    }

    pub fn restaurant(&self) -> Option<RestaurantRef> {
        self.state.borrow().restaurant()
    }

    /// Change notifications; each value is the full cart.
    pub fn subscribe(&self) -> watch::Receiver<CartState> {
        self.state.clone()
    }
}
