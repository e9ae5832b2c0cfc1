use crate::model::{ItemId, RestaurantRef};
use crate::remote::RemoteError;
use thiserror::Error;

/// Result of a failed Cart State Manager operation. The optimistic change,
/// if any, has already been rolled back when the caller sees this.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CartError {
    #[error("Not signed in")]
    Unauthenticated,

    #[error("Validation failed: {0}")]
    Validation(String),

    /// Carries the restaurant that owns the cart, so the UI can offer to
    /// reset and retry.
    ///
    /// When the live cart already holds another restaurant the add is refused
    /// before any remote call, and `current` is that local bucket. A stale
    /// local view that another session has since changed is reported as is;
    /// `fetch` first to ask about the server's cart. When the local cart has
    /// no conflict, a 409 from the server yields `current` from its body.
    #[error("Different restaurant: cart already holds items from {current}")]
    DifferentRestaurant { current: RestaurantRef },

    #[error("Item not in cart: {0}")]
    ItemNotInCart(ItemId),

    #[error("Remote failure: {0}")]
    Remote(RemoteError),

    #[error("Cart actor closed")]
    ActorClosed,
}

impl CartError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, CartError::DifferentRestaurant { .. })
    }
}

impl From<RemoteError> for CartError {
    fn from(e: RemoteError) -> Self {
        match e {
            RemoteError::Conflict(current) => CartError::DifferentRestaurant { current },
            RemoteError::Unauthenticated => CartError::Unauthenticated,
            other => CartError::Remote(other),
        }
    }
}
