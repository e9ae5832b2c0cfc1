use crate::model::{OrderId, OrderStatus};
use crate::remote::RemoteError;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum CheckoutError {
    #[error("Not signed in")]
    Unauthenticated,

    #[error("Validation failed: {0}")]
    Validation(String),

    /// Another placement from this session has not settled yet.
    #[error("An order is already being placed")]
    InFlight,

    #[error("Order {id} can no longer be cancelled (status {status:?})")]
    NotCancellable { id: OrderId, status: OrderStatus },

    #[error("Remote failure: {0}")]
    Remote(RemoteError),
}

impl From<RemoteError> for CheckoutError {
    fn from(e: RemoteError) -> Self {
        match e {
            RemoteError::Unauthenticated => CheckoutError::Unauthenticated,
            other => CheckoutError::Remote(other),
        }
    }
}
