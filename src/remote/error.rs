//! Error types for calls to the remote authorities.

use crate::model::RestaurantRef;
use thiserror::Error;

/// Errors reported by a [`CartAuthority`](super::CartAuthority) or
/// [`OrderAuthority`](super::OrderAuthority).
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RemoteError {
    /// The identity already has an active cart for another restaurant (409).
    #[error("Cart belongs to a different restaurant: {0}")]
    Conflict(RestaurantRef),

    /// The identity was rejected by the server (401/403).
    #[error("Remote rejected the identity")]
    Unauthenticated,

    /// The addressed cart item or order does not exist (404).
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other non-2xx response.
    #[error("Remote returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// The request never produced a response.
    #[error("Transport error: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        RemoteError::Transport(e.to_string())
    }
}
