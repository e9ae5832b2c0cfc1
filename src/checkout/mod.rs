//! Checkout / order-placement coordinator.

pub mod coordinator;
pub mod error;

pub use coordinator::{CheckoutCoordinator, DeliveryAddress};
pub use error::CheckoutError;
