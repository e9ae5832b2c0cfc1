//! Pure data structures shared by the cart, the event bus and the order views.
//!
//! Wire names follow the REST API (camelCase fields, SCREAMING_SNAKE_CASE
//! statuses).

pub mod cart;
pub mod identity;
pub mod order;

pub use cart::*;
pub use identity::*;
pub use order::*;
