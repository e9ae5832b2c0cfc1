//! In-process backend: cart and order authorities on the resource actor,
//! plus a broadcast-based event server. Used by the demo binary and the
//! integration tests in place of the REST and WebSocket endpoints.

pub mod cart_store;
pub mod event_server;
pub mod order_store;

pub use cart_store::{CartCommand, CartId, CartStoreError, InMemoryCartAuthority, ServerCart};
pub use event_server::LocalEventServer;
pub use order_store::{InMemoryOrderAuthority, NewOrder, OrderStoreError};
