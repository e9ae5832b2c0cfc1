//! Order Event Bus.
//!
//! - [`BusMessage`] - wire messages (`orderStatusUpdate`, `newOrder`)
//! - [`EventTransport`] - opens identity-scoped connections ([`ws::WsTransport`],
//!   or the in-process [`crate::local::LocalEventServer`])
//! - [`OrderEventHub`] - shares one connection across all subscribed surfaces
//!
//! Delivery is in send order per connection. Nothing is replayed: events
//! sent while disconnected are lost.

pub mod error;
pub mod hub;
pub mod message;
pub mod transport;
pub mod ws;

pub use error::BusError;
pub use hub::{EventBusClient, HubStatus, OrderEventHub, Subscription, SurfaceId};
pub use message::BusMessage;
pub use transport::{Connection, EventTransport};
