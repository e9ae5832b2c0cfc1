//! # Storefront Sync
//!
//! > **Client-side cart consistency and real-time order status for a food-ordering storefront.**
//!
//! Several independently mounted surfaces (navigation bar, cart page, checkout,
//! order list, order detail) read and write the same cart and watch the same
//! orders. This crate gives them one optimistic cart per session and one
//! shared event connection, with rollback and merge rules that hold under
//! interleaving.
//!
//! ## 🏗️ Design Philosophy
//!
//! ### One owner per piece of state
//! The live cart is owned by a single actor task ([`cart::CartActor`]); the
//! event connection by another ([`bus::OrderEventHub`]). Surfaces hold cheap
//! cloneable handles and observe changes over `watch` channels. No locks
//! guard either.
//!
//! ### Optimistic, then settled
//! Every cart mutation applies locally first, calls the server, and on
//! failure restores the snapshot taken when *that* mutation was issued. The
//! bookkeeping lives once, in [`cart::optimistic`].
//!
//! ### Events are merged, not trusted blindly
//! Surfaces merge bus events with the same rule: duplicates change nothing,
//! terminal states stay terminal. See [`orders::reconciler`].
//!
//! ## 🗺️ Module Tour
//!
//! ### 1. The Model ([`model`])
//! Wire types: carts, orders, identity. camelCase JSON, SCREAMING_SNAKE_CASE statuses.
//!
//! ### 2. The Boundary ([`remote`], [`bus::EventTransport`])
//! Traits for the cart and order authorities and the push channel, with a
//! `reqwest` client, a `tokio-tungstenite` transport and scripted mocks.
//!
//! ### 3. The Core ([`cart`], [`bus`], [`orders`], [`checkout`])
//! - [`cart::CartClient`] - the Cart State Manager
//! - [`bus::EventBusClient`] - subscribe, publish, reconnect
//! - [`orders::OrderListView`], [`orders::OrderDetailView`], [`orders::NotificationFeed`]
//! - [`checkout::CheckoutCoordinator`] - place and cancel orders
//!
//! ### 4. The Engine ([`framework`], [`local`])
//! The generic `ResourceActor<T>` and the in-process authorities built on it.
//!
//! ### 5. The Orchestrator ([`lifecycle`], [`config`])
//! Picks a backend from the environment, starts a session, shuts it down.
//!
//! ## 🚀 Quick Start
//!
//! ```bash
//! # In-process backend, info logs
//! RUST_LOG=info cargo run
//!
//! # Against a running API
//! STOREFRONT_API_URL=http://localhost:5000/api \
//! STOREFRONT_EVENTS_URL=ws://localhost:5000/events cargo run
//!
//! cargo test
//! ```

pub mod bus;
pub mod cart;
pub mod checkout;
pub mod config;
pub mod framework;
pub mod lifecycle;
pub mod local;
pub mod model;
pub mod orders;
pub mod remote;
