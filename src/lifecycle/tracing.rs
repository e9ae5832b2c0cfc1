//! # Observability & Tracing
//!
//! [`setup_tracing`] installs a compact `tracing-subscriber` formatter
//! filtered by `RUST_LOG`. Module paths are hidden (`with_target(false)`);
//! log lines carry structured fields (`identity`, `order_id`, `surface`,
//! `count`) instead.
//!
//! ```bash
//! # State transitions, rollbacks, connection open/close
//! RUST_LOG=info cargo run
//!
//! # Payloads and per-event dispatch
//! RUST_LOG=debug cargo run
//!
//! # Only the cart actor's optimistic bookkeeping
//! RUST_LOG=storefront_sync::cart=debug cargo run
//! ```
//!
//! With `RUST_LOG=info` a failed quantity change reads:
//!
//! ```text
//! INFO update_quantity{item_id=ItemId("I1") quantity=3}: Optimistic change applied
//! WARN Remote request failed status=503
//! WARN Mutation rolled back id=m2 error=Remote returned status 503: busy count=1
//! ```
//!
//! Rollbacks and failed connections are `warn`; nothing in this crate logs at
//! `error` except a panicked actor task during shutdown.

pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}
