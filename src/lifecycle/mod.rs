//! Wiring and shutdown: which backend to talk to, which actors a session
//! runs, and the tracing subscriber.

pub mod session;
pub mod tracing;

pub use self::tracing::setup_tracing;
pub use session::{Backend, LocalBackend, SessionError, StorefrontSession};
