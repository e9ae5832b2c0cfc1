//! Boundary to the server-side authorities.
//!
//! [`CartAuthority`] and [`OrderAuthority`] are the only way the client
//! reaches the server. [`HttpAuthority`] talks REST; [`mock`] holds scripted
//! doubles for tests; the in-process authorities live in [`crate::local`].

pub mod authority;
pub mod error;
pub mod http;
pub mod mock;

pub use authority::{CartAuthority, OrderAuthority};
pub use error::RemoteError;
pub use http::HttpAuthority;
