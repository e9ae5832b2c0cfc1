//! Generic actor framework for resource management.
//!
//! The in-process cart and order authorities are built from these pieces.
//!
//! # Main Components
//!
//! - [`ActorEntity`] - Trait that resource types implement to be managed by actors
//! - [`ResourceActor`] - Generic actor that owns a collection of entities
//! - [`ResourceClient`] - Type-safe handle for sending requests to the actor
//! - [`FrameworkError`] - Common error types
//!
//! # Testing
//!
//! See [`mock`] for a scripted client that answers without spawning an actor.

pub mod core;
pub mod mock;

pub use core::*;
