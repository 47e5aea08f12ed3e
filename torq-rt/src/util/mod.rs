//! Utilities shared across the runtime.
//!
//! # Components
//!
//! - [`ActorId`] - Globally unique actor identifier
//! - [`MessageId`] - Globally unique message identifier (client correlation)
//! - [`ActorAddress`] - Hierarchical actor address for routing and diagnostics

pub mod ids;

pub use ids::{ActorAddress, ActorId, MessageId};
