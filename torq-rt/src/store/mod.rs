//! The dataflow store: single-assignment logic variables and environments.
//!
//! # Components
//!
//! - [`VarRef`] - A single-assignment cell (unbound, linked, or bound)
//! - [`unify`] / [`bind`] - The dataflow unification protocol
//! - [`check_complete`] - Transitive completeness check with barrier reporting
//! - [`Env`] - Immutable lexically-chained identifier bindings
//!
//! # Invariants
//!
//! - A cell transitions from unbound to bound at most once; the payload never
//!   changes identity afterwards (deeper components may still bind later).
//! - Every registered bind-callback fires exactly once, in registration
//!   order, with the newly bound value.
//! - Unbound cells unified with each other share a representative
//!   (union-find) and share callbacks.

pub mod env;
pub mod var;

pub use env::{ident, Env, Ident};
pub use var::{bind, check_complete, unify, BindCallback, Incomplete, UnifyError, VarRef};
