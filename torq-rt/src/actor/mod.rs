//! Actors: lifecycle, dispatch, and parent/child synchronization.
//!
//! An actor is a single-threaded computation — a mailbox, a kernel machine,
//! and the dispatch state that drives it. All actor work runs as one tokio
//! task; a turn is synchronous and bounded by the instruction budget, and
//! the task yields between turns so many actors share the executor fairly.
//!
//! # Components
//!
//! - [`handle::ActorRef`] - The cloneable sending handle
//! - `core` - Actor state, launch, and the interpreter effect seam
//! - `dispatch` - The turn loop, control handling, and the response fixpoint
//! - `sync` - `act` capture translation and `SyncVar` triggers

pub(crate) mod core;
pub(crate) mod dispatch;
pub mod handle;
pub(crate) mod sync;

pub use handle::ActorRef;
