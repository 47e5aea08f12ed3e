//! Kernel value universe.
//!
//! A kernel value is one of: booleans, 64-bit integers, 128-bit decimals,
//! strings, characters, the singletons `Nothing` and `Eof`, records, tuples,
//! procedures, opaque native objects, and failed values. A value is
//! *Complete* when it and every transitive component is fully bound and
//! immutable; otherwise it is *Partial*.
//!
//! # Components
//!
//! - [`Lit`] / [`Feature`] - Literals usable as record labels and features
//! - [`Value`] - The closed value sum
//! - [`ValueOrVar`] - A store slot: a value or a dataflow variable
//! - [`Rec`] / [`TupleVal`] - Labeled records and tuples
//! - [`Proc`] / [`Closure`] / [`NativeProc`] - Procedures
//! - [`Obj`] / [`ActorCfg`] - Opaque native objects
//! - [`FailedValue`] - Error values carried across actor boundaries

pub mod failed;
pub mod kernel;
pub mod lit;
pub mod obj;
pub mod proc_def;
pub mod rec;

pub use failed::FailedValue;
pub use kernel::{Value, ValueOrVar};
pub use lit::{Feature, Lit};
pub use obj::{ActorCfg, NativeActorHandler, Obj};
pub use proc_def::{Closure, NativeProc, Proc};
pub use rec::{error_rec, Rec, TupleVal};
