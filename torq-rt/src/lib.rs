//! # torq-rt - Torqlang Runtime Core
//!
//! The kernel-language virtual machine (KLVM) and the local actor scheduler
//! that hosts it. The KLVM is a small instruction set over *dataflow
//! variables* — single-assignment logic variables that may be unbound,
//! partially bound, or Complete. Actors drive KLVM instances cooperatively
//! on a shared tokio executor, deliver messages with priority ordering,
//! suspend on unbound variables, and propagate failure as first-class
//! values.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::time::Duration;
//! use torq_rt::machine::{Instr, Operand, Pattern, ProcDef};
//! use torq_rt::system::{ActorBuilder, ActorSystem, RequestClient};
//! use torq_rt::value::{ActorCfg, Lit, Value};
//!
//! #[tokio::main]
//! async fn main() {
//!     let system = ActorSystem::builder().add_default_modules().build();
//!
//!     // A handler constructor binds the handler cell to a one-param proc:
//!     // case $m of 'hello' then respond('Hello, World!') end
//!     let handler = ProcDef::new(
//!         &["$m"],
//!         &[],
//!         Instr::case(
//!             Operand::ident("$m"),
//!             Pattern::Lit(Lit::str("hello")),
//!             Instr::apply(Operand::ident("respond"), vec![Operand::str("Hello, World!")]),
//!             None,
//!         ),
//!     );
//!     let ctor = ProcDef::new(
//!         &["$h"],
//!         &[],
//!         Instr::create_proc(handler, Operand::ident("$h")),
//!     );
//!     // ... build an ActorCfg from the ctor and spawn it:
//!     // let actor = ActorBuilder::new().set_system(system).spawn(cfg)?;
//!     // let reply = RequestClient::new()
//!     //     .send_and_await_response(&actor, Value::str("hello"), Duration::from_secs(5))
//!     //     .await?;
//! }
//! ```
//!
//! # Module Organization
//!
//! ## Core
//! - [`value`] - Tagged kernel values: records, tuples, procedures, objects
//! - [`store`] - Single-assignment variables, unification, environments
//! - [`machine`] - Kernel instructions and the budgeted interpreter
//!
//! ## Messaging
//! - [`message`] - Envelopes, control messages, request ids
//! - [`mailbox`] - Priority-ordered queues with bubble-swap insertion
//!
//! ## Actors
//! - [`actor`] - Lifecycle, dispatch, response fixpoint, parent/child sync
//! - [`stream`] - Lazy streams with publisher fetch and iteration
//!
//! ## Infrastructure
//! - [`system`] - ActorSystem, builders, clients, configuration
//! - [`util`] - Addresses and ids
//!
//! # Execution Model
//!
//! An actor yields the executor at exactly three points: its instruction
//! budget expires (it self-sends `Resume` and is re-enqueued), it suspends
//! on an unbound variable (the barrier), or its stack empties for the turn.
//! Within one sender/receiver pair, delivery order is preserved per priority
//! class; across classes the mailbox's bubble-swap rule may reorder. A
//! response is delivered exactly once per request.
//!
//! # Failure Model
//!
//! An uncaught throw halts the actor; the halt becomes a `FailedValue`
//! carrying the actor address, the error, the current instruction, and an
//! optional chained cause. During a request the failed value answers the
//! requester; afterwards the actor drains further requests with the same
//! failed value and drops notifies. Failed values bind silently into
//! response targets and only halt the actor that *touches* them.

pub mod actor;
pub mod machine;
pub mod mailbox;
pub mod message;
pub mod store;
pub mod stream;
pub mod system;
pub mod util;
pub mod value;

// Re-export commonly used types
pub use actor::ActorRef;
pub use machine::{BinOp, Instr, Operand, Pattern, ProcDef, Span};
pub use mailbox::Mailbox;
pub use message::{ControlMsg, Envelope, RequestId};
pub use store::{Env, VarRef};
pub use system::{
    ActorBuilder, ActorSystem, ActorSystemBuilder, ClientError, RequestClient, StreamClient,
    SystemConfig, SystemError,
};
pub use util::{ActorAddress, ActorId, MessageId};
pub use value::{ActorCfg, FailedValue, Lit, NativeActorHandler, Rec, TupleVal, Value, ValueOrVar};
