//! The kernel-language virtual machine.
//!
//! Kernel code is a small closed instruction set ([`instr::Instr`]) executed
//! by a budgeted interpreter over dataflow variables. Each call to
//! `compute` runs until the computation completes, the instruction budget
//! expires (preemption), progress requires an unbound variable (suspension on
//! a barrier), or an unrecoverable halt occurs.
//!
//! Control-flow signals (`Wait`, `Raise`, `Failure`) are a private result
//! sum propagated with `?`; they never surface as panics or host exceptions.
//! Effects that leave the store — responding, spawning, sending — go through
//! the `ActorOps` seam implemented by the hosting actor.

pub mod instr;
pub(crate) mod interp;
pub(crate) mod intrinsics;
pub(crate) mod ops;

pub use instr::{BinOp, Instr, Operand, Pattern, ProcDef, Span};
pub(crate) use interp::{Flow, HaltDetail, Machine, Step, StepOutcome};
pub(crate) use ops::ActorOps;
