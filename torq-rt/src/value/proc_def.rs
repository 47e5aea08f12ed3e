// Layer 1: Standard library imports
use std::fmt::{self, Display};
use std::sync::Arc;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use crate::machine::instr::ProcDef;
use crate::store::env::Ident;
use crate::store::var::VarRef;

/// A kernel closure: a procedure definition plus the variables captured for
/// its free identifiers at creation time.
///
/// Root-environment names (the intrinsics) resolve through the environment
/// chain at call time and are not captured.
#[derive(Clone)]
pub struct Closure {
    /// The procedure definition (params, free identifiers, body).
    pub def: Arc<ProcDef>,
    /// Captured cells, one per free identifier, in `def.free` order.
    pub captured: Vec<(Ident, VarRef)>,
}

/// Runtime intrinsics callable from kernel code.
///
/// Intrinsics live in the process-wide root environment (`act`, `import`,
/// `respond`, `self`, `spawn`) or in the built-in `system` module
/// (`Stream.new`, `Iter.new`). They are a closed set; dispatch is a match,
/// not a registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeProc {
    /// Spawn a child computation from a zero-param closure.
    Act,
    /// Bind module selections into the caller's scope.
    Import,
    /// Answer the active request.
    Respond,
    /// The actor's own reference (unimplemented in this runtime).
    SelfRef,
    /// Spawn a child actor from an actor cfg.
    Spawn,
    /// Construct a stream over a publisher.
    StreamNew,
    /// Construct an iterator over a stream.
    IterNew,
    /// Construct an actor cfg from a handler constructor.
    CfgNew,
}

impl NativeProc {
    /// The kernel-visible name.
    pub fn name(&self) -> &'static str {
        match self {
            NativeProc::Act => "act",
            NativeProc::Import => "import",
            NativeProc::Respond => "respond",
            NativeProc::SelfRef => "self",
            NativeProc::Spawn => "spawn",
            NativeProc::StreamNew => "Stream.new",
            NativeProc::IterNew => "Iter.new",
            NativeProc::CfgNew => "ActorCfg.new",
        }
    }

    /// Expected argument count.
    pub fn arity(&self) -> usize {
        match self {
            NativeProc::Act => 2,
            NativeProc::Import => 2,
            NativeProc::Respond => 1,
            NativeProc::SelfRef => 1,
            NativeProc::Spawn => 2,
            NativeProc::StreamNew => 3,
            NativeProc::IterNew => 2,
            NativeProc::CfgNew => 2,
        }
    }
}

/// A procedure value.
#[derive(Clone)]
pub enum Proc {
    /// A kernel closure.
    Kernel(Arc<Closure>),
    /// A runtime intrinsic.
    Native(NativeProc),
}

impl Proc {
    /// Wrap a closure.
    pub fn kernel(closure: Closure) -> Self {
        Proc::Kernel(Arc::new(closure))
    }

    /// Identity comparison: closures by allocation, intrinsics by kind.
    pub fn same_identity(&self, other: &Proc) -> bool {
        match (self, other) {
            (Proc::Kernel(a), Proc::Kernel(b)) => Arc::ptr_eq(a, b),
            (Proc::Native(a), Proc::Native(b)) => a == b,
            _ => false,
        }
    }
}

impl Display for Proc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Proc::Kernel(c) => write!(f, "<proc/{}>", c.def.params.len()),
            Proc::Native(n) => write!(f, "<native:{}>", n.name()),
        }
    }
}
