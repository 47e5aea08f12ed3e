// Layer 1: Standard library imports
use std::fmt::{self, Display};
use std::sync::Arc;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use super::kernel::Value;
use super::proc_def::Closure;
use crate::actor::handle::ActorRef;
use crate::stream::iter::StreamIter;
use crate::stream::obj::StreamObj;

/// Opaque native objects visible to kernel code.
///
/// Objects are compared by identity, never structurally. Actor references
/// are the only object kind that is Complete (and may therefore cross actor
/// boundaries inside messages); streams, iterators, and actor cfgs are local
/// to the computation that created them.
#[derive(Clone)]
pub enum Obj {
    /// A reference to an actor.
    Actor(ActorRef),
    /// A lazy stream fed by a publisher.
    Stream(StreamObj),
    /// An iterator over a stream.
    Iter(StreamIter),
    /// An actor configuration awaiting `spawn`.
    Cfg(ActorCfg),
}

impl Obj {
    /// Identity comparison.
    pub fn same_identity(&self, other: &Obj) -> bool {
        match (self, other) {
            (Obj::Actor(a), Obj::Actor(b)) => a.address() == b.address(),
            (Obj::Stream(a), Obj::Stream(b)) => a.same_identity(b),
            (Obj::Iter(a), Obj::Iter(b)) => a.same_identity(b),
            (Obj::Cfg(a), Obj::Cfg(b)) => a.same_identity(b),
            _ => false,
        }
    }
}

impl Display for Obj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Obj::Actor(a) => write!(f, "<actor:{}>", a.address()),
            Obj::Stream(_) => write!(f, "<stream>"),
            Obj::Iter(_) => write!(f, "<iter>"),
            Obj::Cfg(cfg) => write!(f, "{cfg}"),
        }
    }
}

/// Handler installed by a native actor configuration.
///
/// A native handler answers requests directly in host code instead of running
/// kernel instructions. Each value returned from [`on_request`] becomes one
/// response envelope addressed to the requester — a stream publisher answers
/// a single request with several batches followed by an `Eof` record.
///
/// Returning `Err` is equivalent to an uncaught kernel throw: the actor halts
/// with a failed value built from the error.
///
/// [`on_request`]: NativeActorHandler::on_request
pub trait NativeActorHandler: Send + Sync {
    /// Handle a request; each returned value is sent as one response.
    fn on_request(&self, message: &Value) -> Result<Vec<Value>, Value>;

    /// Handle a notify. The default ignores it.
    fn on_notify(&self, message: &Value) -> Result<(), Value> {
        let _ = message;
        Ok(())
    }

    /// Name used in the actor's diagnostics.
    fn name(&self) -> &str {
        "native"
    }
}

/// An actor configuration.
///
/// `spawn` verifies the configuration is effectively complete (every captured
/// cell of a kernel constructor transitively bound) before creating the child
/// actor and sending it a `Configure` control message.
///
/// Selecting a feature out of a cfg object is an error.
#[derive(Clone)]
pub struct ActorCfg(pub(crate) Arc<CfgKind>);

pub(crate) enum CfgKind {
    /// Kernel configuration: a handler constructor applied to `args` plus the
    /// handler target at configure time.
    Kernel { ctor: Closure, args: Vec<Value> },
    /// Host configuration: messages dispatch straight to the handler.
    Native { handler: Arc<dyn NativeActorHandler> },
}

impl ActorCfg {
    /// A kernel configuration.
    pub fn kernel(ctor: Closure, args: Vec<Value>) -> Self {
        Self(Arc::new(CfgKind::Kernel { ctor, args }))
    }

    /// A native (host) configuration.
    pub fn native(handler: Arc<dyn NativeActorHandler>) -> Self {
        Self(Arc::new(CfgKind::Native { handler }))
    }

    /// Identity comparison.
    pub fn same_identity(&self, other: &ActorCfg) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Display for ActorCfg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            CfgKind::Kernel { ctor, .. } => {
                write!(f, "<actor-cfg/{}>", ctor.def.params.len())
            }
            CfgKind::Native { handler } => write!(f, "<actor-cfg:{}>", handler.name()),
        }
    }
}

impl fmt::Debug for ActorCfg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}
