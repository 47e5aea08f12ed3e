// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use super::interp::Step;
use crate::actor::handle::ActorRef;
use crate::store::var::VarRef;
use crate::stream::obj::StreamObj;
use crate::util::ActorAddress;
use crate::value::{ActorCfg, Closure, Value};

/// The effect seam between the interpreter and its hosting actor.
///
/// Every instruction effect that leaves the store — answering the active
/// request, creating children, sending messages, resolving modules — goes
/// through this trait. The hosting actor implements it; interpreter unit
/// tests substitute a stub, following the dependency-injection pattern used
/// throughout the runtime.
///
/// Implementations must be re-invocation safe only to the extent the
/// interpreter promises: an instruction calls these methods after all of its
/// operands resolved to Complete values, so a suspended-and-re-run
/// instruction reaches its effect exactly once.
pub(crate) trait ActorOps {
    /// This actor's address.
    fn address(&self) -> &ActorAddress;

    /// Answer the active request with a Complete (or wrapped failed) value.
    fn reply(&mut self, value: Value) -> Step<()>;

    /// Create a child actor from a verified-complete configuration and
    /// return its actor-reference value.
    fn spawn_child(&mut self, cfg: &ActorCfg) -> Step<Value>;

    /// Run a zero-param closure as a child computation; the child's final
    /// `respond` binds `target` through the response pipeline.
    fn spawn_act(&mut self, closure: &Arc<Closure>, target: &VarRef) -> Step<()>;

    /// Send a notify.
    fn notify(&mut self, to: &ActorRef, message: Value) -> Step<()>;

    /// Send a request whose response will bind `reply_to`.
    fn request(&mut self, to: &ActorRef, message: Value, reply_to: VarRef) -> Step<()>;

    /// Issue (or re-issue) a stream publisher request.
    fn stream_request(&mut self, to: &ActorRef, message: Value, stream: StreamObj) -> Step<()>;

    /// Resolve a module qualifier to its record.
    fn module_at(&mut self, qualifier: &str) -> Step<Value>;
}
