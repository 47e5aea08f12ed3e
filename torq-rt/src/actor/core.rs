// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use tracing::{debug, warn};

// Layer 3: Internal module imports
use super::dispatch;
use super::handle::ActorRef;
use super::sync;
use crate::machine::instr::Span;
use crate::machine::{ActorOps, Flow, Machine, Step};
use crate::mailbox::Mailbox;
use crate::message::{ControlMsg, Envelope, RequestId};
use crate::store::var::VarRef;
use crate::stream::obj::StreamObj;
use crate::system::actor_system::SystemShared;
use crate::system::SystemError;
use crate::util::ActorAddress;
use crate::value::{ActorCfg, Closure, FailedValue, NativeActorHandler, Obj, Value};

/// The dispatch state of one actor.
pub(crate) struct ActorBody {
    pub(crate) address: ActorAddress,
    pub(crate) self_ref: ActorRef,
    pub(crate) mailbox: Arc<Mailbox>,
    pub(crate) signal: Arc<Notify>,
    pub(crate) system: Arc<SystemShared>,
    /// The handler cell; bound by `Configure`, applied per message.
    pub(crate) handler: VarRef,
    /// Installed by a native configuration; bypasses the machine.
    pub(crate) native: Option<Arc<dyn NativeActorHandler>>,
    /// The request (or act control) a `respond` answers.
    pub(crate) active_request: Option<Envelope>,
    /// The barrier variable a suspended computation waits on.
    pub(crate) barrier: Option<VarRef>,
    /// Responses to retry together with the next response batch.
    pub(crate) selectable: Vec<Envelope>,
    /// Responses parked after a no-progress fixpoint pass.
    pub(crate) suspended: Vec<Envelope>,
    pub(crate) child_count: u64,
    /// Non-null means halted; never cleared.
    pub(crate) failed: Option<Arc<FailedValue>>,
    pub(crate) configured: bool,
    /// Act children stop when their computation completes.
    pub(crate) one_shot: bool,
    pub(crate) stopped: bool,
    pub(crate) trace: bool,
    pub(crate) spawned_at: DateTime<Utc>,
}

/// An actor: its machine plus its dispatch state.
///
/// The split lets `compute` borrow the machine mutably while the body serves
/// as the interpreter's effect seam.
pub(crate) struct Actor {
    pub(crate) machine: Machine,
    pub(crate) body: ActorBody,
}

/// Create an actor and start its task on the current tokio runtime.
pub(crate) fn launch(
    system: Arc<SystemShared>,
    address: ActorAddress,
    trace: bool,
    one_shot: bool,
) -> Result<ActorRef, SystemError> {
    let runtime = tokio::runtime::Handle::try_current().map_err(|_| SystemError::NoRuntime)?;
    let mailbox = Arc::new(Mailbox::new());
    let signal = Arc::new(Notify::new());
    let actor_ref = ActorRef::new(address.clone(), Arc::clone(&mailbox), Arc::clone(&signal));
    let body = ActorBody {
        address: address.clone(),
        self_ref: actor_ref.clone(),
        mailbox,
        signal,
        system: Arc::clone(&system),
        handler: VarRef::new(),
        native: None,
        active_request: None,
        barrier: None,
        selectable: Vec::new(),
        suspended: Vec::new(),
        child_count: 0,
        failed: None,
        configured: false,
        one_shot,
        stopped: false,
        trace,
        spawned_at: Utc::now(),
    };
    system.register(&actor_ref);
    debug!(actor = %address, one_shot, "actor spawned");
    runtime.spawn(dispatch::run(Actor {
        machine: Machine::new(),
        body,
    }));
    Ok(actor_ref)
}

impl ActorOps for ActorBody {
    fn address(&self) -> &ActorAddress {
        &self.address
    }

    /// Answer the active request. A `respond` outside a request context is
    /// logged and dropped. Plain requests are one-shot: the slot clears.
    /// An act control keeps the slot, so an act body may respond repeatedly.
    fn reply(&mut self, value: Value) -> Step<()> {
        let Some(active) = self.active_request.clone() else {
            warn!(actor = %self.address, "respond without an active request; dropped");
            return Ok(());
        };
        match (active.requester().cloned(), active.request_id().cloned()) {
            (Some(requester), Some(request_id)) => {
                requester.send(Envelope::Response {
                    message: value,
                    request_id,
                });
            }
            _ => {
                warn!(actor = %self.address, "respond with no requester; dropped");
            }
        }
        if active.is_request() {
            self.active_request = None;
        }
        Ok(())
    }

    fn spawn_child(&mut self, cfg: &ActorCfg) -> Step<Value> {
        let address = self.address.child(self.child_count);
        let child = launch(Arc::clone(&self.system), address, self.trace, false)
            .map_err(|err| Flow::raise("SpawnError", err.to_string(), Span::default()))?;
        self.child_count += 1;
        child.send(Envelope::control(ControlMsg::Configure { cfg: cfg.clone() }));
        Ok(Value::Obj(Obj::Actor(child)))
    }

    fn spawn_act(&mut self, closure: &Arc<Closure>, target: &VarRef) -> Step<()> {
        sync::spawn_act(self, closure, target)
    }

    fn notify(&mut self, to: &ActorRef, message: Value) -> Step<()> {
        to.send(Envelope::Notify {
            message,
            sender: Some(self.self_ref.clone()),
        });
        Ok(())
    }

    fn request(&mut self, to: &ActorRef, message: Value, reply_to: VarRef) -> Step<()> {
        to.send(Envelope::Request {
            message,
            requester: self.self_ref.clone(),
            request_id: RequestId::Var(reply_to),
        });
        Ok(())
    }

    fn stream_request(&mut self, to: &ActorRef, message: Value, stream: StreamObj) -> Step<()> {
        to.send(Envelope::Request {
            message,
            requester: self.self_ref.clone(),
            request_id: RequestId::Stream(stream),
        });
        Ok(())
    }

    fn module_at(&mut self, qualifier: &str) -> Step<Value> {
        self.system.module_at(qualifier).ok_or_else(|| {
            Flow::raise(
                "ModuleNotFound",
                format!("no module registered for '{qualifier}'"),
                Span::default(),
            )
        })
    }
}
