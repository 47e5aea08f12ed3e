// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use tracing::warn;

// Layer 3: Internal module imports
use super::core::{launch, ActorBody};
use super::handle::ActorRef;
use crate::machine::instr::Span;
use crate::machine::intrinsics::{is_root_binding, root_env};
use crate::machine::{Flow, Step};
use crate::message::{ControlMsg, Envelope, RequestId};
use crate::store::env::Ident;
use crate::store::var::{check_complete, Incomplete, VarRef};
use crate::value::{Closure, Value, ValueOrVar};

/// A child-side variable standing in for a parent variable that was unbound
/// at capture time. The parent never references the child's store directly;
/// this record is the payload of the trigger that forwards the binding.
#[derive(Clone)]
pub(crate) struct ChildVar {
    pub(crate) child: ActorRef,
    pub(crate) var: VarRef,
}

enum Capture {
    /// Complete at capture time: the child gets a pre-bound cell.
    Ready(Ident, Value),
    /// Unbound (or partial): the child gets a fresh cell plus a trigger on
    /// the parent variable.
    Deferred(Ident, VarRef),
}

/// Run a zero-param closure as a child computation.
///
/// Free identifiers captured by the closure translate per the parent's
/// store: Complete values pass through pre-bound; anything else becomes a
/// fresh child variable synchronized by a [`SyncVar`] trigger. The child is
/// sent an `Act` control whose requester/request-id route the body's final
/// `respond` back into `target` through the response pipeline.
///
/// [`SyncVar`]: ControlMsg::SyncVar
pub(crate) fn spawn_act(
    body: &mut ActorBody,
    closure: &Arc<Closure>,
    target: &VarRef,
) -> Step<()> {
    // Classify captures before any child exists, so an uncompletable
    // capture aborts cleanly.
    let mut plan = Vec::with_capacity(closure.captured.len());
    for (name, parent_var) in &closure.captured {
        if is_root_binding(name, parent_var) {
            continue;
        }
        match check_complete(&ValueOrVar::Var(parent_var.clone())) {
            Ok(value) => plan.push(Capture::Ready(Arc::clone(name), value)),
            Err(Incomplete::Wait(_)) => {
                plan.push(Capture::Deferred(Arc::clone(name), parent_var.clone()))
            }
            Err(Incomplete::Uncompletable(kind)) => {
                return Err(Flow::raise(
                    "TypeError",
                    format!("cannot share a {kind} with a child computation"),
                    Span::default(),
                ))
            }
        }
    }

    let address = body.address.child(body.child_count);
    let child = launch(Arc::clone(&body.system), address, body.trace, true)
        .map_err(|err| Flow::raise("SpawnError", err.to_string(), Span::default()))?;
    body.child_count += 1;

    let mut entries = Vec::with_capacity(plan.len());
    for capture in plan {
        match capture {
            Capture::Ready(name, value) => entries.push((name, VarRef::bound(value))),
            Capture::Deferred(name, parent_var) => {
                let child_var = VarRef::new();
                install_sync_trigger(
                    &parent_var,
                    ChildVar {
                        child: child.clone(),
                        var: child_var.clone(),
                    },
                );
                entries.push((name, child_var));
            }
        }
    }

    child.send(Envelope::Control {
        msg: ControlMsg::Act {
            body: Arc::clone(&closure.def.body),
            env: root_env().extend(entries),
        },
        requester: Some(body.self_ref.clone()),
        request_id: Some(RequestId::Var(target.clone())),
    });
    Ok(())
}

/// Register a trigger on `parent_var` that forwards its value to the child
/// once Complete. A partial binding re-installs the trigger on the first
/// unbound sub-variable, so partial records propagate incrementally.
pub(crate) fn install_sync_trigger(parent_var: &VarRef, child_var: ChildVar) {
    let watched = parent_var.clone();
    parent_var.on_bind(Box::new(move |_| {
        match check_complete(&ValueOrVar::Var(watched.clone())) {
            Ok(value) => {
                child_var.child.send(Envelope::control(ControlMsg::SyncVar {
                    var: child_var.var.clone(),
                    value,
                }));
            }
            Err(Incomplete::Wait(sub_var)) => install_sync_trigger(&sub_var, child_var),
            Err(Incomplete::Uncompletable(kind)) => {
                warn!(
                    child = %child_var.child.address(),
                    "cannot propagate a {kind} to a child computation"
                );
            }
        }
    }));
}
