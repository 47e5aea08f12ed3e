// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use chrono::Utc;
use tracing::{debug, trace, warn};

// Layer 3: Internal module imports
use super::core::Actor;
use crate::machine::instr::{Instr, Operand, Span};
use crate::machine::intrinsics::root_env;
use crate::machine::{HaltDetail, StepOutcome};
use crate::message::{ControlMsg, Envelope, RequestId, PRIORITY_CONTROL, PRIORITY_RESPONSE};
use crate::store::env::ident;
use crate::store::var::{bind, unify, VarRef};
use crate::value::obj::CfgKind;
use crate::value::{error_rec, ActorCfg, FailedValue, Lit, NativeActorHandler, Proc, Value, ValueOrVar};

enum Selected {
    Single(Envelope),
    Responses(Vec<Envelope>),
    Idle,
}

enum BindOutcome {
    /// The response target cannot bind yet; the fixpoint parks the envelope
    /// and retries it with the next batch. Not produced by the current
    /// binding rules (messages are Complete), but the fixpoint is written
    /// against the full contract.
    #[allow(dead_code)]
    Wait,
    /// The response binding exposed an inconsistency; the actor halts.
    Halt(HaltDetail),
}

/// The actor task: run turns while executable, park on the wakeup signal
/// otherwise. A turn is synchronous and budget-bounded; yielding between
/// turns keeps the shared executor fair even under self-sent `Resume`s.
pub(crate) async fn run(mut actor: Actor) {
    loop {
        if actor.body.stopped {
            break;
        }
        if actor.is_executable() {
            actor.turn();
            tokio::task::yield_now().await;
        } else {
            let signal = Arc::clone(&actor.body.signal);
            signal.notified().await;
        }
    }
    actor.body.system.deregister(&actor.body.address);
    let uptime = Utc::now() - actor.body.spawned_at;
    debug!(
        actor = %actor.body.address,
        uptime_ms = uptime.num_milliseconds(),
        "actor stopped"
    );
}

impl Actor {
    /// An actor is executable when it is not waiting and has mail, or when
    /// it is waiting but the head envelope is a response or control, or when
    /// selectable responses are queued for retry.
    pub(crate) fn is_executable(&self) -> bool {
        if self.body.stopped {
            return false;
        }
        if !self.body.selectable.is_empty() {
            return true;
        }
        let waiting = self.body.barrier.is_some();
        match self.body.mailbox.peek_priority() {
            None => false,
            Some(priority) => !waiting || priority <= PRIORITY_RESPONSE,
        }
    }

    /// One scheduling turn.
    pub(crate) fn turn(&mut self) {
        let waiting = self.body.barrier.is_some();
        let selected = match self.body.mailbox.peek_priority() {
            Some(PRIORITY_CONTROL) => match self.body.mailbox.remove_next() {
                Some(envelope) => Selected::Single(envelope),
                None => Selected::Idle,
            },
            Some(PRIORITY_RESPONSE) => Selected::Responses(self.body.mailbox.select_batch()),
            Some(_) if !waiting => match self.body.mailbox.remove_next() {
                Some(envelope) => Selected::Single(envelope),
                None => Selected::Idle,
            },
            _ if !self.body.selectable.is_empty() => Selected::Responses(Vec::new()),
            _ => Selected::Idle,
        };
        match selected {
            Selected::Idle => {}
            Selected::Responses(batch) => self.handle_responses(batch),
            Selected::Single(envelope) => {
                if self.body.trace {
                    trace!(actor = %self.body.address, envelope = ?envelope, "dispatch");
                }
                if envelope.is_control() {
                    self.handle_control(envelope);
                } else {
                    self.handle_message(envelope);
                }
            }
        }
    }

    fn handle_control(&mut self, envelope: Envelope) {
        let Envelope::Control { msg, .. } = &envelope else {
            return;
        };
        match msg.clone() {
            ControlMsg::Resume => {
                if self.body.failed.is_none() {
                    self.resume_compute();
                }
            }
            ControlMsg::Configure { cfg } => {
                if self.body.failed.is_none() {
                    self.configure(cfg);
                }
            }
            ControlMsg::Stop => {
                if let (Some(requester), Some(request_id)) =
                    (envelope.requester().cloned(), envelope.request_id().cloned())
                {
                    requester.send(Envelope::Response {
                        message: Value::Nothing,
                        request_id,
                    });
                }
                self.body.stopped = true;
            }
            ControlMsg::Act { body, env } => {
                if self.body.failed.is_none() {
                    self.body.active_request = Some(envelope);
                    self.machine.push(body, env);
                    self.resume_compute();
                }
            }
            ControlMsg::SyncVar { var, value } => {
                if self.body.failed.is_none() {
                    if let Err(err) = bind(&var, value) {
                        self.fail(HaltDetail {
                            error: error_rec("UnificationError", err.message()),
                            current: "sync_var".to_string(),
                            span: Span::default(),
                            native_cause: None,
                            touched: None,
                        });
                    } else if !self.machine.is_idle() {
                        self.resume_compute();
                    }
                }
            }
        }
    }

    /// Install the handler. Configure is first-time only; a second one is
    /// logged and ignored.
    fn configure(&mut self, cfg: ActorCfg) {
        if self.body.configured {
            warn!(actor = %self.body.address, "duplicate configure ignored");
            return;
        }
        self.body.configured = true;
        match &*cfg.0 {
            CfgKind::Native { handler } => {
                self.body.native = Some(Arc::clone(handler));
                debug!(actor = %self.body.address, handler = handler.name(), "configured (native)");
            }
            CfgKind::Kernel { ctor, args } => {
                // Apply the handler constructor to its args plus the handler
                // cell; the constructor's job is to bind that cell.
                let mut frame = vec![(
                    ident("$ctor"),
                    VarRef::bound(Value::Proc(Proc::kernel(ctor.clone()))),
                )];
                let mut operands = Vec::with_capacity(args.len() + 1);
                for (index, arg) in args.iter().enumerate() {
                    let name = format!("$arg{index}");
                    frame.push((ident(&name), VarRef::bound(arg.clone())));
                    operands.push(Operand::ident(&name));
                }
                frame.push((ident("$handler"), self.body.handler.clone()));
                operands.push(Operand::ident("$handler"));
                self.machine.push(
                    Arc::new(Instr::apply(Operand::ident("$ctor"), operands)),
                    root_env().extend(frame),
                );
                debug!(actor = %self.body.address, "configured");
                self.resume_compute();
            }
        }
    }

    /// Dispatch a notify or request.
    fn handle_message(&mut self, envelope: Envelope) {
        if let Some(failed) = self.body.failed.clone() {
            self.answer_from_failure(envelope, &failed);
            return;
        }
        if let Some(native) = self.body.native.clone() {
            self.dispatch_native(&native, envelope);
            return;
        }
        let Some(message) = envelope.message().cloned() else {
            return;
        };
        if envelope.is_request() {
            self.body.active_request = Some(envelope);
        }
        // $handler($next); an unconfigured actor's handler cell is unbound,
        // so early requests suspend on it until Configure binds it.
        let frame = vec![
            (ident("$handler"), self.body.handler.clone()),
            (ident("$next"), VarRef::bound(message)),
        ];
        self.machine.push(
            Arc::new(Instr::apply(
                Operand::ident("$handler"),
                vec![Operand::ident("$next")],
            )),
            root_env().extend(frame),
        );
        self.resume_compute();
    }

    fn dispatch_native(&mut self, handler: &Arc<dyn NativeActorHandler>, envelope: Envelope) {
        match &envelope {
            Envelope::Request {
                message,
                requester,
                request_id,
            } => match handler.on_request(message) {
                Ok(responses) => {
                    for value in responses {
                        requester.send(Envelope::Response {
                            message: value,
                            request_id: request_id.clone(),
                        });
                    }
                }
                Err(error) => {
                    self.body.active_request = Some(envelope.clone());
                    self.fail(HaltDetail {
                        error,
                        current: format!("native handler '{}'", handler.name()),
                        span: Span::default(),
                        native_cause: None,
                        touched: None,
                    });
                }
            },
            Envelope::Notify { message, .. } => {
                if let Err(error) = handler.on_notify(message) {
                    self.fail(HaltDetail {
                        error,
                        current: format!("native handler '{}'", handler.name()),
                        span: Span::default(),
                        native_cause: None,
                        touched: None,
                    });
                }
            }
            _ => {}
        }
    }

    /// The response binding fixpoint.
    ///
    /// Accumulate the batch with the selectable and suspended sets, bind
    /// what can bind, and either park everything (no progress) or resume the
    /// computation with the remainder queued as selectable for the next
    /// turn.
    fn handle_responses(&mut self, batch: Vec<Envelope>) {
        if self.body.failed.is_some() {
            // A halted actor ignores late responses.
            return;
        }
        let mut all = batch;
        all.append(&mut self.body.selectable);
        all.append(&mut self.body.suspended);
        if all.is_empty() {
            return;
        }
        let total = all.len();
        let mut waiting = Vec::new();
        for envelope in all {
            match self.bind_response(&envelope) {
                Ok(()) => {}
                Err(BindOutcome::Wait) => waiting.push(envelope),
                Err(BindOutcome::Halt(detail)) => {
                    self.fail(detail);
                    return;
                }
            }
        }
        if waiting.len() == total {
            // No progress: park and do not retry until a new response
            // arrives.
            self.body.suspended = waiting;
            return;
        }
        self.body.selectable = waiting;
        self.resume_compute();
    }

    /// Bind one response by its request id.
    fn bind_response(&mut self, envelope: &Envelope) -> Result<(), BindOutcome> {
        let (message, request_id) = match envelope {
            Envelope::Response {
                message,
                request_id,
            } => (message, request_id),
            _ => return Ok(()),
        };
        match request_id {
            // Unary: the response binds the target. A failed value binds
            // silently and taints future touches.
            RequestId::Var(target) => unify(
                &ValueOrVar::Var(target.clone()),
                &ValueOrVar::Value(message.clone()),
            )
            .map_err(|err| {
                BindOutcome::Halt(HaltDetail {
                    error: error_rec("UnificationError", err.message()),
                    current: "bind_response".to_string(),
                    span: Span::default(),
                    native_cause: None,
                    touched: None,
                })
            }),
            RequestId::Stream(stream) => self.bind_stream_response(stream.clone(), message),
            RequestId::Client(id) => {
                warn!(actor = %self.body.address, request = %id, "client-correlated response delivered to an actor; ignored");
                Ok(())
            }
        }
    }

    /// The stream pipeline rules.
    fn bind_stream_response(
        &mut self,
        stream: crate::stream::StreamObj,
        message: &Value,
    ) -> Result<(), BindOutcome> {
        let halt = |detail: String| {
            BindOutcome::Halt(HaltDetail {
                error: error_rec("StreamError", detail),
                current: "bind_response".to_string(),
                span: Span::default(),
                native_cause: None,
                touched: None,
            })
        };
        let unify_halt = |err: crate::store::var::UnifyError| {
            BindOutcome::Halt(HaltDetail {
                error: error_rec("UnificationError", err.message()),
                current: "bind_response".to_string(),
                span: Span::default(),
                native_cause: None,
                touched: None,
            })
        };
        match message {
            // A failed publisher: the failure lands in the element order.
            Value::Failed(failed) => stream
                .push_failed(Arc::clone(failed))
                .map_err(unify_halt),
            // Legal empty batch.
            Value::Rec(rec) if rec.is_empty() => Ok(()),
            Value::Rec(rec) if rec.label() == &Lit::Eof => {
                let more = rec
                    .find(&Lit::str("more"))
                    .map(|slot| slot.resolved());
                match more {
                    Some(ValueOrVar::Value(Value::Bool(true))) => {
                        // The publisher has more: re-issue the request.
                        stream.publisher().send(Envelope::Request {
                            message: stream.request(),
                            requester: self.body.self_ref.clone(),
                            request_id: RequestId::Stream(stream.clone()),
                        });
                        Ok(())
                    }
                    Some(ValueOrVar::Value(Value::Bool(false))) => {
                        stream.close_with_eof().map_err(unify_halt)
                    }
                    other => Err(halt(format!(
                        "eof record carries no boolean 'more' field: {other:?}"
                    ))),
                }
            }
            Value::Tuple(tuple) if tuple.is_empty() => Ok(()),
            Value::Tuple(tuple) => {
                let mut values = Vec::with_capacity(tuple.len());
                for slot in tuple.items() {
                    match slot.resolved() {
                        ValueOrVar::Value(value) => values.push(value),
                        ValueOrVar::Var(_) => {
                            return Err(halt(
                                "stream batch contains an unbound element".to_string(),
                            ))
                        }
                    }
                }
                stream.append_batch(values).map_err(unify_halt)
            }
            other => Err(halt(format!(
                "stream publisher answered with {}",
                other.type_label()
            ))),
        }
    }

    /// Re-enter the machine and absorb the outcome.
    fn resume_compute(&mut self) {
        if self.body.failed.is_some() || self.body.stopped {
            return;
        }
        self.body.barrier = None;
        if self.machine.is_idle() {
            self.finish_turn();
            return;
        }
        let budget = self.body.system.config().instruction_budget;
        let outcome = self.machine.compute(&mut self.body, budget);
        match outcome {
            StepOutcome::Completed => {
                self.finish_turn();
            }
            StepOutcome::Preempt => {
                trace!(actor = %self.body.address, "preempted; resume scheduled");
                self.body
                    .self_ref
                    .send(Envelope::control(ControlMsg::Resume));
            }
            StepOutcome::Wait(barrier) => {
                self.body.barrier = Some(barrier);
            }
            StepOutcome::Halt(detail) => self.fail(detail),
        }
    }

    fn finish_turn(&mut self) {
        if self.body.one_shot {
            // Act children are one computation; done means stopped.
            self.body.stopped = true;
        }
    }

    /// Convert a halt into the actor's failed value, answer the active
    /// request with it, and pin the failed slot — never cleared.
    fn fail(&mut self, detail: HaltDetail) {
        if self.body.failed.is_some() {
            return;
        }
        let failed = Arc::new(FailedValue::new(
            self.body.address.clone(),
            detail.error,
            detail.current,
            detail.touched,
            detail.native_cause,
        ));
        warn!(
            actor = %self.body.address,
            "actor halted\n{}",
            failed.to_details_string()
        );
        if let Some(active) = self.body.active_request.take() {
            if let (Some(requester), Some(request_id)) =
                (active.requester().cloned(), active.request_id().cloned())
            {
                requester.send(Envelope::Response {
                    message: Value::Failed(Arc::clone(&failed)),
                    request_id,
                });
            }
        }
        self.body.failed = Some(failed);
        self.body.barrier = None;
        self.body.selectable.clear();
        self.body.suspended.clear();
    }

    /// Post-halt draining: requests are answered with the pinned failed
    /// value, notifies are dropped.
    fn answer_from_failure(&mut self, envelope: Envelope, failed: &Arc<FailedValue>) {
        match envelope {
            Envelope::Request {
                requester,
                request_id,
                ..
            } => {
                requester.send(Envelope::Response {
                    message: Value::Failed(Arc::clone(failed)),
                    request_id,
                });
            }
            Envelope::Notify { .. } => {
                debug!(actor = %self.body.address, "notify delivered to a halted actor; dropped");
            }
            _ => {}
        }
    }
}
