// Layer 1: Standard library imports
use std::cmp::Ordering;
use std::sync::Arc;

// Layer 2: Third-party crate imports
use rust_decimal::Decimal;

// Layer 3: Internal module imports
use super::instr::{BinOp, Instr, Operand, Pattern, Span};
use super::intrinsics::{is_root_binding, root_env};
use super::ops::ActorOps;
use crate::actor::handle::ActorRef;
use crate::store::env::{Env, Ident};
use crate::store::var::{check_complete, unify, Incomplete, VarRef};
use crate::stream::iter::StreamIter;
use crate::stream::obj::StreamObj;
use crate::value::obj::CfgKind;
use crate::value::{
    error_rec, ActorCfg, FailedValue, Lit, NativeProc, Obj, Proc, Rec, TupleVal, Value, ValueOrVar,
};

/// Everything the actor needs to turn a halt into a failed value.
#[derive(Debug)]
pub(crate) struct HaltDetail {
    /// The uncaught error value.
    pub error: Value,
    /// Summary of the instruction that was executing.
    pub current: String,
    /// Halt site.
    pub span: Span,
    /// Host-level exception detail, if any.
    pub native_cause: Option<String>,
    /// The failed value whose touch caused this halt, if any.
    pub touched: Option<Arc<FailedValue>>,
}

/// Result of one `compute` call.
#[derive(Debug)]
pub(crate) enum StepOutcome {
    /// Stack empty, no further work.
    Completed,
    /// Instruction budget expired with work remaining.
    Preempt,
    /// Progress requires the barrier variable to bind.
    Wait(VarRef),
    /// Unrecoverable: uncaught throw or touched failed value.
    Halt(HaltDetail),
}

/// Interpreter control-flow signal, propagated with `?` inside a step.
///
/// `Wait` and `Failure` cross the instruction boundary untouched; `Raise` is
/// a kernel throw that unwinds to the nearest catch frame first.
pub(crate) enum Flow {
    /// Progress requires this variable to bind.
    Wait(VarRef),
    /// A kernel throw.
    Raise {
        /// The thrown value.
        value: Value,
        /// Throw site.
        span: Span,
    },
    /// An unrecoverable halt.
    Failure(Box<HaltDetail>),
}

impl Flow {
    /// Throw an `error#{name, message}` record.
    pub(crate) fn raise(name: &str, message: impl AsRef<str>, span: Span) -> Flow {
        Flow::Raise {
            value: error_rec(name, message),
            span,
        }
    }
}

/// Step result type.
pub(crate) type Step<T> = Result<T, Flow>;

enum Frame {
    Run { instr: Arc<Instr>, env: Env },
    Catch {
        pattern: Pattern,
        handler: Arc<Instr>,
        env: Env,
    },
}

/// The kernel-language machine: a frame stack plus the current instruction.
///
/// Instructions are re-executable: a `Wait` re-pushes the current frame, and
/// no effect outside the store happens before every operand of an effectful
/// intrinsic has resolved to a Complete value.
pub(crate) struct Machine {
    stack: Vec<Frame>,
    current: Option<Arc<Instr>>,
}

impl Machine {
    pub(crate) fn new() -> Self {
        Self {
            stack: Vec::new(),
            current: None,
        }
    }

    /// True when there is no pending work.
    pub(crate) fn is_idle(&self) -> bool {
        self.stack.is_empty()
    }

    /// Push a computation.
    pub(crate) fn push(&mut self, instr: Arc<Instr>, env: Env) {
        self.stack.push(Frame::Run { instr, env });
    }

    /// Summary of the instruction that was last dispatched.
    pub(crate) fn describe_current(&self) -> String {
        match &self.current {
            Some(instr) => format!("{} at {}", instr.label(), instr.span()),
            None => "<idle>".to_string(),
        }
    }

    /// Run until completed, preempted, suspended, or halted.
    pub(crate) fn compute<E: ActorOps>(&mut self, ops: &mut E, budget: usize) -> StepOutcome {
        let mut steps: usize = 0;
        loop {
            let frame = match self.stack.pop() {
                None => {
                    self.current = None;
                    return StepOutcome::Completed;
                }
                Some(frame) => frame,
            };
            let (instr, env) = match frame {
                // Body completed without a throw; the catch frame is spent.
                Frame::Catch { .. } => continue,
                Frame::Run { instr, env } => (instr, env),
            };
            self.current = Some(Arc::clone(&instr));
            match self.step(ops, &instr, &env) {
                Ok(()) => {}
                Err(Flow::Wait(barrier)) => {
                    self.stack.push(Frame::Run { instr, env });
                    return StepOutcome::Wait(barrier);
                }
                Err(Flow::Raise { value, span }) => {
                    if !self.unwind(&value, span) {
                        return StepOutcome::Halt(HaltDetail {
                            error: value,
                            current: self.describe_current(),
                            span,
                            native_cause: None,
                            touched: None,
                        });
                    }
                }
                Err(Flow::Failure(detail)) => {
                    let mut detail = *detail;
                    if detail.current.is_empty() {
                        detail.current = self.describe_current();
                    }
                    return StepOutcome::Halt(detail);
                }
            }
            steps += 1;
            if steps >= budget && !self.stack.is_empty() {
                return StepOutcome::Preempt;
            }
        }
    }

    /// Pop to the nearest catch frame whose pattern matches the thrown
    /// value. Returns false when the stack is exhausted.
    fn unwind(&mut self, value: &Value, span: Span) -> bool {
        while let Some(frame) = self.stack.pop() {
            if let Frame::Catch {
                pattern,
                handler,
                env,
            } = frame
            {
                // An unbound sub-part during catch matching is a non-match,
                // never a mid-unwind suspension.
                let matched = match match_pattern(&ValueOrVar::Value(value.clone()), &pattern, span)
                {
                    Ok(matched) => matched,
                    Err(_) => None,
                };
                if let Some(binds) = matched {
                    self.stack.push(Frame::Run {
                        instr: handler,
                        env: env.extend(binds),
                    });
                    return true;
                }
            }
        }
        false
    }

    fn step<E: ActorOps>(&mut self, ops: &mut E, instr: &Arc<Instr>, env: &Env) -> Step<()> {
        match &**instr {
            Instr::Skip { .. } => Ok(()),
            Instr::Seq { body, .. } => {
                for child in body.iter().rev() {
                    self.stack.push(Frame::Run {
                        instr: Arc::clone(child),
                        env: env.clone(),
                    });
                }
                Ok(())
            }
            Instr::Local { idents, body, .. } => {
                let frame: Vec<(Ident, VarRef)> = idents
                    .iter()
                    .map(|id| (Arc::clone(id), VarRef::new()))
                    .collect();
                self.stack.push(Frame::Run {
                    instr: Arc::clone(body),
                    env: env.extend(frame),
                });
                Ok(())
            }
            Instr::Bind { lhs, rhs, span } => {
                let left = operand_cell(env, lhs, *span)?;
                let right = operand_cell(env, rhs, *span)?;
                unify_cells(&left, &right, *span)
            }
            Instr::BinApply {
                op,
                left,
                right,
                target,
                span,
            } => self.bin_apply(env, *op, left, right, target, *span),
            Instr::CreateRec {
                label,
                fields,
                target,
                span,
            } => {
                let label = lit_operand(env, label, *span)?;
                let mut slots = Vec::with_capacity(fields.len());
                for (feature, operand) in fields {
                    slots.push((feature.clone(), operand_cell(env, operand, *span)?));
                }
                let rec = Rec::new(label, slots).map_err(|feature| {
                    Flow::raise(
                        "DuplicateFeature",
                        format!("feature {feature} appears more than once"),
                        *span,
                    )
                })?;
                bind_target(env, target, Value::Rec(rec), *span)
            }
            Instr::CreateTuple {
                label,
                items,
                target,
                span,
            } => {
                let label = lit_operand(env, label, *span)?;
                let mut slots = Vec::with_capacity(items.len());
                for operand in items {
                    slots.push(operand_cell(env, operand, *span)?);
                }
                bind_target(env, target, Value::Tuple(TupleVal::new(label, slots)), *span)
            }
            Instr::Select {
                subject,
                feature,
                target,
                span,
            } => {
                let slot = self.select_slot(env, subject, feature, *span)?;
                let cell = operand_cell(env, target, *span)?;
                unify_cells(&cell, &slot, *span)
            }
            Instr::SelectApply {
                subject,
                feature,
                args,
                span,
            } => {
                let slot = self.select_slot(env, subject, feature, *span)?;
                let callee = touch(resolve_value(&slot)?, *span)?;
                self.apply_value(ops, callee, args, env, *span)
            }
            Instr::CreateProc { def, target, span } => {
                let mut captured = Vec::with_capacity(def.free.len());
                for name in &def.free {
                    let var = env.get(name).ok_or_else(|| {
                        Flow::raise(
                            "IdentNotFound",
                            format!("free identifier '{name}' is not in scope"),
                            *span,
                        )
                    })?;
                    captured.push((Arc::clone(name), var));
                }
                let closure = crate::value::Closure {
                    def: Arc::clone(def),
                    captured,
                };
                bind_target(env, target, Value::Proc(Proc::kernel(closure)), *span)
            }
            Instr::Apply { proc, args, span } => {
                let callee = resolve_for_use(env, proc, *span)?;
                self.apply_value(ops, callee, args, env, *span)
            }
            Instr::If {
                cond,
                consequent,
                alternate,
                span,
            } => {
                let cond = resolve_for_use(env, cond, *span)?;
                let branch = match cond {
                    Value::Bool(true) => Some(consequent),
                    Value::Bool(false) => alternate.as_ref(),
                    other => {
                        return Err(Flow::raise(
                            "TypeError",
                            format!("if condition must be a bool, found {}", other.type_label()),
                            *span,
                        ))
                    }
                };
                if let Some(branch) = branch {
                    self.stack.push(Frame::Run {
                        instr: Arc::clone(branch),
                        env: env.clone(),
                    });
                }
                Ok(())
            }
            Instr::Case {
                subject,
                pattern,
                consequent,
                alternate,
                span,
            } => {
                let cell = operand_cell(env, subject, *span)?;
                match match_pattern(&cell, pattern, *span)? {
                    Some(binds) => self.stack.push(Frame::Run {
                        instr: Arc::clone(consequent),
                        env: env.extend(binds),
                    }),
                    None => {
                        if let Some(alternate) = alternate {
                            self.stack.push(Frame::Run {
                                instr: Arc::clone(alternate),
                                env: env.clone(),
                            });
                        }
                    }
                }
                Ok(())
            }
            Instr::Throw { value, span } => {
                let value = resolve_for_use(env, value, *span)?;
                Err(Flow::Raise { value, span: *span })
            }
            Instr::Try {
                body,
                pattern,
                handler,
                ..
            } => {
                self.stack.push(Frame::Catch {
                    pattern: pattern.clone(),
                    handler: Arc::clone(handler),
                    env: env.clone(),
                });
                self.stack.push(Frame::Run {
                    instr: Arc::clone(body),
                    env: env.clone(),
                });
                Ok(())
            }
        }
    }

    fn bin_apply(
        &mut self,
        env: &Env,
        op: BinOp,
        left: &Operand,
        right: &Operand,
        target: &Operand,
        span: Span,
    ) -> Step<()> {
        let result = match op {
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
                let a = resolve_for_use(env, left, span)?;
                let b = resolve_for_use(env, right, span)?;
                arith(op, &a, &b, span)?
            }
            BinOp::Eq | BinOp::Ne => {
                let a = operand_cell(env, left, span)?;
                let b = operand_cell(env, right, span)?;
                let equal = entails(&a, &b, span)?;
                Value::Bool(if op == BinOp::Eq { equal } else { !equal })
            }
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                let a = resolve_for_use(env, left, span)?;
                let b = resolve_for_use(env, right, span)?;
                let ordering = order(&a, &b, span)?;
                Value::Bool(match op {
                    BinOp::Lt => ordering == Ordering::Less,
                    BinOp::Le => ordering != Ordering::Greater,
                    BinOp::Gt => ordering == Ordering::Greater,
                    _ => ordering != Ordering::Less,
                })
            }
        };
        bind_target(env, target, result, span)
    }

    /// Resolve `subject.feature` to the field slot.
    fn select_slot(
        &mut self,
        env: &Env,
        subject: &Operand,
        feature: &Operand,
        span: Span,
    ) -> Step<ValueOrVar> {
        let subject = resolve_for_use(env, subject, span)?;
        let feature = lit_operand(env, feature, span)?;
        match subject {
            Value::Rec(rec) => rec.find(&feature).cloned().ok_or_else(|| {
                Flow::raise(
                    "FeatureNotFound",
                    format!("record {rec} has no feature {feature}"),
                    span,
                )
            }),
            Value::Tuple(tuple) => {
                let index = match feature {
                    Lit::Int(i) if i >= 0 => i as usize,
                    other => {
                        return Err(Flow::raise(
                            "FeatureNotFound",
                            format!("tuple features are non-negative integers, found {other}"),
                            span,
                        ))
                    }
                };
                tuple.item(index).cloned().ok_or_else(|| {
                    Flow::raise(
                        "FeatureNotFound",
                        format!("tuple of {} has no feature {index}", tuple.len()),
                        span,
                    )
                })
            }
            Value::Obj(Obj::Cfg(_)) => Err(Flow::raise(
                "ActorCfgError",
                "an actor cfg cannot be selected into",
                span,
            )),
            other => Err(Flow::raise(
                "TypeError",
                format!("cannot select from {}", other.type_label()),
                span,
            )),
        }
    }

    fn apply_value<E: ActorOps>(
        &mut self,
        ops: &mut E,
        callee: Value,
        args: &[Operand],
        env: &Env,
        span: Span,
    ) -> Step<()> {
        match callee {
            Value::Proc(Proc::Kernel(closure)) => self.apply_closure(&closure, args, env, span),
            Value::Proc(Proc::Native(native)) => self.apply_native(ops, native, args, env, span),
            Value::Obj(Obj::Actor(actor)) => self.apply_actor(ops, &actor, args, env, span),
            Value::Obj(Obj::Iter(iter)) => {
                if args.len() != 1 {
                    return Err(invalid_argc("an iterator", 1, args.len(), span));
                }
                let cell = operand_cell(env, &args[0], span)?;
                iter.next_into(&cell, span)
            }
            other => Err(Flow::raise(
                "TypeError",
                format!("cannot apply {}", other.type_label()),
                span,
            )),
        }
    }

    fn apply_closure(
        &mut self,
        closure: &Arc<crate::value::Closure>,
        args: &[Operand],
        env: &Env,
        span: Span,
    ) -> Step<()> {
        let params = &closure.def.params;
        if params.len() != args.len() {
            return Err(invalid_argc("procedure", params.len(), args.len(), span));
        }
        let mut param_frame = Vec::with_capacity(params.len());
        for (param, arg) in params.iter().zip(args) {
            let var = match operand_cell(env, arg, span)? {
                ValueOrVar::Var(var) => var,
                ValueOrVar::Value(value) => VarRef::bound(value),
            };
            param_frame.push((Arc::clone(param), var));
        }
        let call_env = root_env()
            .extend(closure.captured.clone())
            .extend(param_frame);
        self.stack.push(Frame::Run {
            instr: Arc::clone(&closure.def.body),
            env: call_env,
        });
        Ok(())
    }

    fn apply_native<E: ActorOps>(
        &mut self,
        ops: &mut E,
        native: NativeProc,
        args: &[Operand],
        env: &Env,
        span: Span,
    ) -> Step<()> {
        if native.arity() != args.len() {
            return Err(invalid_argc(native.name(), native.arity(), args.len(), span));
        }
        match native {
            NativeProc::Respond => self.native_respond(ops, env, &args[0], span),
            NativeProc::Spawn => self.native_spawn(ops, env, args, span),
            NativeProc::Act => self.native_act(ops, env, args, span),
            NativeProc::SelfRef => Err(Flow::raise(
                "NotImplemented",
                "self is not implemented",
                span,
            )),
            NativeProc::Import => self.native_import(ops, env, args, span),
            NativeProc::StreamNew => self.native_stream_new(ops, env, args, span),
            NativeProc::IterNew => self.native_iter_new(env, args, span),
            NativeProc::CfgNew => self.native_cfg_new(env, args, span),
        }
    }

    /// `respond(v)`: resolve, require Complete, wrap an already-failed value
    /// with this actor's context, and answer the active request.
    fn native_respond<E: ActorOps>(
        &mut self,
        ops: &mut E,
        env: &Env,
        arg: &Operand,
        span: Span,
    ) -> Step<()> {
        let cell = operand_cell(env, arg, span)?;
        let value = complete_slot(&cell, span)?;
        let value = match value {
            Value::Failed(inner) => Value::Failed(Arc::new(FailedValue::new(
                ops.address().clone(),
                inner.error.clone(),
                self.describe_current(),
                Some(inner),
                None,
            ))),
            other => other,
        };
        ops.reply(value)
    }

    /// `spawn(cfg, target)`: verify the configuration is effectively
    /// complete, then create the child. Every check precedes the creation,
    /// so a Wait-and-re-run reaches the creation exactly once.
    fn native_spawn<E: ActorOps>(
        &mut self,
        ops: &mut E,
        env: &Env,
        args: &[Operand],
        span: Span,
    ) -> Step<()> {
        let cfg = match resolve_for_use(env, &args[0], span)? {
            Value::Obj(Obj::Cfg(cfg)) => cfg,
            other => {
                return Err(Flow::raise(
                    "TypeError",
                    format!("spawn expects an actor cfg, found {}", other.type_label()),
                    span,
                ))
            }
        };
        if let CfgKind::Kernel { ctor, args: cfg_args } = &*cfg.0 {
            for (name, var) in &ctor.captured {
                if is_root_binding(name, var) {
                    continue;
                }
                complete_slot(&ValueOrVar::Var(var.clone()), span)?;
            }
            for arg in cfg_args {
                complete_slot(&ValueOrVar::Value(arg.clone()), span)?;
            }
        }
        let child = ops.spawn_child(&cfg)?;
        bind_target(env, &args[1], child, span)
    }

    /// `act(p, target)`: run a zero-param closure as a child computation.
    fn native_act<E: ActorOps>(
        &mut self,
        ops: &mut E,
        env: &Env,
        args: &[Operand],
        span: Span,
    ) -> Step<()> {
        let closure = match resolve_for_use(env, &args[0], span)? {
            Value::Proc(Proc::Kernel(closure)) => closure,
            other => {
                return Err(Flow::raise(
                    "TypeError",
                    format!("act expects a procedure, found {}", other.type_label()),
                    span,
                ))
            }
        };
        if !closure.def.params.is_empty() {
            return Err(invalid_argc("act body", 0, closure.def.params.len(), span));
        }
        let target = target_var(env, &args[1], span)?;
        ops.spawn_act(&closure, &target)
    }

    /// `import(qualifier, selections)`: bind module fields into the caller's
    /// scope. Two-argument form only; aliasing is reserved.
    fn native_import<E: ActorOps>(
        &mut self,
        ops: &mut E,
        env: &Env,
        args: &[Operand],
        span: Span,
    ) -> Step<()> {
        let qualifier = match complete_slot(&operand_cell(env, &args[0], span)?, span)? {
            Value::Str(q) => q,
            other => {
                return Err(Flow::raise(
                    "TypeError",
                    format!("import qualifier must be a string, found {}", other.type_label()),
                    span,
                ))
            }
        };
        let selections = match complete_slot(&operand_cell(env, &args[1], span)?, span)? {
            Value::Tuple(t) => t,
            other => {
                return Err(Flow::raise(
                    "TypeError",
                    format!(
                        "import selections must be a tuple of names, found {}",
                        other.type_label()
                    ),
                    span,
                ))
            }
        };
        let module = match ops.module_at(&qualifier)? {
            Value::Rec(rec) => rec,
            other => {
                return Err(Flow::raise(
                    "ModuleError",
                    format!("module '{qualifier}' is not a record ({})", other.type_label()),
                    span,
                ))
            }
        };
        for slot in selections.items() {
            let name = match slot.resolved() {
                ValueOrVar::Value(Value::Str(name)) => name,
                other => {
                    return Err(Flow::raise(
                        "TypeError",
                        format!("import selection must be a name, found {other}"),
                        span,
                    ))
                }
            };
            let field = module
                .find(&Lit::Str(Arc::clone(&name)))
                .cloned()
                .ok_or_else(|| {
                    Flow::raise(
                        "FeatureNotFound",
                        format!("module '{qualifier}' has no feature '{name}'"),
                        span,
                    )
                })?;
            let var = env.get(&name).ok_or_else(|| {
                Flow::raise(
                    "IdentNotFound",
                    format!("import target '{name}' is not declared in scope"),
                    span,
                )
            })?;
            unify_cells(&ValueOrVar::Var(var), &field, span)?;
        }
        Ok(())
    }

    /// `Stream.new(publisher, request, target)`.
    fn native_stream_new<E: ActorOps>(
        &mut self,
        ops: &mut E,
        env: &Env,
        args: &[Operand],
        span: Span,
    ) -> Step<()> {
        let publisher = match resolve_for_use(env, &args[0], span)? {
            Value::Obj(Obj::Actor(actor)) => actor,
            other => {
                return Err(Flow::raise(
                    "TypeError",
                    format!(
                        "stream publisher must be an actor, found {}",
                        other.type_label()
                    ),
                    span,
                ))
            }
        };
        let request = complete_slot(&operand_cell(env, &args[1], span)?, span)?;
        let stream = StreamObj::new(publisher.clone(), request.clone());
        ops.stream_request(&publisher, request, stream.clone())?;
        bind_target(env, &args[2], Value::Obj(Obj::Stream(stream)), span)
    }

    /// `Iter.new(stream, target)`.
    fn native_iter_new(&mut self, env: &Env, args: &[Operand], span: Span) -> Step<()> {
        let stream = match resolve_for_use(env, &args[0], span)? {
            Value::Obj(Obj::Stream(stream)) => stream,
            other => {
                return Err(Flow::raise(
                    "TypeError",
                    format!("Iter.new expects a stream, found {}", other.type_label()),
                    span,
                ))
            }
        };
        bind_target(
            env,
            &args[1],
            Value::Obj(Obj::Iter(StreamIter::new(stream))),
            span,
        )
    }

    /// `ActorCfg.new(ctor, target)`: wrap a handler constructor as an actor
    /// cfg. Captures stay live; `spawn` checks them for completeness later.
    fn native_cfg_new(&mut self, env: &Env, args: &[Operand], span: Span) -> Step<()> {
        let ctor = match resolve_for_use(env, &args[0], span)? {
            Value::Proc(Proc::Kernel(closure)) => closure,
            other => {
                return Err(Flow::raise(
                    "TypeError",
                    format!(
                        "a cfg handler constructor must be a procedure, found {}",
                        other.type_label()
                    ),
                    span,
                ))
            }
        };
        bind_target(
            env,
            &args[1],
            Value::Obj(Obj::Cfg(ActorCfg::kernel((*ctor).clone(), Vec::new()))),
            span,
        )
    }

    /// Applying an actor reference: one argument is a notify, two arguments
    /// (message, reply variable) is a request.
    fn apply_actor<E: ActorOps>(
        &mut self,
        ops: &mut E,
        actor: &ActorRef,
        args: &[Operand],
        env: &Env,
        span: Span,
    ) -> Step<()> {
        match args {
            [message] => {
                let message = complete_slot(&operand_cell(env, message, span)?, span)?;
                ops.notify(actor, message)
            }
            [message, reply_to] => {
                let message = complete_slot(&operand_cell(env, message, span)?, span)?;
                let reply_to = target_var(env, reply_to, span)?;
                ops.request(actor, message, reply_to)
            }
            _ => Err(invalid_argc("an actor reference", 2, args.len(), span)),
        }
    }
}

// ----------------------------------------------------------------------
// Operand and value helpers
// ----------------------------------------------------------------------

/// Look up an operand without resolving it.
fn operand_cell(env: &Env, operand: &Operand, span: Span) -> Step<ValueOrVar> {
    match operand {
        Operand::Ident(name) => env.get(name).map(ValueOrVar::Var).ok_or_else(|| {
            Flow::raise(
                "IdentNotFound",
                format!("undeclared identifier '{name}'"),
                span,
            )
        }),
        Operand::Lit(lit) => Ok(ValueOrVar::Value(Value::from(lit.clone()))),
        Operand::Dec(d) => Ok(ValueOrVar::Value(Value::Dec(*d))),
    }
}

/// Resolve a cell to a value, suspending on an unbound variable.
fn resolve_value(cell: &ValueOrVar) -> Step<Value> {
    match cell.resolved() {
        ValueOrVar::Value(value) => Ok(value),
        ValueOrVar::Var(barrier) => Err(Flow::Wait(barrier)),
    }
}

/// Touching a failed value halts the machine with the touched value.
fn touch(value: Value, span: Span) -> Step<Value> {
    if let Value::Failed(failed) = &value {
        return Err(Flow::Failure(Box::new(HaltDetail {
            error: failed.error.clone(),
            current: String::new(),
            span,
            native_cause: None,
            touched: Some(Arc::clone(failed)),
        })));
    }
    Ok(value)
}

/// Resolve an operand for computation: suspend on unbound, halt on touch.
fn resolve_for_use(env: &Env, operand: &Operand, span: Span) -> Step<Value> {
    touch(resolve_value(&operand_cell(env, operand, span)?)?, span)
}

/// Resolve an operand to a literal (labels, features).
fn lit_operand(env: &Env, operand: &Operand, span: Span) -> Step<Lit> {
    let value = resolve_for_use(env, operand, span)?;
    value.as_lit().ok_or_else(|| {
        Flow::raise(
            "TypeError",
            format!("expected a literal, found {}", value.type_label()),
            span,
        )
    })
}

/// An operand that must name a variable (reply targets, act targets).
fn target_var(env: &Env, operand: &Operand, span: Span) -> Step<VarRef> {
    match operand_cell(env, operand, span)? {
        ValueOrVar::Var(var) => Ok(var),
        ValueOrVar::Value(value) => Err(Flow::raise(
            "TypeError",
            format!("expected a variable, found {value}"),
            span,
        )),
    }
}

/// Require a Complete value, suspending on the first unbound sub-variable.
fn complete_slot(cell: &ValueOrVar, span: Span) -> Step<Value> {
    check_complete(cell).map_err(|incomplete| match incomplete {
        Incomplete::Wait(barrier) => Flow::Wait(barrier),
        Incomplete::Uncompletable(kind) => Flow::raise(
            "TypeError",
            format!("a {kind} can never be a complete value"),
            span,
        ),
    })
}

fn unify_cells(a: &ValueOrVar, b: &ValueOrVar, span: Span) -> Step<()> {
    unify(a, b).map_err(|err| Flow::raise("UnificationError", err.message(), span))
}

fn bind_target(env: &Env, target: &Operand, value: Value, span: Span) -> Step<()> {
    let cell = operand_cell(env, target, span)?;
    unify_cells(&cell, &ValueOrVar::Value(value), span)
}

fn invalid_argc(what: &str, expected: usize, found: usize, span: Span) -> Flow {
    Flow::raise(
        "InvalidArgCount",
        format!("{what} expects {expected} argument(s), found {found}"),
        span,
    )
}

/// Entailment check: equal structures entail, differing structures do not,
/// and an unbound side suspends until it binds.
fn entails(a: &ValueOrVar, b: &ValueOrVar, span: Span) -> Step<bool> {
    match (a.resolved(), b.resolved()) {
        (ValueOrVar::Var(x), ValueOrVar::Var(y)) => {
            if x.same(&y) {
                Ok(true)
            } else {
                Err(Flow::Wait(x))
            }
        }
        (ValueOrVar::Var(x), ValueOrVar::Value(_))
        | (ValueOrVar::Value(_), ValueOrVar::Var(x)) => Err(Flow::Wait(x)),
        (ValueOrVar::Value(u), ValueOrVar::Value(v)) => {
            let u = touch(u, span)?;
            let v = touch(v, span)?;
            Ok(u == v)
        }
    }
}

enum Num {
    Int(i64),
    Dec(Decimal),
}

fn numeric(value: &Value, span: Span) -> Step<Num> {
    match value {
        Value::Int(i) => Ok(Num::Int(*i)),
        Value::Dec(d) => Ok(Num::Dec(*d)),
        other => Err(Flow::raise(
            "TypeError",
            format!("expected a number, found {}", other.type_label()),
            span,
        )),
    }
}

/// Arithmetic with int/dec coercion and checked overflow. A zero divisor and
/// an overflow both throw an `ArithmeticError` record.
fn arith(op: BinOp, a: &Value, b: &Value, span: Span) -> Step<Value> {
    let overflow = || Flow::raise("ArithmeticError", "arithmetic overflow", span);
    let div_by_zero = || Flow::raise("ArithmeticError", "divide by zero", span);
    match (numeric(a, span)?, numeric(b, span)?) {
        (Num::Int(x), Num::Int(y)) => {
            let result = match op {
                BinOp::Add => x.checked_add(y).ok_or_else(overflow)?,
                BinOp::Sub => x.checked_sub(y).ok_or_else(overflow)?,
                BinOp::Mul => x.checked_mul(y).ok_or_else(overflow)?,
                BinOp::Div => {
                    if y == 0 {
                        return Err(div_by_zero());
                    }
                    x.checked_div(y).ok_or_else(overflow)?
                }
                BinOp::Mod => {
                    if y == 0 {
                        return Err(div_by_zero());
                    }
                    x.checked_rem(y).ok_or_else(overflow)?
                }
                // bin_apply routes comparisons elsewhere
                _ => return Err(overflow()),
            };
            Ok(Value::Int(result))
        }
        (x, y) => {
            let x = match x {
                Num::Int(i) => Decimal::from(i),
                Num::Dec(d) => d,
            };
            let y = match y {
                Num::Int(i) => Decimal::from(i),
                Num::Dec(d) => d,
            };
            let result = match op {
                BinOp::Add => x.checked_add(y).ok_or_else(overflow)?,
                BinOp::Sub => x.checked_sub(y).ok_or_else(overflow)?,
                BinOp::Mul => x.checked_mul(y).ok_or_else(overflow)?,
                BinOp::Div => x.checked_div(y).ok_or_else(div_by_zero)?,
                BinOp::Mod => x.checked_rem(y).ok_or_else(div_by_zero)?,
                _ => return Err(overflow()),
            };
            Ok(Value::Dec(result))
        }
    }
}

/// Ordering for comparisons, with int/dec coercion.
fn order(a: &Value, b: &Value, span: Span) -> Step<Ordering> {
    let incomparable = || {
        Flow::raise(
            "TypeError",
            format!("cannot compare {} with {}", a.type_label(), b.type_label()),
            span,
        )
    };
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => Ok(x.cmp(y)),
        (Value::Int(x), Value::Dec(y)) => Ok(Decimal::from(*x).cmp(y)),
        (Value::Dec(x), Value::Int(y)) => Ok(x.cmp(&Decimal::from(*y))),
        (Value::Dec(x), Value::Dec(y)) => Ok(x.cmp(y)),
        (Value::Str(x), Value::Str(y)) => Ok(x.cmp(y)),
        (Value::Char(x), Value::Char(y)) => Ok(x.cmp(y)),
        _ => Err(incomparable()),
    }
}

/// Match a cell against a pattern, producing binder entries on success.
fn match_pattern(
    cell: &ValueOrVar,
    pattern: &Pattern,
    span: Span,
) -> Step<Option<Vec<(Ident, VarRef)>>> {
    match pattern {
        Pattern::Any => Ok(Some(Vec::new())),
        Pattern::Ident(name) => {
            let var = match cell {
                ValueOrVar::Var(var) => var.clone(),
                ValueOrVar::Value(value) => VarRef::bound(value.clone()),
            };
            Ok(Some(vec![(Arc::clone(name), var)]))
        }
        Pattern::Lit(lit) => {
            let value = touch(resolve_value(cell)?, span)?;
            Ok(if value == Value::from(lit.clone()) {
                Some(Vec::new())
            } else {
                None
            })
        }
        Pattern::Rec {
            label,
            fields,
            open,
        } => {
            let value = touch(resolve_value(cell)?, span)?;
            let Value::Rec(rec) = value else {
                return Ok(None);
            };
            if rec.label() != label {
                return Ok(None);
            }
            if !open && rec.len() != fields.len() {
                return Ok(None);
            }
            let mut binds = Vec::new();
            for (feature, sub) in fields {
                let Some(slot) = rec.find(feature) else {
                    return Ok(None);
                };
                match match_pattern(slot, sub, span)? {
                    Some(mut more) => binds.append(&mut more),
                    None => return Ok(None),
                }
            }
            Ok(Some(binds))
        }
        Pattern::Tuple { label, items } => {
            let value = touch(resolve_value(cell)?, span)?;
            let Value::Tuple(tuple) = value else {
                return Ok(None);
            };
            if tuple.label() != label || tuple.len() != items.len() {
                return Ok(None);
            }
            let mut binds = Vec::new();
            for (index, sub) in items.iter().enumerate() {
                let Some(slot) = tuple.item(index) else {
                    return Ok(None);
                };
                match match_pattern(slot, sub, span)? {
                    Some(mut more) => binds.append(&mut more),
                    None => return Ok(None),
                }
            }
            Ok(Some(binds))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::store::env::ident;
    use crate::store::var::bind;
    use crate::util::ActorAddress;
    use crate::value::ActorCfg;

    struct StubOps {
        address: ActorAddress,
        replies: Vec<Value>,
    }

    impl StubOps {
        fn new() -> Self {
            Self {
                address: ActorAddress::named("machine-test"),
                replies: Vec::new(),
            }
        }
    }

    impl ActorOps for StubOps {
        fn address(&self) -> &ActorAddress {
            &self.address
        }

        fn reply(&mut self, value: Value) -> Step<()> {
            self.replies.push(value);
            Ok(())
        }

        fn spawn_child(&mut self, _cfg: &ActorCfg) -> Step<Value> {
            Err(Flow::raise("NotSupported", "spawn in stub", Span::default()))
        }

        fn spawn_act(
            &mut self,
            _closure: &Arc<crate::value::Closure>,
            _target: &VarRef,
        ) -> Step<()> {
            Err(Flow::raise("NotSupported", "act in stub", Span::default()))
        }

        fn notify(&mut self, _to: &ActorRef, _message: Value) -> Step<()> {
            Err(Flow::raise("NotSupported", "notify in stub", Span::default()))
        }

        fn request(&mut self, _to: &ActorRef, _message: Value, _reply_to: VarRef) -> Step<()> {
            Err(Flow::raise("NotSupported", "request in stub", Span::default()))
        }

        fn stream_request(
            &mut self,
            _to: &ActorRef,
            _message: Value,
            _stream: StreamObj,
        ) -> Step<()> {
            Err(Flow::raise("NotSupported", "stream in stub", Span::default()))
        }

        fn module_at(&mut self, qualifier: &str) -> Step<Value> {
            Err(Flow::raise(
                "ModuleNotFound",
                format!("no module '{qualifier}' in stub"),
                Span::default(),
            ))
        }
    }

    fn run_to_completion(machine: &mut Machine, ops: &mut StubOps) -> StepOutcome {
        loop {
            match machine.compute(ops, 10_000) {
                StepOutcome::Preempt => continue,
                outcome => return outcome,
            }
        }
    }

    #[test]
    fn arithmetic_binds_the_target() {
        let mut machine = Machine::new();
        let mut ops = StubOps::new();
        let x = VarRef::new();
        let env = root_env().extend(vec![(ident("x"), x.clone())]);
        machine.push(
            Arc::new(Instr::bin(
                BinOp::Add,
                Operand::int(1),
                Operand::int(2),
                Operand::ident("x"),
            )),
            env,
        );
        assert!(matches!(
            machine.compute(&mut ops, 100),
            StepOutcome::Completed
        ));
        match x.resolve() {
            ValueOrVar::Value(Value::Int(3)) => {}
            other => panic!("x not bound to 3: {other:?}"),
        }
    }

    #[test]
    fn budget_exhaustion_preempts() {
        let mut machine = Machine::new();
        let mut ops = StubOps::new();
        machine.push(
            Arc::new(Instr::seq(vec![
                Instr::skip(),
                Instr::skip(),
                Instr::skip(),
                Instr::skip(),
            ])),
            root_env().clone(),
        );
        assert!(matches!(machine.compute(&mut ops, 2), StepOutcome::Preempt));
        assert!(!machine.is_idle());
        assert!(matches!(
            machine.compute(&mut ops, 100),
            StepOutcome::Completed
        ));
    }

    #[test]
    fn unbound_operand_suspends_and_resumes() {
        let mut machine = Machine::new();
        let mut ops = StubOps::new();
        let y = VarRef::new();
        let x = VarRef::new();
        let env = root_env().extend(vec![(ident("y"), y.clone()), (ident("x"), x.clone())]);
        machine.push(
            Arc::new(Instr::bin(
                BinOp::Add,
                Operand::ident("y"),
                Operand::int(1),
                Operand::ident("x"),
            )),
            env,
        );
        match machine.compute(&mut ops, 100) {
            StepOutcome::Wait(barrier) => assert!(barrier.same(&y)),
            other => panic!("expected Wait: {other:?}"),
        }
        bind(&y, Value::Int(41)).unwrap();
        assert!(matches!(
            machine.compute(&mut ops, 100),
            StepOutcome::Completed
        ));
        match x.resolve() {
            ValueOrVar::Value(Value::Int(42)) => {}
            other => panic!("x not bound: {other:?}"),
        }
    }

    #[test]
    fn factorial_by_recursion() {
        let fact_def = crate::machine::instr::ProcDef::new(
            &["n", "out"],
            &["fact"],
            Instr::local(
                &["is_base"],
                Instr::seq(vec![
                    Instr::bin(
                        BinOp::Lt,
                        Operand::ident("n"),
                        Operand::int(2),
                        Operand::ident("is_base"),
                    ),
                    Instr::if_else(
                        Operand::ident("is_base"),
                        Instr::bind(Operand::ident("out"), Operand::int(1)),
                        Some(Instr::local(
                            &["n1", "r1"],
                            Instr::seq(vec![
                                Instr::bin(
                                    BinOp::Sub,
                                    Operand::ident("n"),
                                    Operand::int(1),
                                    Operand::ident("n1"),
                                ),
                                Instr::apply(
                                    Operand::ident("fact"),
                                    vec![Operand::ident("n1"), Operand::ident("r1")],
                                ),
                                Instr::bin(
                                    BinOp::Mul,
                                    Operand::ident("n"),
                                    Operand::ident("r1"),
                                    Operand::ident("out"),
                                ),
                            ]),
                        )),
                    ),
                ]),
            ),
        );
        let mut machine = Machine::new();
        let mut ops = StubOps::new();
        let fact = VarRef::new();
        let result = VarRef::new();
        let env = root_env().extend(vec![
            (ident("fact"), fact.clone()),
            (ident("result"), result.clone()),
        ]);
        machine.push(
            Arc::new(Instr::seq(vec![
                Instr::create_proc(fact_def, Operand::ident("fact")),
                Instr::apply(
                    Operand::ident("fact"),
                    vec![Operand::int(10), Operand::ident("result")],
                ),
            ])),
            env,
        );
        assert!(matches!(
            run_to_completion(&mut machine, &mut ops),
            StepOutcome::Completed
        ));
        match result.resolve() {
            ValueOrVar::Value(Value::Int(3_628_800)) => {}
            other => panic!("10! wrong: {other:?}"),
        }
    }

    #[test]
    fn divide_by_zero_halts_uncaught() {
        let mut machine = Machine::new();
        let mut ops = StubOps::new();
        let t = VarRef::new();
        let env = root_env().extend(vec![(ident("t"), t)]);
        machine.push(
            Arc::new(Instr::bin(
                BinOp::Div,
                Operand::int(1),
                Operand::int(0),
                Operand::ident("t"),
            )),
            env,
        );
        match machine.compute(&mut ops, 100) {
            StepOutcome::Halt(detail) => {
                assert!(detail.error.to_string().contains("ArithmeticError"));
                assert!(detail.touched.is_none());
            }
            other => panic!("expected halt: {other:?}"),
        }
    }

    #[test]
    fn try_catches_thrown_error_by_pattern() {
        let mut machine = Machine::new();
        let mut ops = StubOps::new();
        let seen = VarRef::new();
        let env = root_env().extend(vec![(ident("seen"), seen.clone()), (ident("t"), VarRef::new())]);
        let body = Instr::bin(
            BinOp::Div,
            Operand::int(1),
            Operand::int(0),
            Operand::ident("t"),
        );
        let pattern = Pattern::Rec {
            label: Lit::str("error"),
            fields: vec![(Lit::str("message"), Pattern::var("m"))],
            open: true,
        };
        let handler = Instr::bind(Operand::ident("seen"), Operand::ident("m"));
        machine.push(Arc::new(Instr::try_catch(body, pattern, handler)), env);
        assert!(matches!(
            machine.compute(&mut ops, 100),
            StepOutcome::Completed
        ));
        match seen.resolve() {
            ValueOrVar::Value(Value::Str(message)) => assert_eq!(&*message, "divide by zero"),
            other => panic!("handler did not run: {other:?}"),
        }
    }

    #[test]
    fn unmatched_catch_keeps_unwinding() {
        let mut machine = Machine::new();
        let mut ops = StubOps::new();
        let env = root_env().extend(vec![(ident("t"), VarRef::new())]);
        let body = Instr::throw(Operand::str("other"));
        let pattern = Pattern::Lit(Lit::str("expected"));
        machine.push(
            Arc::new(Instr::try_catch(body, pattern, Instr::skip())),
            env,
        );
        match machine.compute(&mut ops, 100) {
            StepOutcome::Halt(detail) => assert_eq!(detail.error, Value::str("other")),
            other => panic!("expected halt: {other:?}"),
        }
    }

    #[test]
    fn case_matches_literals_and_binders() {
        let mut machine = Machine::new();
        let mut ops = StubOps::new();
        let out = VarRef::new();
        let env = root_env().extend(vec![(ident("out"), out.clone())]);
        let program = Instr::local(
            &["subject"],
            Instr::seq(vec![
                Instr::bind(Operand::ident("subject"), Operand::str("goodbye")),
                Instr::case(
                    Operand::ident("subject"),
                    Pattern::Lit(Lit::str("hello")),
                    Instr::bind(Operand::ident("out"), Operand::int(1)),
                    Some(Instr::case(
                        Operand::ident("subject"),
                        Pattern::var("anything"),
                        Instr::bind(Operand::ident("out"), Operand::ident("anything")),
                        None,
                    )),
                ),
            ]),
        );
        machine.push(Arc::new(program), env);
        assert!(matches!(
            machine.compute(&mut ops, 100),
            StepOutcome::Completed
        ));
        match out.resolve() {
            ValueOrVar::Value(Value::Str(s)) => assert_eq!(&*s, "goodbye"),
            other => panic!("case chose wrong branch: {other:?}"),
        }
    }

    #[test]
    fn touching_a_failed_value_halts_with_the_touched_value() {
        let mut machine = Machine::new();
        let mut ops = StubOps::new();
        let failed = Arc::new(FailedValue::new(
            ActorAddress::named("remote"),
            Value::str("boom"),
            "apply at 0..0".to_string(),
            None,
            None,
        ));
        let poisoned = VarRef::bound(Value::Failed(Arc::clone(&failed)));
        let out = VarRef::new();
        let env = root_env().extend(vec![
            (ident("poisoned"), poisoned),
            (ident("out"), out),
        ]);
        machine.push(
            Arc::new(Instr::bin(
                BinOp::Add,
                Operand::ident("poisoned"),
                Operand::int(1),
                Operand::ident("out"),
            )),
            env,
        );
        match machine.compute(&mut ops, 100) {
            StepOutcome::Halt(detail) => {
                let touched = detail.touched.as_ref().map(Arc::clone);
                assert!(touched.is_some_and(|t| Arc::ptr_eq(&t, &failed)));
            }
            other => panic!("expected halt: {other:?}"),
        }
    }

    #[test]
    fn respond_requires_a_complete_value() {
        let mut machine = Machine::new();
        let mut ops = StubOps::new();
        let hole = VarRef::new();
        let env = root_env().extend(vec![(ident("v"), hole.clone())]);
        machine.push(
            Arc::new(Instr::apply(
                Operand::ident("respond"),
                vec![Operand::ident("v")],
            )),
            env,
        );
        match machine.compute(&mut ops, 100) {
            StepOutcome::Wait(barrier) => assert!(barrier.same(&hole)),
            other => panic!("expected Wait: {other:?}"),
        }
        bind(&hole, Value::str("done")).unwrap();
        assert!(matches!(
            machine.compute(&mut ops, 100),
            StepOutcome::Completed
        ));
        assert_eq!(ops.replies, vec![Value::str("done")]);
    }

    #[test]
    fn entailment_suspends_until_both_sides_bind() {
        let mut machine = Machine::new();
        let mut ops = StubOps::new();
        let subject = VarRef::new();
        let out = VarRef::new();
        let env = root_env().extend(vec![
            (ident("subject"), subject.clone()),
            (ident("out"), out.clone()),
        ]);
        machine.push(
            Arc::new(Instr::bin(
                BinOp::Eq,
                Operand::ident("subject"),
                Operand::int(3),
                Operand::ident("out"),
            )),
            env,
        );
        match machine.compute(&mut ops, 100) {
            StepOutcome::Wait(barrier) => assert!(barrier.same(&subject)),
            other => panic!("expected Wait: {other:?}"),
        }
        bind(&subject, Value::Int(3)).unwrap();
        assert!(matches!(
            machine.compute(&mut ops, 100),
            StepOutcome::Completed
        ));
        match out.resolve() {
            ValueOrVar::Value(Value::Bool(true)) => {}
            other => panic!("entailment wrong: {other:?}"),
        }
    }

    #[test]
    fn contradictory_bind_surfaces_as_a_unification_throw() {
        let mut machine = Machine::new();
        let mut ops = StubOps::new();
        let x = VarRef::bound(Value::Int(1));
        let env = root_env().extend(vec![(ident("x"), x)]);
        machine.push(
            Arc::new(Instr::bind(Operand::ident("x"), Operand::int(2))),
            env,
        );
        match machine.compute(&mut ops, 100) {
            StepOutcome::Halt(detail) => {
                assert!(detail.error.to_string().contains("UnificationError"));
            }
            other => panic!("expected halt: {other:?}"),
        }
    }

    #[test]
    fn selecting_into_an_actor_cfg_is_an_error() {
        let mut machine = Machine::new();
        let mut ops = StubOps::new();
        let ctor = crate::value::Closure {
            def: Arc::new(crate::machine::instr::ProcDef::new(&["$h"], &[], Instr::skip())),
            captured: Vec::new(),
        };
        let cfg = VarRef::bound(Value::Obj(Obj::Cfg(ActorCfg::kernel(ctor, Vec::new()))));
        let out = VarRef::new();
        let env = root_env().extend(vec![(ident("cfg"), cfg), (ident("out"), out)]);
        machine.push(
            Arc::new(Instr::select(
                Operand::ident("cfg"),
                Operand::str("handlers"),
                Operand::ident("out"),
            )),
            env,
        );
        match machine.compute(&mut ops, 100) {
            StepOutcome::Halt(detail) => {
                assert!(detail.error.to_string().contains("ActorCfgError"));
            }
            other => panic!("expected halt: {other:?}"),
        }
    }

    #[test]
    fn self_is_unimplemented() {
        let mut machine = Machine::new();
        let mut ops = StubOps::new();
        let env = root_env().extend(vec![(ident("t"), VarRef::new())]);
        machine.push(
            Arc::new(Instr::apply(
                Operand::ident("self"),
                vec![Operand::ident("t")],
            )),
            env,
        );
        match machine.compute(&mut ops, 100) {
            StepOutcome::Halt(detail) => {
                assert!(detail.error.to_string().contains("NotImplemented"));
            }
            other => panic!("expected halt: {other:?}"),
        }
    }
}
