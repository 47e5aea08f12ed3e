// Layer 1: Standard library imports
use std::collections::HashSet;
use std::fmt::{self, Debug};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use parking_lot::Mutex;

// Layer 3: Internal module imports
use crate::value::{Obj, Proc, Value, ValueOrVar};

/// A one-shot bind callback: fires with the newly bound value.
pub type BindCallback = Box<dyn FnOnce(&Value) + Send>;

/// A single-assignment dataflow variable.
///
/// The cell is in one of three states: *unbound* (holding registered
/// bind-callbacks), *linked* (union-find forward pointer into its
/// equivalence class), or *bound* (holding a value which may itself be
/// partial). Cells are shared by `Arc`; identity is allocation identity.
///
/// Each variable is conceptually owned by its home actor and is only
/// mutated during that actor's turn; the mutex makes the cell safe to carry
/// inside values that cross threads once complete.
///
/// # Example
/// ```rust
/// use torq_rt::store::{bind, VarRef};
/// use torq_rt::value::Value;
///
/// let v = VarRef::new();
/// assert!(!v.is_bound());
/// bind(&v, Value::Int(7)).unwrap();
/// assert!(v.is_bound());
/// // A compatible re-bind is a no-op; a contradiction is an error.
/// bind(&v, Value::Int(7)).unwrap();
/// assert!(bind(&v, Value::Int(8)).is_err());
/// ```
#[derive(Clone)]
pub struct VarRef(Arc<Mutex<VarCell>>);

enum VarCell {
    Unbound { callbacks: Vec<BindCallback> },
    Link(VarRef),
    Bound(Value),
}

impl VarRef {
    /// Create a fresh unbound variable.
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(VarCell::Unbound {
            callbacks: Vec::new(),
        })))
    }

    /// Create a variable already bound to `value`.
    pub fn bound(value: Value) -> Self {
        Self(Arc::new(Mutex::new(VarCell::Bound(value))))
    }

    /// Stable identity for visited-sets and diagnostics.
    pub fn id(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    /// True when `self` and `other` are the same cell.
    pub fn same(&self, other: &VarRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// True when the variable (transitively) holds a value.
    pub fn is_bound(&self) -> bool {
        matches!(self.resolve(), ValueOrVar::Value(_))
    }

    /// Walk the representative chain: the bound value, or the canonical
    /// unbound variable of the equivalence class.
    pub fn resolve(&self) -> ValueOrVar {
        enum After {
            Value(Value),
            Unbound,
            Follow(VarRef),
        }
        let mut current = self.rep();
        loop {
            let after = {
                let guard = current.0.lock();
                match &*guard {
                    VarCell::Bound(value) => After::Value(value.clone()),
                    VarCell::Unbound { .. } => After::Unbound,
                    VarCell::Link(next) => After::Follow(next.clone()),
                }
            };
            match after {
                After::Value(value) => return ValueOrVar::Value(value),
                After::Unbound => return ValueOrVar::Var(current),
                After::Follow(next) => current = next,
            }
        }
    }

    /// Register a callback to fire when this variable binds.
    ///
    /// If the variable is already bound the callback fires immediately.
    /// Callbacks are never invoked while the cell lock is held, so a
    /// callback may freely operate on other variables.
    pub fn on_bind(&self, callback: BindCallback) {
        enum After {
            Registered,
            Fire(Value),
            Follow(VarRef),
        }
        let mut slot = Some(callback);
        let mut current = self.rep();
        loop {
            let after = {
                let mut guard = current.0.lock();
                match &mut *guard {
                    VarCell::Unbound { callbacks } => {
                        if let Some(callback) = slot.take() {
                            callbacks.push(callback);
                        }
                        After::Registered
                    }
                    VarCell::Bound(value) => After::Fire(value.clone()),
                    VarCell::Link(next) => After::Follow(next.clone()),
                }
            };
            match after {
                After::Registered => return,
                After::Fire(value) => {
                    if let Some(callback) = slot.take() {
                        callback(&value);
                    }
                    return;
                }
                After::Follow(next) => current = next,
            }
        }
    }

    /// Find the representative cell, compressing the first link on the way.
    fn rep(&self) -> VarRef {
        let mut current = self.clone();
        loop {
            let next = {
                let guard = current.0.lock();
                match &*guard {
                    VarCell::Link(next) => next.clone(),
                    _ => break,
                }
            };
            current = next;
        }
        if !self.same(&current) {
            let mut guard = self.0.lock();
            if let VarCell::Link(next) = &mut *guard {
                *next = current.clone();
            }
        }
        current
    }
}

impl Default for VarRef {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for VarRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_lock() {
            Some(guard) => match &*guard {
                VarCell::Unbound { .. } => write!(f, "Var(_)"),
                VarCell::Link(_) => write!(f, "Var(->)"),
                VarCell::Bound(v) => write!(f, "Var({v})"),
            },
            None => write!(f, "Var(<locked>)"),
        }
    }
}

/// Structural mismatch during unification.
///
/// Surfaced to kernel code as a thrown `error#{name: 'UnificationError'}`
/// record; within the store it is a plain error value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnifyError {
    /// Rendering of the left operand.
    pub left: String,
    /// Rendering of the right operand.
    pub right: String,
}

impl UnifyError {
    fn of(left: &Value, right: &Value) -> Self {
        Self {
            left: left.to_string(),
            right: right.to_string(),
        }
    }

    /// Human-readable mismatch description.
    pub fn message(&self) -> String {
        format!("cannot unify {} with {}", self.left, self.right)
    }
}

/// Bind a variable to a value (dataflow unification against any existing
/// binding).
pub fn bind(var: &VarRef, value: Value) -> Result<(), UnifyError> {
    unify(
        &ValueOrVar::Var(var.clone()),
        &ValueOrVar::Value(value),
    )
}

/// Unify two slots.
///
/// - Two unbound variables merge equivalence classes and share callbacks.
/// - An unbound variable binds to the value, firing callbacks exactly once
///   in registration order.
/// - Two values unify structurally: equal primitives succeed; records unify
///   field-wise over common features under an equal label; tuples unify
///   positionally under equal label and arity; procedures and objects unify
///   by identity. Anything else is a [`UnifyError`].
pub fn unify(a: &ValueOrVar, b: &ValueOrVar) -> Result<(), UnifyError> {
    match (a.resolved(), b.resolved()) {
        (ValueOrVar::Var(x), ValueOrVar::Var(y)) => {
            if !x.same(&y) {
                merge_classes(&x, &y);
            }
            Ok(())
        }
        (ValueOrVar::Var(x), ValueOrVar::Value(v))
        | (ValueOrVar::Value(v), ValueOrVar::Var(x)) => bind_rep(&x, v),
        (ValueOrVar::Value(u), ValueOrVar::Value(v)) => unify_values(&u, &v),
    }
}

/// Link `from` into `to`'s class, moving callbacks onto the survivor.
fn merge_classes(from: &VarRef, to: &VarRef) {
    let callbacks = {
        let mut guard = from.0.lock();
        match &mut *guard {
            VarCell::Unbound { callbacks } => {
                let moved = std::mem::take(callbacks);
                *guard = VarCell::Link(to.clone());
                moved
            }
            // Raced into another state; fall back to re-registration below.
            _ => Vec::new(),
        }
    };
    for callback in callbacks {
        to.on_bind(callback);
    }
}

/// Set the representative's payload and fire its callbacks.
fn bind_rep(rep: &VarRef, value: Value) -> Result<(), UnifyError> {
    enum AfterLock {
        Fire(Vec<BindCallback>),
        Against(Value),
        Follow(VarRef),
    }
    let action = {
        let mut guard = rep.0.lock();
        match &mut *guard {
            VarCell::Unbound { callbacks } => {
                let moved = std::mem::take(callbacks);
                *guard = VarCell::Bound(value.clone());
                AfterLock::Fire(moved)
            }
            VarCell::Bound(existing) => AfterLock::Against(existing.clone()),
            VarCell::Link(next) => AfterLock::Follow(next.clone()),
        }
    };
    match action {
        AfterLock::Fire(callbacks) => {
            for callback in callbacks {
                callback(&value);
            }
            Ok(())
        }
        AfterLock::Against(existing) => unify_values(&existing, &value),
        AfterLock::Follow(next) => bind_rep(&next.rep(), value),
    }
}

fn unify_values(u: &Value, v: &Value) -> Result<(), UnifyError> {
    match (u, v) {
        (Value::Bool(a), Value::Bool(b)) if a == b => Ok(()),
        (Value::Int(a), Value::Int(b)) if a == b => Ok(()),
        (Value::Dec(a), Value::Dec(b)) if a == b => Ok(()),
        (Value::Int(a), Value::Dec(b)) | (Value::Dec(b), Value::Int(a))
            if rust_decimal::Decimal::from(*a) == *b =>
        {
            Ok(())
        }
        (Value::Char(a), Value::Char(b)) if a == b => Ok(()),
        (Value::Str(a), Value::Str(b)) if a == b => Ok(()),
        (Value::Nothing, Value::Nothing) => Ok(()),
        (Value::Eof, Value::Eof) => Ok(()),
        (Value::Rec(a), Value::Rec(b)) => unify_recs(u, v, a, b),
        (Value::Tuple(a), Value::Tuple(b)) => unify_tuples(u, v, a, b),
        (Value::Proc(a), Value::Proc(b)) => {
            if proc_identity(a, b) {
                Ok(())
            } else {
                Err(UnifyError::of(u, v))
            }
        }
        (Value::Obj(a), Value::Obj(b)) => {
            if Obj::same_identity(a, b) {
                Ok(())
            } else {
                Err(UnifyError::of(u, v))
            }
        }
        (Value::Failed(a), Value::Failed(b)) if Arc::ptr_eq(a, b) => Ok(()),
        _ => Err(UnifyError::of(u, v)),
    }
}

fn proc_identity(a: &Proc, b: &Proc) -> bool {
    a.same_identity(b)
}

/// Records unify under an equal label by unifying the slots of common
/// features; a feature present on only one side is tolerated (the union
/// reading — the representative keeps its payload).
fn unify_recs(
    u: &Value,
    v: &Value,
    a: &crate::value::Rec,
    b: &crate::value::Rec,
) -> Result<(), UnifyError> {
    if a.same_identity(b) {
        return Ok(());
    }
    if a.label() != b.label() {
        return Err(UnifyError::of(u, v));
    }
    // Both field lists are feature-sorted; merge-walk the common features.
    let lhs: Vec<_> = a.fields().collect();
    let rhs: Vec<_> = b.fields().collect();
    let (mut i, mut j) = (0, 0);
    while i < lhs.len() && j < rhs.len() {
        let (fa, sa) = lhs[i];
        let (fb, sb) = rhs[j];
        match fa.cmp(fb) {
            std::cmp::Ordering::Equal => {
                unify(sa, sb)?;
                i += 1;
                j += 1;
            }
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
        }
    }
    Ok(())
}

fn unify_tuples(
    u: &Value,
    v: &Value,
    a: &crate::value::TupleVal,
    b: &crate::value::TupleVal,
) -> Result<(), UnifyError> {
    if a.same_identity(b) {
        return Ok(());
    }
    if a.label() != b.label() || a.len() != b.len() {
        return Err(UnifyError::of(u, v));
    }
    for (sa, sb) in a.items().zip(b.items()) {
        unify(sa, sb)?;
    }
    Ok(())
}

/// Why a slot is not (yet) Complete.
#[derive(Debug, Clone)]
pub enum Incomplete {
    /// The first unbound sub-variable encountered — the barrier.
    Wait(VarRef),
    /// The value can never become Complete (streams, iterators).
    Uncompletable(&'static str),
}

/// Check that a slot transitively resolves to a Complete value.
///
/// Returns the resolved top-level value on success; otherwise the first
/// unbound sub-variable as the barrier, or [`Incomplete::Uncompletable`] for
/// value kinds that can never be Complete. Failed values count as Complete
/// (they travel; touching them is the caller's concern).
pub fn check_complete(slot: &ValueOrVar) -> Result<Value, Incomplete> {
    match slot.resolved() {
        ValueOrVar::Var(v) => Err(Incomplete::Wait(v)),
        ValueOrVar::Value(v) => {
            let mut visited = HashSet::new();
            walk_value(&v, &mut visited)?;
            Ok(v)
        }
    }
}

fn walk_slot(slot: &ValueOrVar, visited: &mut HashSet<usize>) -> Result<(), Incomplete> {
    match slot {
        ValueOrVar::Value(v) => walk_value(v, visited),
        ValueOrVar::Var(var) => match var.resolve() {
            ValueOrVar::Var(unbound) => Err(Incomplete::Wait(unbound)),
            ValueOrVar::Value(v) => {
                // Guard against cycles through variables.
                if visited.insert(var.rep().id()) {
                    walk_value(&v, visited)
                } else {
                    Ok(())
                }
            }
        },
    }
}

fn walk_value(value: &Value, visited: &mut HashSet<usize>) -> Result<(), Incomplete> {
    match value {
        Value::Bool(_)
        | Value::Int(_)
        | Value::Dec(_)
        | Value::Char(_)
        | Value::Str(_)
        | Value::Nothing
        | Value::Eof
        | Value::Failed(_) => Ok(()),
        Value::Rec(rec) => {
            for (_, slot) in rec.fields() {
                walk_slot(slot, visited)?;
            }
            Ok(())
        }
        Value::Tuple(tuple) => {
            for slot in tuple.items() {
                walk_slot(slot, visited)?;
            }
            Ok(())
        }
        Value::Proc(Proc::Kernel(closure)) => {
            for (_, var) in &closure.captured {
                walk_slot(&ValueOrVar::Var(var.clone()), visited)?;
            }
            Ok(())
        }
        Value::Proc(Proc::Native(_)) => Ok(()),
        Value::Obj(Obj::Actor(_)) => Ok(()),
        Value::Obj(Obj::Stream(_)) => Err(Incomplete::Uncompletable("stream")),
        Value::Obj(Obj::Iter(_)) => Err(Incomplete::Uncompletable("iterator")),
        Value::Obj(Obj::Cfg(cfg)) => walk_cfg(cfg, visited),
    }
}

fn walk_cfg(
    cfg: &crate::value::ActorCfg,
    visited: &mut HashSet<usize>,
) -> Result<(), Incomplete> {
    use crate::value::obj::CfgKind;
    match &*cfg.0 {
        CfgKind::Kernel { ctor, args } => {
            for (_, var) in &ctor.captured {
                walk_slot(&ValueOrVar::Var(var.clone()), visited)?;
            }
            for arg in args {
                walk_value(arg, visited)?;
            }
            Ok(())
        }
        CfgKind::Native { .. } => Ok(()),
    }
}
