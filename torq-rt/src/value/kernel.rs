// Layer 1: Standard library imports
use std::fmt::{self, Debug, Display};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use rust_decimal::Decimal;

// Layer 3: Internal module imports
use super::failed::FailedValue;
use super::lit::Lit;
use super::obj::Obj;
use super::proc_def::Proc;
use super::rec::{Rec, TupleVal};
use crate::store::var::VarRef;

/// A kernel value.
///
/// Values are dynamically tagged; the runtime performs no general type
/// checking beyond what each operation requires. Composite values (records,
/// tuples, closures) hold [`ValueOrVar`] slots, so a value may be *Partial*
/// while the enclosing allocation stays immutable: the nested variables bind
/// later, the structure never changes identity.
///
/// Cloning is cheap; all composite payloads are `Arc`-shared.
#[derive(Clone)]
pub enum Value {
    /// Boolean.
    Bool(bool),
    /// 64-bit signed integer.
    Int(i64),
    /// 128-bit decimal.
    Dec(Decimal),
    /// Character.
    Char(char),
    /// String.
    Str(Arc<str>),
    /// The unit singleton.
    Nothing,
    /// End-of-stream singleton.
    Eof,
    /// Labeled record with literal features.
    Rec(Rec),
    /// Labeled tuple (record with features `0..n-1`, insertion order).
    Tuple(TupleVal),
    /// Procedure: kernel closure or runtime intrinsic.
    Proc(Proc),
    /// Opaque native object (actor ref, stream, iterator, actor cfg).
    Obj(Obj),
    /// A failed value produced by a halted actor.
    Failed(Arc<FailedValue>),
}

impl Value {
    /// Convenience constructor for string values.
    pub fn str(s: impl AsRef<str>) -> Self {
        Self::Str(Arc::from(s.as_ref()))
    }

    /// A short tag describing this value's class, for diagnostics.
    pub fn type_label(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Dec(_) => "dec",
            Value::Char(_) => "char",
            Value::Str(_) => "str",
            Value::Nothing => "nothing",
            Value::Eof => "eof",
            Value::Rec(_) => "rec",
            Value::Tuple(_) => "tuple",
            Value::Proc(_) => "proc",
            Value::Obj(_) => "obj",
            Value::Failed(_) => "failed",
        }
    }

    /// View this value as a literal, when it is one.
    pub fn as_lit(&self) -> Option<Lit> {
        match self {
            Value::Bool(b) => Some(Lit::Bool(*b)),
            Value::Int(i) => Some(Lit::Int(*i)),
            Value::Char(c) => Some(Lit::Char(*c)),
            Value::Str(s) => Some(Lit::Str(Arc::clone(s))),
            Value::Nothing => Some(Lit::Nothing),
            Value::Eof => Some(Lit::Eof),
            _ => None,
        }
    }
}

impl From<Lit> for Value {
    fn from(lit: Lit) -> Self {
        match lit {
            Lit::Nothing => Value::Nothing,
            Lit::Eof => Value::Eof,
            Lit::Bool(b) => Value::Bool(b),
            Lit::Int(i) => Value::Int(i),
            Lit::Char(c) => Value::Char(c),
            Lit::Str(s) => Value::Str(s),
        }
    }
}

/// Structural equality over the resolved value graph.
///
/// Primitives compare by value (with int/dec numeric equality), composites
/// recurse through resolved slots, and procedures, objects, and failed
/// values compare by identity. An unbound slot is only equal to itself.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Dec(a), Value::Dec(b)) => a == b,
            (Value::Int(a), Value::Dec(b)) | (Value::Dec(b), Value::Int(a)) => {
                Decimal::from(*a) == *b
            }
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Nothing, Value::Nothing) => true,
            (Value::Eof, Value::Eof) => true,
            (Value::Rec(a), Value::Rec(b)) => a.structurally_equal(b),
            (Value::Tuple(a), Value::Tuple(b)) => a.structurally_equal(b),
            (Value::Proc(a), Value::Proc(b)) => a.same_identity(b),
            (Value::Obj(a), Value::Obj(b)) => a.same_identity(b),
            (Value::Failed(a), Value::Failed(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Dec(d) => write!(f, "{d}m"),
            Value::Char(c) => write!(f, "&{c}"),
            Value::Str(s) => write!(f, "'{s}'"),
            Value::Nothing => write!(f, "nothing"),
            Value::Eof => write!(f, "eof"),
            Value::Rec(r) => write!(f, "{r}"),
            Value::Tuple(t) => write!(f, "{t}"),
            Value::Proc(p) => write!(f, "{p}"),
            Value::Obj(o) => write!(f, "{o}"),
            Value::Failed(fv) => write!(f, "<failed at {}>", fv.actor_address),
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

/// A store slot: either a value or a dataflow variable.
#[derive(Clone)]
pub enum ValueOrVar {
    /// A (possibly partial) value.
    Value(Value),
    /// A dataflow variable.
    Var(VarRef),
}

impl ValueOrVar {
    /// Resolve to either a bound value or the canonical unbound variable.
    pub fn resolved(&self) -> ValueOrVar {
        match self {
            ValueOrVar::Value(v) => ValueOrVar::Value(v.clone()),
            ValueOrVar::Var(var) => var.resolve(),
        }
    }
}

impl From<Value> for ValueOrVar {
    fn from(v: Value) -> Self {
        ValueOrVar::Value(v)
    }
}

impl From<VarRef> for ValueOrVar {
    fn from(v: VarRef) -> Self {
        ValueOrVar::Var(v)
    }
}

impl Display for ValueOrVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.resolved() {
            ValueOrVar::Value(v) => write!(f, "{v}"),
            ValueOrVar::Var(_) => write!(f, "_"),
        }
    }
}

impl Debug for ValueOrVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}
