// Layer 1: Standard library imports
use std::fmt::{self, Debug};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use parking_lot::Mutex;

// Layer 3: Internal module imports
use super::obj::StreamObj;
use crate::machine::instr::Span;
use crate::machine::interp::{Flow, Step};
use crate::store::var::{unify, VarRef};
use crate::value::{Value, ValueOrVar};

/// An iterator over a stream.
///
/// Applying the iterator with one argument delivers the next element into
/// the caller's cell:
///
/// - an unbound head is unified with the caller's cell (reverse dataflow:
///   the iterator advertises its hole) and the iterator marks itself
///   *waiting*;
/// - while waiting, a still-unbound head suspends the caller on that cell;
///   once it binds, the cursor advances and waiting clears;
/// - a bound head binds the caller's cell and advances — unless the head is
///   `Eof`, which is terminal and repeats on every further application.
#[derive(Clone)]
pub struct StreamIter {
    inner: Arc<Mutex<IterState>>,
}

struct IterState {
    stream: StreamObj,
    pos: usize,
    waiting: bool,
}

impl StreamIter {
    /// An iterator positioned at the stream's first cell.
    pub(crate) fn new(stream: StreamObj) -> Self {
        Self {
            inner: Arc::new(Mutex::new(IterState {
                stream,
                pos: 0,
                waiting: false,
            })),
        }
    }

    /// Identity comparison.
    pub fn same_identity(&self, other: &StreamIter) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Deliver the next element into `target`.
    pub(crate) fn next_into(&self, target: &ValueOrVar, span: Span) -> Step<()> {
        let head = {
            let mut state = self.inner.lock();
            if state.waiting {
                let head = current_cell(&state)?;
                match head.resolve() {
                    ValueOrVar::Var(unbound) => return Err(Flow::Wait(unbound)),
                    ValueOrVar::Value(Value::Eof) => {
                        // Terminal; stay put, deliver Eof again below.
                        state.waiting = false;
                    }
                    ValueOrVar::Value(_) => {
                        // The reverse-bound hole was filled; move past it.
                        state.pos += 1;
                        state.waiting = false;
                    }
                }
            }
            let head = current_cell(&state)?;
            match head.resolve() {
                ValueOrVar::Var(hole) => {
                    state.waiting = true;
                    Hole::Advertise(hole)
                }
                ValueOrVar::Value(Value::Eof) => Hole::Deliver(Value::Eof),
                ValueOrVar::Value(value) => {
                    state.pos += 1;
                    Hole::Deliver(value)
                }
            }
        };
        match head {
            Hole::Advertise(hole) => unify_into(&ValueOrVar::Var(hole), target, span),
            Hole::Deliver(value) => unify_into(&ValueOrVar::Value(value), target, span),
        }
    }
}

enum Hole {
    Advertise(VarRef),
    Deliver(Value),
}

fn current_cell(state: &IterState) -> Step<VarRef> {
    state.stream.cell(state.pos).ok_or_else(|| {
        Flow::raise(
            "StreamError",
            "iterator advanced past the stream tail",
            Span::default(),
        )
    })
}

fn unify_into(source: &ValueOrVar, target: &ValueOrVar, span: Span) -> Step<()> {
    unify(source, target).map_err(|err| Flow::raise("UnificationError", err.message(), span))
}

impl Debug for StreamIter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_lock() {
            Some(state) => write!(
                f,
                "Iter(pos {}{})",
                state.pos,
                if state.waiting { ", waiting" } else { "" }
            ),
            None => write!(f, "Iter(<locked>)"),
        }
    }
}
