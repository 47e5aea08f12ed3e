// Layer 1: Standard library imports
use std::fmt::{self, Debug};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use parking_lot::Mutex;

// Layer 3: Internal module imports
use crate::actor::handle::ActorRef;
use crate::store::var::{bind, UnifyError, VarRef};
use crate::value::{FailedValue, Value};

/// A lazy stream object.
///
/// Holds the publisher reference, the request to (re-)issue, and the cell
/// list. Every cell except the last is bound or will be bound by the
/// response pipeline; the last cell is the unbound tail. The stream reaches
/// its terminal state when the tail binds to `Eof`.
#[derive(Clone)]
pub struct StreamObj {
    inner: Arc<Mutex<StreamState>>,
}

struct StreamState {
    publisher: ActorRef,
    request: Value,
    cells: Vec<VarRef>,
}

impl StreamObj {
    /// A fresh stream with one unbound tail cell.
    pub(crate) fn new(publisher: ActorRef, request: Value) -> Self {
        Self {
            inner: Arc::new(Mutex::new(StreamState {
                publisher,
                request,
                cells: vec![VarRef::new()],
            })),
        }
    }

    /// The publisher this stream fetches from.
    pub(crate) fn publisher(&self) -> ActorRef {
        self.inner.lock().publisher.clone()
    }

    /// The request to issue for more elements.
    pub(crate) fn request(&self) -> Value {
        self.inner.lock().request.clone()
    }

    /// The cell at `index`, while it exists.
    pub(crate) fn cell(&self, index: usize) -> Option<VarRef> {
        self.inner.lock().cells.get(index).cloned()
    }

    /// Identity comparison.
    pub fn same_identity(&self, other: &StreamObj) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// A failed publisher: the tail binds to the failed value and a fresh
    /// tail is appended, so iteration observes the failure in order.
    pub(crate) fn push_failed(&self, failed: Arc<FailedValue>) -> Result<(), UnifyError> {
        let tail = {
            let mut state = self.inner.lock();
            let tail = state.cells[state.cells.len() - 1].clone();
            state.cells.push(VarRef::new());
            tail
        };
        bind(&tail, Value::Failed(failed))
    }

    /// Terminal state: the tail binds to `Eof` and no fresh tail is
    /// appended.
    pub(crate) fn close_with_eof(&self) -> Result<(), UnifyError> {
        let tail = {
            let state = self.inner.lock();
            state.cells[state.cells.len() - 1].clone()
        };
        bind(&tail, Value::Eof)
    }

    /// A non-empty batch: the first value binds the current tail, the rest
    /// are appended pre-bound, and a fresh unbound tail is appended.
    pub(crate) fn append_batch(&self, mut values: Vec<Value>) -> Result<(), UnifyError> {
        if values.is_empty() {
            return Ok(());
        }
        let first = values.remove(0);
        let tail = {
            let mut state = self.inner.lock();
            let tail = state.cells[state.cells.len() - 1].clone();
            for value in values {
                state.cells.push(VarRef::bound(value));
            }
            state.cells.push(VarRef::new());
            tail
        };
        bind(&tail, first)
    }
}

impl Debug for StreamObj {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_lock() {
            Some(state) => write!(f, "Stream({} cells)", state.cells.len()),
            None => write!(f, "Stream(<locked>)"),
        }
    }
}
