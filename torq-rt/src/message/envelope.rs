// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use crate::actor::handle::ActorRef;
use crate::machine::instr::Instr;
use crate::store::env::Env;
use crate::store::var::VarRef;
use crate::stream::obj::StreamObj;
use crate::util::MessageId;
use crate::value::{ActorCfg, Value};

/// Priority of control envelopes.
pub const PRIORITY_CONTROL: u8 = 0;
/// Priority of response envelopes.
pub const PRIORITY_RESPONSE: u8 = 1;
/// Priority of notify and request envelopes.
pub const PRIORITY_MESSAGE: u8 = 2;

/// Runtime control messages, delivered at the highest priority.
#[derive(Debug, Clone)]
pub enum ControlMsg {
    /// Re-enter `compute` after a preemption.
    Resume,
    /// Install the actor's handler (first-time only).
    Configure {
        /// The configuration to apply.
        cfg: ActorCfg,
    },
    /// Cooperative termination.
    Stop,
    /// A child computation's body and translated environment.
    Act {
        /// The computation.
        body: Arc<Instr>,
        /// Environment with captured cells translated for the child.
        env: Env,
    },
    /// Bind a child-side variable with a value propagated from the parent.
    SyncVar {
        /// The child-side variable.
        var: VarRef,
        /// The Complete value to bind.
        value: Value,
    },
}

/// The opaque token a requester attaches to its request, echoed verbatim in
/// every response to it.
#[derive(Debug, Clone)]
pub enum RequestId {
    /// The response binds this variable (in-process requesters).
    Var(VarRef),
    /// The response feeds this stream's cell pipeline.
    Stream(StreamObj),
    /// External client correlation.
    Client(MessageId),
}

/// A message together with sender, request id, and kind.
///
/// Kind determines mailbox priority: control 0, response 1, notify and
/// request 2.
#[derive(Debug, Clone)]
pub enum Envelope {
    /// A runtime control message.
    Control {
        /// The control payload.
        msg: ControlMsg,
        /// Requester to acknowledge (`Stop`) or respond to (`Act`).
        requester: Option<ActorRef>,
        /// Request id for the acknowledgement or response.
        request_id: Option<RequestId>,
    },
    /// A request expecting exactly one response (streams excepted).
    Request {
        /// The message value (Complete).
        message: Value,
        /// Who to respond to.
        requester: ActorRef,
        /// The requester's token.
        request_id: RequestId,
    },
    /// A one-way message.
    Notify {
        /// The message value (Complete).
        message: Value,
        /// Optional sender reference.
        sender: Option<ActorRef>,
    },
    /// The answer to a request.
    Response {
        /// The response value (Complete, possibly a failed value).
        message: Value,
        /// The originating request's token, echoed.
        request_id: RequestId,
    },
}

impl Envelope {
    /// A control envelope with no reply expectation.
    pub fn control(msg: ControlMsg) -> Self {
        Envelope::Control {
            msg,
            requester: None,
            request_id: None,
        }
    }

    /// Mailbox priority (lower runs earlier).
    pub fn priority(&self) -> u8 {
        match self {
            Envelope::Control { .. } => PRIORITY_CONTROL,
            Envelope::Response { .. } => PRIORITY_RESPONSE,
            Envelope::Request { .. } | Envelope::Notify { .. } => PRIORITY_MESSAGE,
        }
    }

    /// True for control envelopes.
    pub fn is_control(&self) -> bool {
        matches!(self, Envelope::Control { .. })
    }

    /// True for responses.
    pub fn is_response(&self) -> bool {
        matches!(self, Envelope::Response { .. })
    }

    /// True for requests.
    pub fn is_request(&self) -> bool {
        matches!(self, Envelope::Request { .. })
    }

    /// True for notifies.
    pub fn is_notify(&self) -> bool {
        matches!(self, Envelope::Notify { .. })
    }

    /// The message value, when the envelope carries one.
    pub fn message(&self) -> Option<&Value> {
        match self {
            Envelope::Request { message, .. }
            | Envelope::Notify { message, .. }
            | Envelope::Response { message, .. } => Some(message),
            Envelope::Control { .. } => None,
        }
    }

    /// The reference to answer, when present.
    pub fn requester(&self) -> Option<&ActorRef> {
        match self {
            Envelope::Request { requester, .. } => Some(requester),
            Envelope::Control { requester, .. } => requester.as_ref(),
            Envelope::Notify { sender, .. } => sender.as_ref(),
            Envelope::Response { .. } => None,
        }
    }

    /// The request token, when present.
    pub fn request_id(&self) -> Option<&RequestId> {
        match self {
            Envelope::Request { request_id, .. } | Envelope::Response { request_id, .. } => {
                Some(request_id)
            }
            Envelope::Control { request_id, .. } => request_id.as_ref(),
            Envelope::Notify { .. } => None,
        }
    }
}
