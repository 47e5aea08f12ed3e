//! Envelopes and message kinds.
//!
//! Every cross-actor interaction is an [`Envelope`]: control (priority 0),
//! response (priority 1), or notify/request (priority 2). An envelope
//! carries the message value, the optional requester reference, and the
//! request id the original requester chose (echoed verbatim in responses).

pub mod envelope;

pub use envelope::{
    ControlMsg, Envelope, RequestId, PRIORITY_CONTROL, PRIORITY_MESSAGE, PRIORITY_RESPONSE,
};
