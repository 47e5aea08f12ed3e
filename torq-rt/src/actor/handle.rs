// Layer 1: Standard library imports
use std::fmt::{self, Debug, Display};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use tokio::sync::Notify;

// Layer 3: Internal module imports
use crate::mailbox::Mailbox;
use crate::message::Envelope;
use crate::util::ActorAddress;

/// A cloneable handle for sending envelopes to an actor.
///
/// The handle pairs the actor's address with its mailbox and wakeup signal.
/// Sending is an atomic enqueue followed by a wakeup; the receiving actor
/// re-checks its executability after every wakeup, so a single stored permit
/// is enough.
///
/// Handles compare equal when they address the same actor.
#[derive(Clone)]
pub struct ActorRef {
    address: ActorAddress,
    mailbox: Arc<Mailbox>,
    signal: Arc<Notify>,
}

impl ActorRef {
    pub(crate) fn new(address: ActorAddress, mailbox: Arc<Mailbox>, signal: Arc<Notify>) -> Self {
        Self {
            address,
            mailbox,
            signal,
        }
    }

    /// The actor's address.
    pub fn address(&self) -> &ActorAddress {
        &self.address
    }

    /// Enqueue an envelope and wake the actor.
    pub(crate) fn send(&self, envelope: Envelope) {
        self.mailbox.insert(envelope);
        self.signal.notify_one();
    }
}

impl PartialEq for ActorRef {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address
    }
}

impl Eq for ActorRef {}

impl Display for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)
    }
}

impl Debug for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ActorRef({})", self.address)
    }
}
