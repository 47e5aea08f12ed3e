// Layer 1: Standard library imports
use std::sync::Arc;
use std::time::Duration;

// Layer 2: Third-party crate imports
use tokio::sync::Notify;
use tokio::time::{timeout_at, Instant};

// Layer 3: Internal module imports
use super::errors::ClientError;
use crate::actor::handle::ActorRef;
use crate::mailbox::Mailbox;
use crate::message::{Envelope, RequestId};
use crate::util::{ActorAddress, MessageId};
use crate::value::{Lit, Value, ValueOrVar};

/// An external request endpoint.
///
/// The client owns a mailbox and presents itself to actors through a regular
/// [`ActorRef`], so the envelope contract is uniform: it sends a request
/// stamped with a fresh [`MessageId`] and awaits the response envelope with
/// a timeout.
///
/// # Example
/// ```rust,ignore
/// use std::time::Duration;
/// use torq_rt::system::RequestClient;
/// use torq_rt::value::Value;
///
/// # async fn example(actor: torq_rt::actor::ActorRef) {
/// let client = RequestClient::new();
/// let response = client
///     .send_and_await_response(&actor, Value::str("hello"), Duration::from_secs(5))
///     .await
///     .unwrap();
/// # }
/// ```
pub struct RequestClient {
    endpoint: ActorRef,
    mailbox: Arc<Mailbox>,
    signal: Arc<Notify>,
}

impl RequestClient {
    /// A client with an anonymous address.
    pub fn new() -> Self {
        Self::with_address(ActorAddress::anonymous())
    }

    /// A client with the given address.
    pub fn with_address(address: ActorAddress) -> Self {
        let mailbox = Arc::new(Mailbox::new());
        let signal = Arc::new(Notify::new());
        Self {
            endpoint: ActorRef::new(address, Arc::clone(&mailbox), Arc::clone(&signal)),
            mailbox,
            signal,
        }
    }

    /// This client's address.
    pub fn address(&self) -> &ActorAddress {
        self.endpoint.address()
    }

    /// Send a request; the returned id correlates the response.
    pub fn send(&self, to: &ActorRef, message: Value) -> MessageId {
        let id = MessageId::new();
        to.send(Envelope::Request {
            message,
            requester: self.endpoint.clone(),
            request_id: RequestId::Client(id),
        });
        id
    }

    /// Await the next response envelope and return its value — which may be
    /// a failed value.
    pub async fn await_response(&self, timeout: Duration) -> Result<Value, ClientError> {
        let deadline = Instant::now() + timeout;
        loop {
            while let Some(envelope) = self.mailbox.remove_next() {
                if let Envelope::Response { message, .. } = envelope {
                    return Ok(message);
                }
            }
            if timeout_at(deadline, self.signal.notified()).await.is_err() {
                return Err(ClientError::ResponseTimeout(timeout));
            }
        }
    }

    /// Fused send and await.
    pub async fn send_and_await_response(
        &self,
        to: &ActorRef,
        message: Value,
        timeout: Duration,
    ) -> Result<Value, ClientError> {
        self.send(to, message);
        self.await_response(timeout).await
    }
}

impl Default for RequestClient {
    fn default() -> Self {
        Self::new()
    }
}

/// An external stream consumer endpoint.
///
/// Sends one request and collects response envelopes until the publisher
/// signals `Eof#{more: false}` (or fails); returns the collected envelopes,
/// terminal included.
pub struct StreamClient {
    endpoint: ActorRef,
    mailbox: Arc<Mailbox>,
    signal: Arc<Notify>,
}

impl StreamClient {
    /// A client with an anonymous address.
    pub fn new() -> Self {
        Self::with_address(ActorAddress::anonymous())
    }

    /// A client with the given address.
    pub fn with_address(address: ActorAddress) -> Self {
        let mailbox = Arc::new(Mailbox::new());
        let signal = Arc::new(Notify::new());
        Self {
            endpoint: ActorRef::new(address, Arc::clone(&mailbox), Arc::clone(&signal)),
            mailbox,
            signal,
        }
    }

    /// This client's address.
    pub fn address(&self) -> &ActorAddress {
        self.endpoint.address()
    }

    /// Send the stream request.
    pub fn send(&self, to: &ActorRef, message: Value) -> MessageId {
        let id = MessageId::new();
        to.send(Envelope::Request {
            message,
            requester: self.endpoint.clone(),
            request_id: RequestId::Client(id),
        });
        id
    }

    /// Collect response envelopes until end-of-stream.
    pub async fn await_eof(&self, timeout: Duration) -> Result<Vec<Envelope>, ClientError> {
        let deadline = Instant::now() + timeout;
        let mut collected = Vec::new();
        loop {
            while let Some(envelope) = self.mailbox.remove_next() {
                let terminal = is_terminal(&envelope);
                if envelope.is_response() {
                    collected.push(envelope);
                }
                if terminal {
                    return Ok(collected);
                }
            }
            if timeout_at(deadline, self.signal.notified()).await.is_err() {
                return Err(ClientError::EofTimeout(timeout));
            }
        }
    }
}

impl Default for StreamClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Terminal responses: `Eof#{more: false}` or a failed publisher.
fn is_terminal(envelope: &Envelope) -> bool {
    let Envelope::Response { message, .. } = envelope else {
        return false;
    };
    match message {
        Value::Failed(_) => true,
        Value::Rec(rec) if rec.label() == &Lit::Eof => matches!(
            rec.find(&Lit::str("more")).map(ValueOrVar::resolved),
            Some(ValueOrVar::Value(Value::Bool(false)))
        ),
        _ => false,
    }
}
