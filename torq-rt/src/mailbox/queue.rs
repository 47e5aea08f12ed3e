// Layer 1: Standard library imports
use std::collections::VecDeque;

// Layer 2: Third-party crate imports
use parking_lot::Mutex;

// Layer 3: Internal module imports
use crate::message::Envelope;

/// A priority-ordered envelope queue.
///
/// # Insertion rule
///
/// Append to the tail, then bubble-swap toward the head while the new
/// envelope has strictly higher priority (lower priority number) than its
/// immediate predecessor. Equal priorities never swap, so delivery within a
/// class is FIFO.
///
/// # Batch selection
///
/// Once per scheduling turn the owner calls [`select_batch`]: it pulls the
/// head, and when the head is a response it keeps pulling the contiguous run
/// of responses so they can be bound together (the response fixpoint).
///
/// [`select_batch`]: Mailbox::select_batch
pub struct Mailbox {
    queue: Mutex<VecDeque<Envelope>>,
}

impl Mailbox {
    /// An empty mailbox.
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Enqueue with bubble-swap ordering.
    pub fn insert(&self, envelope: Envelope) {
        let mut queue = self.queue.lock();
        queue.push_back(envelope);
        let mut index = queue.len() - 1;
        while index > 0 && queue[index].priority() < queue[index - 1].priority() {
            queue.swap(index, index - 1);
            index -= 1;
        }
    }

    /// Priority of the head envelope, without removing it.
    pub fn peek_priority(&self) -> Option<u8> {
        self.queue.lock().front().map(Envelope::priority)
    }

    /// Remove and return the head envelope.
    pub fn remove_next(&self) -> Option<Envelope> {
        self.queue.lock().pop_front()
    }

    /// Pull the head; when it is a response, pull the contiguous response
    /// run with it.
    pub fn select_batch(&self) -> Vec<Envelope> {
        let mut queue = self.queue.lock();
        let mut batch = Vec::new();
        match queue.pop_front() {
            None => {}
            Some(head) => {
                let continue_responses = head.is_response();
                batch.push(head);
                if continue_responses {
                    while queue.front().is_some_and(Envelope::is_response) {
                        if let Some(next) = queue.pop_front() {
                            batch.push(next);
                        }
                    }
                }
            }
        }
        batch
    }

    /// Number of queued envelopes.
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    /// True when nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }

    /// Snapshot of queued priorities, head first.
    pub fn priorities(&self) -> Vec<u8> {
        self.queue.lock().iter().map(Envelope::priority).collect()
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}
