//! Priority-ordered envelope queues.
//!
//! The mailbox is the only object shared between actors: senders enqueue
//! atomically from any thread, the owning actor is the sole consumer.
//! Insertion keeps higher-priority envelopes ahead of lower-priority
//! predecessors while preserving FIFO order within a priority class.

pub mod queue;

pub use queue::Mailbox;
