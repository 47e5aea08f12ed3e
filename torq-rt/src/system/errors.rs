// Layer 1: Standard library imports
use std::time::Duration;

// Layer 2: Third-party crate imports
use thiserror::Error;

// Layer 3: Internal module imports
// (none)

/// Errors from system construction and actor spawning.
#[derive(Debug, Error)]
pub enum SystemError {
    /// Actors run as tokio tasks; spawning requires a running runtime.
    #[error("no tokio runtime is running on this thread")]
    NoRuntime,

    /// The actor builder needs a system to spawn into.
    #[error("actor builder has no system; call set_system first")]
    NoSystem,

    /// The requested address path is taken.
    #[error("actor '{0}' is already registered")]
    ActorAlreadyRegistered(String),
}

/// Errors from client await operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// No response arrived within the timeout.
    #[error("timed out after {0:?} waiting for a response")]
    ResponseTimeout(Duration),

    /// The stream did not reach end-of-stream within the timeout.
    #[error("timed out after {0:?} waiting for end of stream")]
    EofTimeout(Duration),
}
