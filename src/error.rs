//! Engine error taxonomy.

use thiserror::Error;

/// Failures surfaced by the execution engine to its callers.
///
/// A learner program that raises is *not* an engine error: it comes back as
/// [`crate::execution::RunOutcome::Failure`] and is rendered as output text.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The interpreter has not emitted its ready signal yet. Non-fatal, the
    /// caller may retry.
    #[error("Python environment is still loading. Please wait...")]
    NotReady,

    /// The interpreter reported an untagged error or went away.
    #[error("Failed to load Python environment: {0}")]
    HostFailed(String),

    /// A pending request was cancelled by host teardown before its reply.
    #[error("request {id} was cancelled before the interpreter replied")]
    Cancelled { id: u64 },

    #[error("unknown exercise: {0}")]
    UnknownExercise(String),

    /// The channel to the interpreter writer task is closed.
    #[error("interpreter channel closed")]
    ChannelClosed,

    #[error("malformed interpreter message: {0}")]
    Protocol(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Host-level failures put the engine in degraded mode; nothing should be
    /// sent until the interpreter is re-established.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::HostFailed(_) | Self::ChannelClosed)
    }
}
