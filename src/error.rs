//! Error types for the quest engine.

/// Top-level error type for quest automation.
#[derive(Debug, thiserror::Error)]
pub enum QuestError {
    /// Gateway session/connect failure. Logged by the caller, never fatal
    /// to catalog or runner work.
    #[error("transport error: {0}")]
    Transport(String),

    /// Quest catalog fetch or decode failure. Fatal to the run; no runner
    /// starts after this.
    #[error("catalog fetch error: {0}")]
    CatalogFetch(String),

    /// A cancelled wait. Silent: runners treat this as a clean exit, it is
    /// never surfaced as a failure.
    #[error("stopped")]
    Stopped,

    /// Enroll/heartbeat/progress call failure. Contained in the owning
    /// runner, retried after a bounded backoff.
    #[error("remote call error: {0}")]
    RemoteCall(String),

    /// Quest defines no recognized task kind. Logged once, skipped
    /// permanently.
    #[error("unsupported task type")]
    UnsupportedTask,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl QuestError {
    /// True when this is the synthetic cancellation signal rather than a
    /// real failure.
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped)
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, QuestError>;
