/// Category of a relay error, used for log fields and for deciding
/// whether a failure is worth a retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid configuration or arguments. Permanent.
    Config,
    /// I/O or network error. Usually transient.
    Io,
    /// Data format or serialization error.
    Format,
    /// Logical error such as an unknown topic or a closed handle.
    Logic,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::Config => f.write_str("config"),
            ErrorKind::Io => f.write_str("io"),
            ErrorKind::Format => f.write_str("format"),
            ErrorKind::Logic => f.write_str("logic"),
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  PublishError
// ════════════════════════════════════════════════════════════════

/// Failure of a single publish. Never retried by the publisher itself.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    #[error("topic name must not be empty")]
    EmptyTopic,

    #[error("connection lost: {0}")]
    Disconnected(String),

    #[error("broker rejected message for '{topic}': {reason}")]
    Rejected { topic: String, reason: String },

    #[error("serialization: {0}")]
    Serialization(String),

    #[error("publisher closed")]
    Closed,
}

impl PublishError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PublishError::EmptyTopic => ErrorKind::Config,
            PublishError::Disconnected(_) => ErrorKind::Io,
            PublishError::Rejected { .. } | PublishError::Closed => ErrorKind::Logic,
            PublishError::Serialization(_) => ErrorKind::Format,
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  SubscriptionError
// ════════════════════════════════════════════════════════════════

/// Failure of the consuming side of a connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubscriptionError {
    #[error("connect ({topic}/{group}): {reason}")]
    Connect {
        topic: String,
        group: String,
        reason: String,
    },

    #[error("connection lost: {0}")]
    Disconnected(String),

    #[error("topic '{0}' not found")]
    UnknownTopic(String),

    #[error("offset commit: {0}")]
    Commit(String),
}

impl SubscriptionError {
    /// Transient errors are worth a reconnect; the broker keeps the
    /// committed offset, so the new connection resumes from it.
    pub fn is_transient(&self) -> bool {
        !matches!(self, SubscriptionError::UnknownTopic(_))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SubscriptionError::UnknownTopic(_) => ErrorKind::Logic,
            _ => ErrorKind::Io,
        }
    }
}

// ════════════════════════════════════════════════════════════════
//  HandlerError
// ════════════════════════════════════════════════════════════════

/// Failure raised by per-message processing logic.
#[derive(Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct HandlerError {
    kind: ErrorKind,
    message: String,
}

impl HandlerError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Logic, message: msg.into() }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { kind: ErrorKind::Io, message: msg.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl std::fmt::Debug for HandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

impl From<std::io::Error> for HandlerError {
    fn from(e: std::io::Error) -> Self {
        Self::io(e.to_string())
    }
}
