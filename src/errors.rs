use thiserror::Error;

/// The remote call a [`TransportError`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListChats,
    CreateChat,
    GetMessages,
    DeleteChat,
    RenameChat,
    Ask,
    Health,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::ListChats => "list chats",
            Operation::CreateChat => "create chat",
            Operation::GetMessages => "get messages",
            Operation::DeleteChat => "delete chat",
            Operation::RenameChat => "rename chat",
            Operation::Ask => "ask",
            Operation::Health => "health",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a remote call failed.
#[derive(Debug, Error)]
pub enum TransportCause {
    // ── Connection / timeout ─────────────────────────────────────────────────
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    // ── Non-2xx response ─────────────────────────────────────────────────────
    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    // ── 2xx with a body we could not read ────────────────────────────────────
    #[error("invalid response body: {0}")]
    Decode(String),
}

/// The only error kind of the client: a failed call to the chat backend.
/// Carries the failing operation so every log line can name it.
#[derive(Debug, Error)]
#[error("{operation} failed: {cause}")]
pub struct TransportError {
    pub operation: Operation,
    #[source]
    pub cause: TransportCause,
}

impl TransportError {
    pub fn new(operation: Operation, cause: TransportCause) -> Self {
        Self { operation, cause }
    }

    pub fn network(operation: Operation, source: reqwest::Error) -> Self {
        Self::new(operation, TransportCause::Network(source))
    }

    pub fn status(operation: Operation, status: u16, message: impl Into<String>) -> Self {
        Self::new(operation, TransportCause::Status { status, message: message.into() })
    }

    pub fn decode(operation: Operation, message: impl Into<String>) -> Self {
        Self::new(operation, TransportCause::Decode(message.into()))
    }

    pub fn status_code(&self) -> Option<u16> {
        match &self.cause {
            TransportCause::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status_code() == Some(401)
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self.status_code(), Some(400..=499))
    }
}
