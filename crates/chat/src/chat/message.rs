/// Stable identifier for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

impl MessageId {
    /// Creates a typed message identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Identifier for one streaming generation session.
///
/// This must change on every submit so stale chunks can be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamSessionId(pub u64);

impl StreamSessionId {
    /// Creates a typed stream session identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Chat speaker role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Assistant,
}

/// Lifecycle status for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageStatus {
    Pending,
    Streaming(StreamSessionId),
    Done,
    Error(String),
    Cancelled,
}

/// Core message model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub status: MessageStatus,
}

impl Message {
    /// Creates a message with explicit status.
    pub fn new(
        id: MessageId,
        role: Role,
        content: impl Into<String>,
        status: MessageStatus,
    ) -> Self {
        Self {
            id,
            role,
            content: content.into(),
            status,
        }
    }

    /// Creates a submitted user message.
    pub fn user(id: MessageId, content: impl Into<String>) -> Self {
        Self::new(id, Role::User, content, MessageStatus::Done)
    }

    /// Creates an empty assistant placeholder while streaming.
    pub fn assistant_streaming(id: MessageId, session_id: StreamSessionId) -> Self {
        Self::new(
            id,
            Role::Assistant,
            String::new(),
            MessageStatus::Streaming(session_id),
        )
    }
}

/// Per-submission stream lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StreamState {
    #[default]
    Idle,
    Connecting(StreamSessionId),
    Streaming(StreamSessionId),
    Completed(StreamSessionId),
    Failed {
        session_id: StreamSessionId,
        message: String,
    },
    Cancelled(StreamSessionId),
}

/// State transition input for stream lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamTransition {
    Start(StreamSessionId),
    Open(StreamSessionId),
    Complete(StreamSessionId),
    Fail {
        session_id: StreamSessionId,
        message: String,
    },
    Cancel(StreamSessionId),
    ResetToIdle,
}

/// Rejection reason for illegal stream transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamTransitionRejection {
    AlreadyActive {
        active: StreamSessionId,
        attempted: StreamSessionId,
    },
    NoActiveStream,
    SessionMismatch {
        active: StreamSessionId,
        attempted: StreamSessionId,
    },
}

/// Result type for stream transition application.
pub type StreamTransitionResult = Result<StreamState, StreamTransitionRejection>;

impl StreamState {
    /// Returns the session holding the transport, if any.
    pub fn active_session(&self) -> Option<StreamSessionId> {
        match self {
            Self::Connecting(session_id) | Self::Streaming(session_id) => Some(*session_id),
            Self::Idle | Self::Completed(_) | Self::Failed { .. } | Self::Cancelled(_) => None,
        }
    }

    pub fn is_connecting(&self) -> bool {
        matches!(self, Self::Connecting(_))
    }

    /// Returns true when incoming stream data matches the active session.
    pub fn accepts_stream_event(&self, session_id: StreamSessionId) -> bool {
        self.active_session() == Some(session_id)
    }

    /// Applies one transition deterministically.
    ///
    /// Inactive states may start a new session directly. `Open` and the
    /// terminal transitions must match the active session exactly.
    pub fn apply(&self, transition: StreamTransition) -> StreamTransitionResult {
        match transition {
            StreamTransition::Start(session_id) => self.apply_start(session_id),
            StreamTransition::Open(session_id) => self.apply_open(session_id),
            StreamTransition::Complete(session_id) => {
                self.apply_terminal(session_id, Self::Completed(session_id))
            }
            StreamTransition::Fail {
                session_id,
                message,
            } => self.apply_terminal(
                session_id,
                Self::Failed {
                    session_id,
                    message,
                },
            ),
            StreamTransition::Cancel(session_id) => {
                self.apply_terminal(session_id, Self::Cancelled(session_id))
            }
            StreamTransition::ResetToIdle => Ok(Self::Idle),
        }
    }

    fn apply_start(&self, session_id: StreamSessionId) -> StreamTransitionResult {
        match self.active_session() {
            Some(active) if active != session_id => {
                Err(StreamTransitionRejection::AlreadyActive {
                    active,
                    attempted: session_id,
                })
            }
            Some(_) => Ok(self.clone()),
            None => Ok(Self::Connecting(session_id)),
        }
    }

    fn apply_open(&self, session_id: StreamSessionId) -> StreamTransitionResult {
        match self.active_session() {
            Some(active) if active == session_id => Ok(Self::Streaming(session_id)),
            Some(active) => Err(StreamTransitionRejection::SessionMismatch {
                active,
                attempted: session_id,
            }),
            None => Err(StreamTransitionRejection::NoActiveStream),
        }
    }

    fn apply_terminal(&self, session_id: StreamSessionId, next: Self) -> StreamTransitionResult {
        match self.active_session() {
            Some(active) if active == session_id => Ok(next),
            Some(active) => Err(StreamTransitionRejection::SessionMismatch {
                active,
                attempted: session_id,
            }),
            None => Err(StreamTransitionRejection::NoActiveStream),
        }
    }
}
