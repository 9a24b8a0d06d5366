pub mod controller;
pub mod conversation;
pub mod events;
pub mod message;
pub mod query;
pub mod session;

pub use controller::{StreamActivity, SubmissionController, TRANSPORT_FAILURE_MESSAGE};
pub use conversation::{Conversation, ConversationError, ConversationResult};
pub use events::{ChatIntent, ChatSnapshot};
pub use message::{
    Message, MessageId, MessageStatus, Role, StreamSessionId, StreamState, StreamTransition,
    StreamTransitionRejection, StreamTransitionResult,
};
pub use query::{ActiveQueries, QueryKey};
pub use session::{ChatSession, ChatSessionError, ChatSessionHandle, ChatSessionResult};
