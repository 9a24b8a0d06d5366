use mcpchat_llm::Provider;

use crate::chat::message::{Message, Role, StreamState};

/// Intents forwarded by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatIntent {
    Submit(String),
    /// Submits whatever is in the input buffer.
    SubmitInput,
    SetInput(String),
    SelectProvider(Provider),
    NewChat,
    /// Cancels the active stream but keeps the conversation.
    Stop,
    Quit,
}

/// Immutable view of the chat handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChatSnapshot {
    pub messages: Vec<Message>,
    pub input: String,
    pub loading: bool,
    pub provider: Provider,
    pub stream_state: StreamState,
}

impl ChatSnapshot {
    /// Latest assistant message, the one a renderer keeps redrawing.
    pub fn last_assistant(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|message| message.role == Role::Assistant)
    }
}
