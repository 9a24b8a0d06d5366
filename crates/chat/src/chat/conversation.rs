use snafu::{Snafu, ensure};

use crate::chat::message::{Message, MessageId, MessageStatus};

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConversationError {
    #[snafu(display("message {id:?} already exists in the conversation"))]
    DuplicateMessageId { stage: &'static str, id: MessageId },
    #[snafu(display("message {id:?} was not found in the conversation"))]
    MessageNotFound { stage: &'static str, id: MessageId },
}

pub type ConversationResult<T> = Result<T, ConversationError>;

/// Ordered message log. Insertion order is display order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn get(&self, id: MessageId) -> Option<&Message> {
        self.messages.iter().find(|message| message.id == id)
    }

    pub fn append(&mut self, message: Message) -> ConversationResult<()> {
        ensure!(
            self.get(message.id).is_none(),
            DuplicateMessageIdSnafu {
                stage: "append-message",
                id: message.id,
            }
        );
        self.messages.push(message);
        Ok(())
    }

    /// Replaces the content of one message.
    pub fn update_content(
        &mut self,
        id: MessageId,
        content: impl Into<String>,
    ) -> ConversationResult<()> {
        self.get_mut(id, "update-content")?.content = content.into();
        Ok(())
    }

    /// Appends a streamed delta to one message.
    pub fn append_content(&mut self, id: MessageId, delta: &str) -> ConversationResult<()> {
        self.get_mut(id, "append-content")?.content.push_str(delta);
        Ok(())
    }

    pub fn set_status(&mut self, id: MessageId, status: MessageStatus) -> ConversationResult<()> {
        self.get_mut(id, "set-status")?.status = status;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    fn get_mut(&mut self, id: MessageId, stage: &'static str) -> ConversationResult<&mut Message> {
        match self.messages.iter_mut().find(|message| message.id == id) {
            Some(message) => Ok(message),
            None => MessageNotFoundSnafu { stage, id }.fail(),
        }
    }
}
