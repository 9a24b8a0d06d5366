use mcpchat_llm::Provider;
use snafu::Snafu;
use tokio::sync::{mpsc, watch};

use crate::chat::controller::SubmissionController;
use crate::chat::events::{ChatIntent, ChatSnapshot};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ChatSessionError {
    #[snafu(display("chat session is no longer running on `{stage}`"))]
    SessionClosed { stage: &'static str },
}

pub type ChatSessionResult<T> = Result<T, ChatSessionError>;

/// Actor that owns the [`SubmissionController`].
///
/// Intents and stream events are applied one at a time, and a fresh
/// [`ChatSnapshot`] is published after every change.
pub struct ChatSession {
    controller: SubmissionController,
    intents: mpsc::UnboundedReceiver<ChatIntent>,
    snapshots: watch::Sender<ChatSnapshot>,
}

/// Cloneable front for a running [`ChatSession`].
#[derive(Clone)]
pub struct ChatSessionHandle {
    intents: mpsc::UnboundedSender<ChatIntent>,
    snapshots: watch::Receiver<ChatSnapshot>,
}

impl ChatSession {
    pub fn new(controller: SubmissionController) -> (Self, ChatSessionHandle) {
        let (intent_tx, intent_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(controller.snapshot());
        let session = Self {
            controller,
            intents: intent_rx,
            snapshots: snapshot_tx,
        };
        let handle = ChatSessionHandle {
            intents: intent_tx,
            snapshots: snapshot_rx,
        };
        (session, handle)
    }

    /// Runs until `Quit` arrives or every handle is dropped.
    pub async fn run(mut self) {
        tracing::info!(provider = %self.controller.provider(), "chat session started");

        loop {
            tokio::select! {
                biased;

                intent = self.intents.recv() => {
                    match intent {
                        Some(ChatIntent::Quit) | None => break,
                        Some(intent) => self.apply_intent(intent),
                    }
                }
                activity = self.controller.next_stream_activity() => {
                    self.controller.handle_stream_activity(activity);
                }
            }

            self.publish();
        }

        self.controller.stop();
        self.publish();
        tracing::info!("chat session stopped");
    }

    fn apply_intent(&mut self, intent: ChatIntent) {
        tracing::debug!(?intent, "applying chat intent");
        match intent {
            ChatIntent::Submit(text) => {
                self.controller.submit(&text);
            }
            ChatIntent::SubmitInput => {
                self.controller.submit_input();
            }
            ChatIntent::SetInput(text) => self.controller.set_input(text),
            ChatIntent::SelectProvider(provider) => self.controller.select_provider(provider),
            ChatIntent::NewChat => self.controller.new_chat(),
            ChatIntent::Stop => self.controller.stop(),
            ChatIntent::Quit => {}
        }
    }

    fn publish(&self) {
        let snapshot = self.controller.snapshot();
        self.snapshots.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            *current = snapshot;
            true
        });
    }
}

impl ChatSessionHandle {
    pub fn send(&self, intent: ChatIntent) -> ChatSessionResult<()> {
        self.intents.send(intent).map_err(|_| ChatSessionError::SessionClosed {
            stage: "send-chat-intent",
        })
    }

    pub fn submit(&self, text: impl Into<String>) -> ChatSessionResult<()> {
        self.send(ChatIntent::Submit(text.into()))
    }

    pub fn set_input(&self, text: impl Into<String>) -> ChatSessionResult<()> {
        self.send(ChatIntent::SetInput(text.into()))
    }

    pub fn submit_input(&self) -> ChatSessionResult<()> {
        self.send(ChatIntent::SubmitInput)
    }

    pub fn select_provider(&self, provider: Provider) -> ChatSessionResult<()> {
        self.send(ChatIntent::SelectProvider(provider))
    }

    pub fn new_chat(&self) -> ChatSessionResult<()> {
        self.send(ChatIntent::NewChat)
    }

    pub fn stop(&self) -> ChatSessionResult<()> {
        self.send(ChatIntent::Stop)
    }

    pub fn quit(&self) -> ChatSessionResult<()> {
        self.send(ChatIntent::Quit)
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        self.snapshots.borrow().clone()
    }

    /// A receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<ChatSnapshot> {
        self.snapshots.clone()
    }
}
