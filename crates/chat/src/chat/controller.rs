use std::sync::Arc;

use mcpchat_llm::{
    Provider, ProviderEventStream, ProviderStreamHandle, StreamEventMapped, StreamEventPayload,
    StreamRequest, StreamTarget, StreamTransport,
};
use tokio::task::JoinHandle;

use crate::chat::conversation::Conversation;
use crate::chat::events::ChatSnapshot;
use crate::chat::message::{
    Message, MessageId, MessageStatus, StreamSessionId, StreamState, StreamTransition,
    StreamTransitionRejection,
};
use crate::chat::query::{ActiveQueries, QueryKey};

/// Shown in place of the assistant reply when the backend cannot be reached.
pub const TRANSPORT_FAILURE_MESSAGE: &str = "Error contacting backend. Please try again.";

/// Coordinator-level stream metadata kept outside the conversation.
#[derive(Debug, Clone, Copy)]
struct ActiveStream {
    session_id: StreamSessionId,
    assistant_message_id: MessageId,
    query_key: QueryKey,
}

/// Whatever the active stream produced next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamActivity {
    Event(StreamEventMapped),
    /// The event channel closed; carries the target it belonged to.
    Closed(StreamTarget),
}

/// Why a stream is being torn down.
#[derive(Debug, Clone, PartialEq, Eq)]
enum StreamEnding {
    Completed,
    Failed(String),
    Cancelled,
}

/// Owns the lifecycle of in-flight requests and the conversation they write into.
///
/// All mutation happens through `&mut self`, so the owner (normally
/// [`crate::chat::ChatSession`]) serializes intents and stream events.
/// Opening a stream spawns its transport worker, so calls that submit must run
/// inside a Tokio runtime.
pub struct SubmissionController {
    transport: Arc<dyn StreamTransport>,
    conversation: Conversation,
    input: String,
    loading: bool,
    provider: Provider,
    active_queries: ActiveQueries,
    stream_state: StreamState,
    active_stream: Option<ActiveStream>,
    event_stream: Option<ProviderEventStream>,
    stream_worker_task: Option<JoinHandle<()>>,
    next_message_id: u64,
    next_stream_session_id: u64,
}

impl SubmissionController {
    /// Creates an idle controller that opens streams through `transport`.
    pub fn new(transport: Arc<dyn StreamTransport>, provider: Provider) -> Self {
        Self {
            transport,
            conversation: Conversation::new(),
            input: String::new(),
            loading: false,
            provider,
            active_queries: ActiveQueries::new(),
            stream_state: StreamState::Idle,
            active_stream: None,
            event_stream: None,
            stream_worker_task: None,
            next_message_id: 1,
            next_stream_session_id: 1,
        }
    }

    /// Returns the message log.
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Returns the unsent input buffer.
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Returns true while a reply is being streamed.
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Returns the provider used by the next submission.
    pub fn provider(&self) -> Provider {
        self.provider
    }

    /// Returns the lifecycle state of the latest submission.
    pub fn stream_state(&self) -> &StreamState {
        &self.stream_state
    }

    /// Returns the query keys currently in flight.
    pub fn active_queries(&self) -> &ActiveQueries {
        &self.active_queries
    }

    /// Returns true while a transport stream is attached.
    pub fn has_open_stream(&self) -> bool {
        self.event_stream.is_some()
    }

    /// Copies the state the presentation layer renders.
    pub fn snapshot(&self) -> ChatSnapshot {
        ChatSnapshot {
            messages: self.conversation.messages().to_vec(),
            input: self.input.clone(),
            loading: self.loading,
            provider: self.provider,
            stream_state: self.stream_state.clone(),
        }
    }

    /// Replaces the input buffer.
    pub fn set_input(&mut self, text: impl Into<String>) {
        self.input = text.into();
    }

    /// Changes the endpoint used by later submissions. In-flight streams are unaffected.
    pub fn select_provider(&mut self, provider: Provider) {
        if self.provider != provider {
            tracing::info!(from = %self.provider, to = %provider, "provider selected");
        }
        self.provider = provider;
    }

    /// Submits the input buffer. See [`SubmissionController::submit`].
    pub fn submit_input(&mut self) -> bool {
        let text = self.input.clone();
        self.submit(&text)
    }

    /// Starts streaming a reply to `text`.
    ///
    /// Returns false without touching any state when `text` is blank or the
    /// same query is already in flight. A different query supersedes the
    /// active stream, whether it is still connecting or already streaming.
    pub fn submit(&mut self, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }

        let query_key = QueryKey::from_text(text);
        if self.active_queries.contains(query_key) {
            tracing::debug!(query_key = query_key.0, "ignoring duplicate submission");
            return false;
        }

        if self.active_stream.is_some() {
            tracing::debug!("new submission supersedes the active stream");
            self.cancel_active_stream();
        }

        let session_id = StreamSessionId::new(self.next_stream_session_id);
        if let Err(rejection) = self.apply_transition(StreamTransition::Start(session_id)) {
            tracing::warn!(?rejection, "stream start rejected");
            return false;
        }
        // Reserve the session id so follow-up submissions never reuse a target.
        self.next_stream_session_id = self.next_stream_session_id.saturating_add(1);

        let user_message_id = self.alloc_message_id();
        let assistant_message_id = self.alloc_message_id();
        let appended = self
            .conversation
            .append(Message::user(user_message_id, text))
            .and_then(|()| {
                self.conversation
                    .append(Message::assistant_streaming(assistant_message_id, session_id))
            });
        if let Err(error) = appended {
            tracing::error!(error = %error, "failed to record submitted messages");
            let _ = self.apply_transition(StreamTransition::ResetToIdle);
            return false;
        }

        self.input.clear();
        self.loading = true;
        self.active_queries.try_register(query_key, session_id);
        self.active_stream = Some(ActiveStream {
            session_id,
            assistant_message_id,
            query_key,
        });

        let request = StreamRequest::new(
            Self::session_to_target(session_id),
            self.provider,
            text,
        );
        tracing::info!(
            session_id = session_id.0,
            provider = %self.provider,
            transport = self.transport.name(),
            "submitting query"
        );

        match self.transport.open_stream(request) {
            Ok(handle) => self.attach_stream(handle),
            Err(error) => {
                tracing::error!(session_id = session_id.0, error = %error, "failed to open stream");
                self.finalize_stream(session_id, StreamEnding::Failed(error.to_string()));
            }
        }

        true
    }

    fn attach_stream(&mut self, handle: ProviderStreamHandle) {
        self.stream_worker_task = Some(tokio::spawn(handle.worker));
        self.event_stream = Some(handle.stream);
    }

    /// Waits for the active stream's next event. Pending forever while idle.
    pub async fn next_stream_activity(&mut self) -> StreamActivity {
        let Some(stream) = self.event_stream.as_mut() else {
            return std::future::pending().await;
        };

        match stream.recv().await {
            Some(event) => StreamActivity::Event(event),
            None => StreamActivity::Closed(stream.target()),
        }
    }

    /// Applies what [`SubmissionController::next_stream_activity`] returned.
    pub fn handle_stream_activity(&mut self, activity: StreamActivity) {
        match activity {
            StreamActivity::Event(event) => {
                self.handle_stream_event(event);
            }
            StreamActivity::Closed(target) => self.handle_stream_closed(target),
        }
    }

    /// Applies one transport event. Returns false when the event is stale and was dropped.
    pub fn handle_stream_event(&mut self, event: StreamEventMapped) -> bool {
        let session_id = Self::target_to_session(event.target);

        let Some(active_stream) = self.current_stream(session_id) else {
            tracing::trace!(session_id = session_id.0, "dropping stale stream event");
            return false;
        };

        match event.payload {
            StreamEventPayload::Connected => {
                let _ = self.apply_transition(StreamTransition::Open(session_id));
            }
            StreamEventPayload::Delta(text) => {
                if self.stream_state.is_connecting() {
                    let _ = self.apply_transition(StreamTransition::Open(session_id));
                }
                if let Err(error) = self
                    .conversation
                    .append_content(active_stream.assistant_message_id, &text)
                {
                    tracing::warn!(error = %error, "assistant message missing for delta");
                }
            }
            StreamEventPayload::Done => {
                self.finalize_stream(session_id, StreamEnding::Completed);
            }
            StreamEventPayload::ServerError(message) | StreamEventPayload::TransportError(message) => {
                tracing::warn!(session_id = session_id.0, error = %message, "stream failed");
                self.finalize_stream(session_id, StreamEnding::Failed(message));
            }
        }

        true
    }

    fn handle_stream_closed(&mut self, target: StreamTarget) {
        let session_id = Self::target_to_session(target);
        if self.current_stream(session_id).is_none() {
            return;
        }

        self.finalize_stream(
            session_id,
            StreamEnding::Failed("stream ended before a terminal event".to_string()),
        );
    }

    /// Cancels the active stream, keeping its partial reply.
    pub fn stop(&mut self) {
        self.cancel_active_stream();
    }

    /// Cancels any stream and clears the conversation, registry and input.
    pub fn new_chat(&mut self) {
        self.cancel_active_stream();
        self.close_transport();
        self.conversation.clear();
        self.active_queries.clear();
        self.input.clear();
        self.loading = false;
        let _ = self.apply_transition(StreamTransition::ResetToIdle);
        tracing::info!("started a new chat");
    }

    fn cancel_active_stream(&mut self) {
        let Some(active_stream) = self.active_stream else {
            return;
        };
        tracing::debug!(session_id = active_stream.session_id.0, "cancelling stream");
        self.finalize_stream(active_stream.session_id, StreamEnding::Cancelled);
    }

    fn finalize_stream(&mut self, session_id: StreamSessionId, ending: StreamEnding) {
        let Some(active_stream) = self.current_stream(session_id) else {
            return;
        };

        self.close_transport();

        let (status, transition, overwrite) = match ending {
            StreamEnding::Completed => (
                MessageStatus::Done,
                StreamTransition::Complete(session_id),
                false,
            ),
            StreamEnding::Failed(message) => (
                MessageStatus::Error(message.clone()),
                StreamTransition::Fail {
                    session_id,
                    message,
                },
                true,
            ),
            StreamEnding::Cancelled => (
                MessageStatus::Cancelled,
                StreamTransition::Cancel(session_id),
                false,
            ),
        };

        if let Err(rejection) = self.apply_transition(transition) {
            tracing::debug!(?rejection, "stream transition rejected while finalizing");
        }

        let message_id = active_stream.assistant_message_id;
        if overwrite {
            if let Err(error) = self
                .conversation
                .update_content(message_id, TRANSPORT_FAILURE_MESSAGE)
            {
                tracing::warn!(error = %error, "failed to overwrite failed reply");
            }
        }
        if let Err(error) = self.conversation.set_status(message_id, status) {
            tracing::warn!(error = %error, "failed to update reply status");
        }

        self.active_queries
            .release(active_stream.query_key, active_stream.session_id);
        self.active_stream = None;
        self.loading = false;
    }

    /// Closes the transport synchronously: no event sent after this is applied.
    fn close_transport(&mut self) {
        if let Some(mut stream) = self.event_stream.take() {
            stream.cancel();
        }
        if let Some(task) = self.stream_worker_task.take() {
            task.abort();
        }
    }

    fn current_stream(&self, session_id: StreamSessionId) -> Option<ActiveStream> {
        self.active_stream.filter(|active| {
            active.session_id == session_id && self.stream_state.accepts_stream_event(session_id)
        })
    }

    fn apply_transition(
        &mut self,
        transition: StreamTransition,
    ) -> Result<(), StreamTransitionRejection> {
        self.stream_state = self.stream_state.apply(transition)?;
        Ok(())
    }

    fn alloc_message_id(&mut self) -> MessageId {
        let id = MessageId::new(self.next_message_id);
        self.next_message_id = self.next_message_id.saturating_add(1);
        id
    }

    fn session_to_target(session_id: StreamSessionId) -> StreamTarget {
        StreamTarget::new(session_id.0)
    }

    fn target_to_session(target: StreamTarget) -> StreamSessionId {
        StreamSessionId::new(target.session_id)
    }
}

impl Drop for SubmissionController {
    fn drop(&mut self) {
        self.close_transport();
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::Mutex;

    use mcpchat_llm::{
        ProviderError, ProviderResult, ProviderWorker, make_event_stream,
    };
    use tokio::sync::mpsc;

    use super::*;
    use crate::chat::message::Role;

    /// Transport that hands stream senders to the test instead of doing IO.
    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        opened: Mutex<Vec<(StreamRequest, mpsc::UnboundedSender<StreamEventMapped>)>>,
        refuse: Mutex<bool>,
    }

    impl ScriptedTransport {
        pub(crate) fn requests(&self) -> Vec<StreamRequest> {
            self.opened
                .lock()
                .unwrap()
                .iter()
                .map(|(request, _)| request.clone())
                .collect()
        }

        pub(crate) fn send(&self, index: usize, payload: StreamEventPayload) -> bool {
            let opened = self.opened.lock().unwrap();
            let (request, event_tx) = &opened[index];
            event_tx
                .send(StreamEventMapped::new(request.target, payload))
                .is_ok()
        }

        pub(crate) fn close(&self, index: usize) {
            let mut opened = self.opened.lock().unwrap();
            let (request, _) = opened[index].clone();
            let (closed_tx, _) = mpsc::unbounded_channel();
            opened[index] = (request, closed_tx);
        }

        fn refuse_next(&self) {
            *self.refuse.lock().unwrap() = true;
        }
    }

    impl StreamTransport for ScriptedTransport {
        fn name(&self) -> &str {
            "scripted"
        }

        fn open_stream(&self, request: StreamRequest) -> ProviderResult<ProviderStreamHandle> {
            if std::mem::take(&mut *self.refuse.lock().unwrap()) {
                return Err(ProviderError::UnknownProvider {
                    stage: "scripted-refuse",
                    name: request.provider.to_string(),
                });
            }

            let (event_tx, stream, cancel_rx) = make_event_stream(request.target);
            let worker: ProviderWorker = Box::pin(async move {
                let _ = cancel_rx.await;
            });
            self.opened.lock().unwrap().push((request, event_tx));
            Ok(ProviderStreamHandle { stream, worker })
        }
    }

    fn controller() -> (Arc<ScriptedTransport>, SubmissionController) {
        let transport = Arc::new(ScriptedTransport::default());
        let controller = SubmissionController::new(transport.clone(), Provider::Gemini);
        (transport, controller)
    }

    fn event(session: u64, payload: StreamEventPayload) -> StreamEventMapped {
        StreamEventMapped::new(StreamTarget::new(session), payload)
    }

    fn contents(controller: &SubmissionController) -> Vec<(Role, String)> {
        controller
            .conversation()
            .messages()
            .iter()
            .map(|message| (message.role, message.content.clone()))
            .collect()
    }

    #[tokio::test]
    async fn submit_appends_user_then_empty_assistant() {
        let (transport, mut controller) = controller();
        controller.set_input("hello");

        assert!(controller.submit_input());

        assert_eq!(
            contents(&controller),
            vec![
                (Role::User, "hello".to_string()),
                (Role::Assistant, String::new()),
            ]
        );
        assert_eq!(controller.input(), "");
        assert!(controller.is_loading());
        assert!(controller.has_open_stream());
        assert_eq!(controller.active_queries().len(), 1);
        assert_eq!(controller.stream_state(), &StreamState::Connecting(StreamSessionId::new(1)));

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].query, "hello");
        assert_eq!(requests[0].provider, Provider::Gemini);
    }

    #[tokio::test]
    async fn blank_submit_changes_nothing() {
        let (transport, mut controller) = controller();
        controller.set_input("  draft ");
        let before = controller.snapshot();

        for text in ["", "   ", "\n\t "] {
            assert!(!controller.submit(text));
        }

        assert_eq!(controller.snapshot(), before);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn duplicate_submission_is_ignored_until_finished() {
        let (transport, mut controller) = controller();
        assert!(controller.submit("same question"));
        controller.handle_stream_event(event(1, StreamEventPayload::Connected));

        assert!(!controller.submit("  same question "));
        assert_eq!(transport.requests().len(), 1);
        assert_eq!(controller.conversation().len(), 2);

        controller.handle_stream_event(event(1, StreamEventPayload::Done));
        assert!(controller.active_queries().is_empty());

        assert!(controller.submit("same question"));
        assert_eq!(transport.requests().len(), 2);
    }

    #[tokio::test]
    async fn different_query_supersedes_a_connecting_stream() {
        let (transport, mut controller) = controller();
        assert!(controller.submit("first"));
        assert!(controller.stream_state().is_connecting());

        assert!(controller.submit("second"));

        assert_eq!(transport.requests().len(), 2);
        assert!(!transport.send(0, StreamEventPayload::Connected));
        assert!(transport.send(1, StreamEventPayload::Connected));
        assert!(controller.has_open_stream());
        assert_eq!(controller.active_queries().len(), 1);
        assert_eq!(
            controller.stream_state(),
            &StreamState::Connecting(StreamSessionId::new(2))
        );

        let messages = controller.conversation().messages();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[1].status, MessageStatus::Cancelled);
        assert_eq!(messages[1].content, "");
        assert_eq!(
            messages[3].status,
            MessageStatus::Streaming(StreamSessionId::new(2))
        );
    }

    #[tokio::test]
    async fn same_query_while_connecting_is_still_a_duplicate() {
        let (transport, mut controller) = controller();
        assert!(controller.submit("first"));
        assert!(!controller.submit("first "));

        assert_eq!(transport.requests().len(), 1);
        assert_eq!(controller.conversation().len(), 2);
    }

    #[tokio::test]
    async fn new_query_supersedes_streaming_one_silently() {
        let (transport, mut controller) = controller();
        assert!(controller.submit("first"));
        controller.handle_stream_event(event(1, StreamEventPayload::Delta("par".into())));

        assert!(controller.submit("second"));
        assert_eq!(transport.requests().len(), 2);
        assert_eq!(controller.active_queries().len(), 1);

        let messages = controller.conversation().messages();
        assert_eq!(messages[1].content, "par");
        assert_eq!(messages[1].status, MessageStatus::Cancelled);
        assert_eq!(messages[3].status, MessageStatus::Streaming(StreamSessionId::new(2)));

        assert!(!controller.handle_stream_event(event(1, StreamEventPayload::Delta("tial".into()))));
        assert_eq!(controller.conversation().messages()[1].content, "par");
        assert!(!transport.send(0, StreamEventPayload::Delta("x".into())));
    }

    #[tokio::test]
    async fn deltas_append_in_arrival_order() {
        let (_transport, mut controller) = controller();
        controller.submit("greet");
        for delta in ["Hel", "lo"] {
            controller.handle_stream_event(event(1, StreamEventPayload::Delta(delta.into())));
        }
        controller.submit("greet backwards");
        for delta in ["lo", "Hel"] {
            controller.handle_stream_event(event(2, StreamEventPayload::Delta(delta.into())));
        }

        let messages = controller.conversation().messages();
        assert_eq!(messages[1].content, "Hello");
        assert_eq!(messages[3].content, "loHel");
        assert_eq!(controller.stream_state(), &StreamState::Streaming(StreamSessionId::new(2)));
    }

    #[tokio::test]
    async fn late_delta_after_complete_is_dropped() {
        let (_transport, mut controller) = controller();
        controller.submit("hi");
        controller.handle_stream_event(event(1, StreamEventPayload::Delta("Hello".into())));
        controller.handle_stream_event(event(1, StreamEventPayload::Done));

        assert!(!controller.handle_stream_event(event(1, StreamEventPayload::Delta("!".into()))));

        let reply = &controller.conversation().messages()[1];
        assert_eq!(reply.content, "Hello");
        assert_eq!(reply.status, MessageStatus::Done);
        assert!(!controller.is_loading());
        assert!(!controller.has_open_stream());
        assert_eq!(controller.stream_state(), &StreamState::Completed(StreamSessionId::new(1)));
    }

    #[tokio::test]
    async fn transport_error_overwrites_partial_reply() {
        let (_transport, mut controller) = controller();
        controller.submit("hi");
        controller.handle_stream_event(event(1, StreamEventPayload::Delta("Hel".into())));
        controller.handle_stream_event(event(
            1,
            StreamEventPayload::TransportError("connection reset".into()),
        ));

        let reply = &controller.conversation().messages()[1];
        assert_eq!(reply.content, TRANSPORT_FAILURE_MESSAGE);
        assert_eq!(reply.status, MessageStatus::Error("connection reset".into()));
        assert!(!controller.is_loading());
        assert!(controller.active_queries().is_empty());
    }

    #[tokio::test]
    async fn server_error_is_treated_like_transport_error() {
        let (_transport, mut controller) = controller();
        controller.submit("hi");
        controller.handle_stream_event(event(1, StreamEventPayload::ServerError("quota".into())));

        assert_eq!(
            controller.conversation().messages()[1].content,
            TRANSPORT_FAILURE_MESSAGE
        );
        assert!(matches!(controller.stream_state(), StreamState::Failed { .. }));
    }

    #[tokio::test]
    async fn refused_open_fails_the_submission() {
        let (transport, mut controller) = controller();
        transport.refuse_next();

        assert!(controller.submit("hi"));
        assert_eq!(
            controller.conversation().messages()[1].content,
            TRANSPORT_FAILURE_MESSAGE
        );
        assert!(!controller.is_loading());
        assert!(!controller.has_open_stream());
        assert!(controller.active_queries().is_empty());
    }

    #[tokio::test]
    async fn stop_keeps_partial_reply() {
        let (_transport, mut controller) = controller();
        controller.submit("hi");
        controller.handle_stream_event(event(1, StreamEventPayload::Delta("Hel".into())));
        controller.stop();

        let reply = &controller.conversation().messages()[1];
        assert_eq!(reply.content, "Hel");
        assert_eq!(reply.status, MessageStatus::Cancelled);
        assert!(!controller.is_loading());
        assert!(controller.active_queries().is_empty());
    }

    #[tokio::test]
    async fn new_chat_resets_everything_mid_stream() {
        let (transport, mut controller) = controller();
        controller.submit("hi");
        controller.handle_stream_event(event(1, StreamEventPayload::Delta("Hel".into())));
        controller.set_input("unsent");

        controller.new_chat();

        assert!(controller.conversation().is_empty());
        assert!(controller.active_queries().is_empty());
        assert_eq!(controller.input(), "");
        assert!(!controller.is_loading());
        assert!(!controller.has_open_stream());
        assert_eq!(controller.stream_state(), &StreamState::Idle);
        assert!(!controller.handle_stream_event(event(1, StreamEventPayload::Done)));
        assert!(!transport.send(0, StreamEventPayload::Delta("lo".into())));
    }

    #[tokio::test]
    async fn provider_change_applies_to_next_submission_only() {
        let (transport, mut controller) = controller();
        controller.submit("one");
        controller.select_provider(Provider::Claude);
        controller.handle_stream_event(event(1, StreamEventPayload::Done));
        controller.submit("two");

        let providers = transport
            .requests()
            .iter()
            .map(|request| request.provider)
            .collect::<Vec<_>>();
        assert_eq!(providers, vec![Provider::Gemini, Provider::Claude]);
    }

    #[tokio::test]
    async fn events_flow_through_the_transport_channel() {
        let (transport, mut controller) = controller();
        controller.submit("hi");
        transport.send(0, StreamEventPayload::Connected);
        transport.send(0, StreamEventPayload::Delta("Hel".into()));
        transport.send(0, StreamEventPayload::Delta("lo".into()));
        transport.send(0, StreamEventPayload::Done);

        while controller.has_open_stream() {
            let activity = controller.next_stream_activity().await;
            controller.handle_stream_activity(activity);
        }

        assert_eq!(controller.conversation().messages()[1].content, "Hello");
        assert_eq!(controller.stream_state(), &StreamState::Completed(StreamSessionId::new(1)));
    }

    #[tokio::test]
    async fn closed_channel_without_terminal_event_is_a_failure() {
        let (transport, mut controller) = controller();
        controller.submit("hi");
        transport.send(0, StreamEventPayload::Delta("Hel".into()));
        transport.close(0);

        while controller.has_open_stream() {
            let activity = controller.next_stream_activity().await;
            controller.handle_stream_activity(activity);
        }

        assert_eq!(
            controller.conversation().messages()[1].content,
            TRANSPORT_FAILURE_MESSAGE
        );
        assert!(!controller.is_loading());
    }
}
