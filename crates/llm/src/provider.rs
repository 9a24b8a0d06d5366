use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;
use std::time::Duration;

use snafu::Snafu;
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::LinesCodecError;

pub const DEFAULT_SCHEME: &str = "http";
pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: u16 = 9009;
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(600);

/// Upstream model service behind the MCP proxy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Provider {
    #[default]
    Gemini,
    OpenAi,
    Claude,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Gemini, Provider::OpenAi, Provider::Claude];

    /// Path segment used by the proxy, e.g. `gemini` in `/gemini-mcp/stream`.
    pub const fn slug(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
            Self::Claude => "claude",
        }
    }

    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Gemini => "MCP + Gemini",
            Self::OpenAi => "MCP + OpenAI",
            Self::Claude => "MCP + Claude",
        }
    }

    pub fn endpoint_path(self) -> String {
        format!("{}-mcp/stream", self.slug())
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.slug())
    }
}

impl FromStr for Provider {
    type Err = ProviderError;

    fn from_str(raw: &str) -> ProviderResult<Self> {
        let normalized = raw.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|provider| provider.slug() == normalized)
            .ok_or_else(|| ProviderError::UnknownProvider {
                stage: "parse-provider",
                name: raw.trim().to_string(),
            })
    }
}

/// How the query is sent and how the response body is framed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TransportMode {
    /// `POST` with a JSON body; the response is read as `data: ` lines.
    #[default]
    Chunked,
    /// `GET` with a `query` parameter; the response is a server-sent event stream.
    EventStream,
}

impl TransportMode {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Chunked => "chunked",
            Self::EventStream => "event-stream",
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.name())
    }
}

impl FromStr for TransportMode {
    type Err = ProviderError;

    fn from_str(raw: &str) -> ProviderResult<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "chunked" | "post" => Ok(Self::Chunked),
            "event-stream" | "eventstream" | "sse" | "get" => Ok(Self::EventStream),
            _ => UnknownTransportModeSnafu {
                stage: "parse-transport-mode",
                name: raw.trim().to_string(),
            }
            .fail(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    pub scheme: String,
    pub host: String,
    pub port: u16,
    pub transport: TransportMode,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self::new(DEFAULT_SCHEME, DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl EndpointConfig {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            scheme: scheme.into().trim().to_string(),
            host: host.into().trim().to_string(),
            port,
            transport: TransportMode::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }

    pub fn with_transport(mut self, transport: TransportMode) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.scheme, self.host, self.port)
    }

    /// Full stream URL for `provider`, without the query for event-stream mode.
    pub fn stream_url(&self, provider: Provider) -> String {
        format!("{}/{}", self.base_url(), provider.endpoint_path())
    }
}

/// Routing key attached to every event so stale chunks can be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamTarget {
    pub session_id: u64,
}

impl StreamTarget {
    pub const fn new(session_id: u64) -> Self {
        Self { session_id }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    pub target: StreamTarget,
    pub provider: Provider,
    pub query: String,
}

impl StreamRequest {
    pub fn new(target: StreamTarget, provider: Provider, query: impl Into<String>) -> Self {
        Self {
            target,
            provider,
            query: query.into(),
        }
    }
}

/// Transport events in chat-domain language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEventPayload {
    /// The backend accepted the request and the body is being read.
    Connected,
    Delta(String),
    Done,
    /// Explicit error payload sent by the backend.
    ServerError(String),
    /// Connection, status, read or timeout failure.
    TransportError(String),
}

impl StreamEventPayload {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Done | Self::ServerError(_) | Self::TransportError(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEventMapped {
    pub target: StreamTarget,
    pub payload: StreamEventPayload,
}

impl StreamEventMapped {
    pub fn new(target: StreamTarget, payload: StreamEventPayload) -> Self {
        Self { target, payload }
    }
}

pub type ProviderWorker = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;
pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ProviderError {
    #[snafu(display("provider '{name}' is not supported"))]
    UnknownProvider { stage: &'static str, name: String },
    #[snafu(display("transport mode '{name}' is not supported"))]
    UnknownTransportMode { stage: &'static str, name: String },
    #[snafu(display("stream request for {target:?} has an empty query"))]
    EmptyQuery {
        stage: &'static str,
        target: StreamTarget,
    },
    #[snafu(display("failed to build http client on `{stage}`: {source}"))]
    BuildHttpClient {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("request to {url} failed on `{stage}`: {source}"))]
    SendRequest {
        stage: &'static str,
        url: String,
        source: reqwest::Error,
    },
    #[snafu(display("HTTP error! status: {status}"))]
    HttpStatus {
        stage: &'static str,
        url: String,
        status: u16,
    },
    #[snafu(display("failed to read response body on `{stage}`: {source}"))]
    ReadBody {
        stage: &'static str,
        source: LinesCodecError,
    },
    #[snafu(display("event stream failed on `{stage}`: {message}"))]
    EventStream {
        stage: &'static str,
        message: String,
    },
    #[snafu(display("no stream data received within {timeout:?} on `{stage}`"))]
    IdleTimeout {
        stage: &'static str,
        timeout: Duration,
    },
}

/// Receiving half of one open stream.
///
/// Dropping it signals cancellation to the worker that feeds it.
pub struct ProviderEventStream {
    target: StreamTarget,
    events: mpsc::UnboundedReceiver<StreamEventMapped>,
    cancel_tx: Option<oneshot::Sender<()>>,
}

pub struct ProviderStreamHandle {
    pub stream: ProviderEventStream,
    pub worker: ProviderWorker,
}

impl ProviderEventStream {
    pub(crate) fn new(
        target: StreamTarget,
        events: mpsc::UnboundedReceiver<StreamEventMapped>,
        cancel_tx: oneshot::Sender<()>,
    ) -> Self {
        Self {
            target,
            events,
            cancel_tx: Some(cancel_tx),
        }
    }

    pub fn target(&self) -> StreamTarget {
        self.target
    }

    pub async fn recv(&mut self) -> Option<StreamEventMapped> {
        self.events.recv().await
    }

    /// Signals the worker to stop and stops accepting buffered events.
    pub fn cancel(&mut self) -> bool {
        self.events.close();
        while self.events.try_recv().is_ok() {}
        self.cancel_tx
            .take()
            .map(|tx| tx.send(()).is_ok())
            .unwrap_or(false)
    }
}

impl Drop for ProviderEventStream {
    fn drop(&mut self) {
        if let Some(cancel_tx) = self.cancel_tx.take() {
            let _ = cancel_tx.send(());
        }
    }
}

/// Opens streams against a backend. One handle per submission.
pub trait StreamTransport: Send + Sync {
    fn name(&self) -> &str;
    fn open_stream(&self, request: StreamRequest) -> ProviderResult<ProviderStreamHandle>;
}

/// Channel triple shared by every transport: the worker keeps the sender and
/// the cancel receiver, the caller keeps the event stream.
pub fn make_event_stream(
    target: StreamTarget,
) -> (
    mpsc::UnboundedSender<StreamEventMapped>,
    ProviderEventStream,
    oneshot::Receiver<()>,
) {
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (cancel_tx, cancel_rx) = oneshot::channel();
    (
        event_tx,
        ProviderEventStream::new(target, event_rx, cancel_tx),
        cancel_rx,
    )
}
