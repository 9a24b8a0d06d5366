use std::time::Duration;

use bytes::Buf;
use eventsource_stream::Eventsource;
use futures::{Stream, StreamExt};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Serialize;
use snafu::{ResultExt, ensure};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;

use super::lines::{MAX_LINE_LENGTH, body_lines, data_payload};
use super::parser::{ParseResult, ParsedChunk, parse_event};
use super::provider::{
    BuildHttpClientSnafu, EmptyQuerySnafu, EndpointConfig, HttpStatusSnafu, ProviderError,
    ProviderResult, ProviderStreamHandle, ProviderWorker, SendRequestSnafu, StreamEventMapped,
    StreamEventPayload, StreamRequest, StreamTarget, StreamTransport, TransportMode,
    make_event_stream,
};

pub const HTTP_TRANSPORT_NAME: &str = "http";

#[derive(Debug, Serialize)]
struct QueryBody<'a> {
    query: &'a str,
}

/// How a body pump ended.
#[derive(Debug)]
enum PumpOutcome {
    /// Body ended without an explicit terminal event.
    Finished,
    /// A `Done` or `ServerError` event was already forwarded.
    Terminal,
    Cancelled,
    ReceiverClosed,
    Failed(ProviderError),
}

/// Streams responses from the MCP proxy over plain HTTP.
#[derive(Debug, Clone)]
pub struct HttpStreamTransport {
    config: EndpointConfig,
    client: reqwest::Client,
}

impl HttpStreamTransport {
    pub fn new(config: EndpointConfig) -> ProviderResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .context(BuildHttpClientSnafu {
                stage: "build-client",
            })?;

        Ok(Self { config, client })
    }

    fn build_request(
        client: &reqwest::Client,
        config: &EndpointConfig,
        request: &StreamRequest,
    ) -> reqwest::RequestBuilder {
        let url = config.stream_url(request.provider);
        match config.transport {
            TransportMode::Chunked => client
                .post(url)
                .header(CONTENT_TYPE, "application/json")
                .json(&QueryBody {
                    query: &request.query,
                }),
            TransportMode::EventStream => client
                .get(url)
                .header(ACCEPT, "text/event-stream")
                .query(&[("query", request.query.as_str())]),
        }
    }

    async fn open_response(
        client: &reqwest::Client,
        config: &EndpointConfig,
        request: &StreamRequest,
    ) -> ProviderResult<reqwest::Response> {
        let url = config.stream_url(request.provider);
        tracing::debug!(
            session_id = request.target.session_id,
            provider = %request.provider,
            transport = %config.transport,
            url = %url,
            "starting stream request"
        );

        // `connect_timeout` only covers the TCP handshake.
        let sent = timeout(
            config.idle_timeout,
            Self::build_request(client, config, request).send(),
        )
        .await
        .map_err(|_| ProviderError::IdleTimeout {
            stage: "await-response-headers",
            timeout: config.idle_timeout,
        })?;
        let response = sent.context(SendRequestSnafu {
            stage: "send-stream-request",
            url: url.clone(),
        })?;

        let status = response.status();
        tracing::debug!(
            session_id = request.target.session_id,
            status = status.as_u16(),
            "stream response status"
        );
        ensure!(
            status.is_success(),
            HttpStatusSnafu {
                stage: "stream-http-status",
                url,
                status: status.as_u16(),
            }
        );

        Ok(response)
    }

    fn emit_transport_error(
        event_tx: &mpsc::UnboundedSender<StreamEventMapped>,
        target: StreamTarget,
        error: ProviderError,
    ) {
        let _ = event_tx.send(StreamEventMapped::new(
            target,
            StreamEventPayload::TransportError(error.to_string()),
        ));
    }

    /// Forwards one parsed chunk. Returns `Some` when the pump must stop.
    fn forward_parsed(
        target: StreamTarget,
        parsed: ParseResult,
        raw: &str,
        event_tx: &mpsc::UnboundedSender<StreamEventMapped>,
    ) -> Option<PumpOutcome> {
        let chunk = match parsed {
            Ok(chunk) => chunk,
            Err(warning) => {
                tracing::warn!(
                    session_id = target.session_id,
                    payload = raw,
                    warning = %warning,
                    "failed to parse stream data"
                );
                return None;
            }
        };
        tracing::trace!(session_id = target.session_id, chunk = ?chunk, "parsed chunk");

        let payload = match chunk {
            ParsedChunk::TextDelta(text) => StreamEventPayload::Delta(text),
            ParsedChunk::Heartbeat => return None,
            ParsedChunk::Complete => StreamEventPayload::Done,
            ParsedChunk::Error(message) => {
                tracing::warn!(
                    session_id = target.session_id,
                    error = %message,
                    "backend signaled a stream error"
                );
                StreamEventPayload::ServerError(message)
            }
        };
        let terminal = payload.is_terminal();

        if event_tx
            .send(StreamEventMapped::new(target, payload))
            .is_err()
        {
            return Some(PumpOutcome::ReceiverClosed);
        }
        terminal.then_some(PumpOutcome::Terminal)
    }

    fn forward_line(
        target: StreamTarget,
        line: &str,
        event_tx: &mpsc::UnboundedSender<StreamEventMapped>,
    ) -> Option<PumpOutcome> {
        let data = data_payload(line)?.trim();
        if data.is_empty() {
            return None;
        }
        Self::forward_parsed(target, parse_event(None, data), data, event_tx)
    }

    async fn pump_chunked<S, B, E>(
        body: S,
        target: StreamTarget,
        idle_timeout: Duration,
        event_tx: &mpsc::UnboundedSender<StreamEventMapped>,
        cancel_rx: &mut oneshot::Receiver<()>,
    ) -> PumpOutcome
    where
        S: Stream<Item = Result<B, E>>,
        B: Buf,
        E: std::error::Error + Send + Sync + 'static,
    {
        let mut lines = std::pin::pin!(body_lines(body, MAX_LINE_LENGTH));

        loop {
            let next = tokio::select! {
                _ = &mut *cancel_rx => return PumpOutcome::Cancelled,
                next = timeout(idle_timeout, lines.next()) => next,
            };

            let line = match next {
                Err(_) => {
                    return PumpOutcome::Failed(ProviderError::IdleTimeout {
                        stage: "read-chunked-body",
                        timeout: idle_timeout,
                    });
                }
                Ok(None) => return PumpOutcome::Finished,
                Ok(Some(Err(source))) => {
                    return PumpOutcome::Failed(ProviderError::ReadBody {
                        stage: "read-chunked-body",
                        source,
                    });
                }
                Ok(Some(Ok(line))) => line,
            };

            if let Some(outcome) = Self::forward_line(target, &line, event_tx) {
                return outcome;
            }
        }
    }

    async fn pump_event_stream<S, B, E>(
        body: S,
        target: StreamTarget,
        idle_timeout: Duration,
        event_tx: &mpsc::UnboundedSender<StreamEventMapped>,
        cancel_rx: &mut oneshot::Receiver<()>,
    ) -> PumpOutcome
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: std::error::Error,
    {
        let mut events = std::pin::pin!(body.eventsource());

        loop {
            let next = tokio::select! {
                _ = &mut *cancel_rx => return PumpOutcome::Cancelled,
                next = timeout(idle_timeout, events.next()) => next,
            };

            let event = match next {
                Err(_) => {
                    return PumpOutcome::Failed(ProviderError::IdleTimeout {
                        stage: "read-event-stream",
                        timeout: idle_timeout,
                    });
                }
                Ok(None) => return PumpOutcome::Finished,
                Ok(Some(Err(source))) => {
                    return PumpOutcome::Failed(ProviderError::EventStream {
                        stage: "read-event-stream",
                        message: source.to_string(),
                    });
                }
                Ok(Some(Ok(event))) => event,
            };

            let name = Some(event.event.as_str()).filter(|name| !name.is_empty());
            let parsed = parse_event(name, &event.data);
            if let Some(outcome) = Self::forward_parsed(target, parsed, &event.data, event_tx) {
                return outcome;
            }
        }
    }

    async fn run_stream_worker(
        client: reqwest::Client,
        config: EndpointConfig,
        request: StreamRequest,
        event_tx: mpsc::UnboundedSender<StreamEventMapped>,
        mut cancel_rx: oneshot::Receiver<()>,
    ) {
        let target = request.target;

        let opened = tokio::select! {
            _ = &mut cancel_rx => {
                tracing::debug!(session_id = target.session_id, "stream cancelled before response");
                return;
            }
            opened = Self::open_response(&client, &config, &request) => opened,
        };

        let response = match opened {
            Ok(response) => response,
            Err(error) => {
                tracing::error!(
                    session_id = target.session_id,
                    provider = %request.provider,
                    error = %error,
                    "failed to open stream"
                );
                Self::emit_transport_error(&event_tx, target, error);
                return;
            }
        };

        if event_tx
            .send(StreamEventMapped::new(target, StreamEventPayload::Connected))
            .is_err()
        {
            return;
        }

        let outcome = match config.transport {
            TransportMode::Chunked => {
                Self::pump_chunked(
                    response.bytes_stream(),
                    target,
                    config.idle_timeout,
                    &event_tx,
                    &mut cancel_rx,
                )
                .await
            }
            TransportMode::EventStream => {
                Self::pump_event_stream(
                    response.bytes_stream(),
                    target,
                    config.idle_timeout,
                    &event_tx,
                    &mut cancel_rx,
                )
                .await
            }
        };

        match outcome {
            PumpOutcome::Finished => {
                tracing::debug!(session_id = target.session_id, "stream complete");
                let _ = event_tx.send(StreamEventMapped::new(target, StreamEventPayload::Done));
            }
            PumpOutcome::Terminal => {
                tracing::debug!(session_id = target.session_id, "stream ended by backend");
            }
            PumpOutcome::Cancelled | PumpOutcome::ReceiverClosed => {
                tracing::debug!(session_id = target.session_id, "stream cancelled");
            }
            PumpOutcome::Failed(error) => {
                tracing::error!(
                    session_id = target.session_id,
                    error = %error,
                    "stream failed"
                );
                Self::emit_transport_error(&event_tx, target, error);
            }
        }
    }
}

impl StreamTransport for HttpStreamTransport {
    fn name(&self) -> &str {
        HTTP_TRANSPORT_NAME
    }

    fn open_stream(&self, request: StreamRequest) -> ProviderResult<ProviderStreamHandle> {
        ensure!(
            !request.query.trim().is_empty(),
            EmptyQuerySnafu {
                stage: "open-stream",
                target: request.target,
            }
        );

        let (event_tx, stream, cancel_rx) = make_event_stream(request.target);
        let worker: ProviderWorker = Box::pin(Self::run_stream_worker(
            self.client.clone(),
            self.config.clone(),
            request,
            event_tx,
            cancel_rx,
        ));

        Ok(ProviderStreamHandle { stream, worker })
    }
}
