use std::sync::Arc;

mod http_transport;
mod lines;
mod parser;
mod provider;

pub use http_transport::{HTTP_TRANSPORT_NAME, HttpStreamTransport};
pub use lines::{MAX_LINE_LENGTH, body_lines, data_payload};
pub use parser::{DONE_SENTINEL, ParseResult, ParseWarning, ParsedChunk, parse_event, parse_message};
pub use provider::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_HOST, DEFAULT_IDLE_TIMEOUT, DEFAULT_PORT, DEFAULT_SCHEME,
    EndpointConfig, Provider, ProviderError, ProviderEventStream, ProviderResult,
    ProviderStreamHandle, ProviderWorker, StreamEventMapped, StreamEventPayload, StreamRequest,
    StreamTarget, StreamTransport, TransportMode, make_event_stream,
};

pub fn create_transport(config: EndpointConfig) -> ProviderResult<Arc<dyn StreamTransport>> {
    tracing::info!(
        base_url = %config.base_url(),
        transport = %config.transport,
        "creating stream transport"
    );
    Ok(Arc::new(HttpStreamTransport::new(config)?))
}
