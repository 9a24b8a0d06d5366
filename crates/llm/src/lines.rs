use bytes::Buf;
use futures::{Stream, StreamExt};
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::io::StreamReader;

/// Longest `data:` line accepted from a chunked body.
pub const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// Splits a chunked response body into lines.
///
/// Bytes are held until a newline arrives, so a UTF-8 sequence split across
/// two reads decodes whole. A trailing `\r` is dropped and a final
/// unterminated line is yielded when the body ends.
pub fn body_lines<S, B, E>(
    body: S,
    max_line_length: usize,
) -> impl Stream<Item = Result<String, LinesCodecError>>
where
    S: Stream<Item = Result<B, E>>,
    B: Buf,
    E: std::error::Error + Send + Sync + 'static,
{
    let body = body.map(|chunk| chunk.map_err(std::io::Error::other));
    FramedRead::new(
        StreamReader::new(body),
        LinesCodec::new_with_max_length(max_line_length),
    )
}

/// Payload of a `data:` line, or `None` for any other line.
pub fn data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:")
        .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
}
