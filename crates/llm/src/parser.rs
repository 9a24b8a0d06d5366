use serde_json::{Map, Value};
use snafu::{ResultExt, Snafu};

/// OpenAI-style end marker some proxies forward verbatim.
pub const DONE_SENTINEL: &str = "[DONE]";

const DEFAULT_SERVER_ERROR: &str = "the server reported an error";

/// One decoded stream event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedChunk {
    TextDelta(String),
    Heartbeat,
    Complete,
    Error(String),
}

/// A payload that could not be decoded. Logged by the transport, never fatal.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ParseWarning {
    #[snafu(display("stream payload is not valid JSON on `{stage}`: {source}"))]
    InvalidJson {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("stream payload is not a JSON object"))]
    NotAnObject { stage: &'static str },
    #[snafu(display("field `{field}` in stream payload is not a string"))]
    UnexpectedFieldType {
        stage: &'static str,
        field: &'static str,
    },
    #[snafu(display("unknown stream event `{event}`"))]
    UnknownEvent { stage: &'static str, event: String },
}

pub type ParseResult = Result<ParsedChunk, ParseWarning>;

/// Decodes one event. `event` is the SSE event name, `None` for chunked-body lines.
pub fn parse_event(event: Option<&str>, data: &str) -> ParseResult {
    match event.map(str::trim).filter(|name| !name.is_empty()) {
        None | Some("message") => parse_message(data),
        Some("ping") => Ok(ParsedChunk::Heartbeat),
        Some("complete") => Ok(ParsedChunk::Complete),
        Some("error") => Ok(ParsedChunk::Error(error_event_message(data))),
        Some(other) => UnknownEventSnafu {
            stage: "parse-event-name",
            event: other.to_string(),
        }
        .fail(),
    }
}

/// Decodes a `message` payload: `{"chunk": ..}`, `{"error": ..}` or `{"done": true}`.
pub fn parse_message(data: &str) -> ParseResult {
    let data = data.trim();
    if data.is_empty() {
        return Ok(ParsedChunk::Heartbeat);
    }
    if data == DONE_SENTINEL {
        return Ok(ParsedChunk::Complete);
    }

    let value: Value = serde_json::from_str(data).context(InvalidJsonSnafu {
        stage: "parse-message-json",
    })?;
    let Value::Object(fields) = value else {
        return NotAnObjectSnafu {
            stage: "parse-message-shape",
        }
        .fail();
    };

    if let Some(chunk) = string_field(&fields, "chunk")?.filter(|chunk| !chunk.is_empty()) {
        return Ok(ParsedChunk::TextDelta(chunk.to_string()));
    }

    if let Some(message) = fields.get("error").and_then(error_message) {
        return Ok(ParsedChunk::Error(message));
    }

    if fields.get("done").and_then(Value::as_bool) == Some(true) {
        return Ok(ParsedChunk::Complete);
    }

    Ok(ParsedChunk::Heartbeat)
}

fn string_field<'a>(
    fields: &'a Map<String, Value>,
    field: &'static str,
) -> Result<Option<&'a str>, ParseWarning> {
    match fields.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(text)) => Ok(Some(text.as_str())),
        Some(_) => UnexpectedFieldTypeSnafu {
            stage: "parse-message-field",
            field,
        }
        .fail(),
    }
}

/// Accepts both `"error": "text"` and `"error": {"message": "text"}`.
fn error_message(error: &Value) -> Option<String> {
    match error {
        Value::Null | Value::Bool(false) => None,
        Value::String(text) if text.trim().is_empty() => None,
        Value::String(text) => Some(text.clone()),
        Value::Object(fields) => Some(
            fields
                .get("message")
                .and_then(Value::as_str)
                .filter(|message| !message.trim().is_empty())
                .unwrap_or(DEFAULT_SERVER_ERROR)
                .to_string(),
        ),
        _ => Some(DEFAULT_SERVER_ERROR.to_string()),
    }
}

fn error_event_message(data: &str) -> String {
    let data = data.trim();
    if let Ok(Value::Object(fields)) = serde_json::from_str::<Value>(data) {
        return fields
            .get("error")
            .and_then(error_message)
            .or_else(|| {
                fields
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or_else(|| DEFAULT_SERVER_ERROR.to_string());
    }

    if data.is_empty() {
        DEFAULT_SERVER_ERROR.to_string()
    } else {
        data.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_field_becomes_text_delta() {
        assert_eq!(
            parse_event(None, r#"{"chunk":"Hel"}"#).ok(),
            Some(ParsedChunk::TextDelta("Hel".into()))
        );
        assert_eq!(
            parse_event(Some("message"), r#"{"chunk":" lo "}"#).ok(),
            Some(ParsedChunk::TextDelta(" lo ".into()))
        );
    }

    #[test]
    fn empty_or_missing_delta_is_a_heartbeat() {
        for data in ["", "   ", r#"{"chunk":""}"#, r#"{"chunk":null}"#, "{}", r#"{"status":"thinking"}"#] {
            assert_eq!(
                parse_message(data).ok(),
                Some(ParsedChunk::Heartbeat),
                "payload {data:?}"
            );
        }
    }

    #[test]
    fn named_events_map_without_inspecting_data() {
        assert_eq!(parse_event(Some("ping"), "garbage").ok(), Some(ParsedChunk::Heartbeat));
        assert_eq!(parse_event(Some("complete"), "").ok(), Some(ParsedChunk::Complete));
    }

    #[test]
    fn error_event_reads_json_or_plain_text() {
        assert_eq!(
            parse_event(Some("error"), r#"{"error":"quota exceeded"}"#).ok(),
            Some(ParsedChunk::Error("quota exceeded".into()))
        );
        assert_eq!(
            parse_event(Some("error"), "upstream closed").ok(),
            Some(ParsedChunk::Error("upstream closed".into()))
        );
        assert_eq!(
            parse_event(Some("error"), "").ok(),
            Some(ParsedChunk::Error(DEFAULT_SERVER_ERROR.into()))
        );
    }

    #[test]
    fn error_field_in_message_is_server_error() {
        assert_eq!(
            parse_message(r#"{"error":"model overloaded"}"#).ok(),
            Some(ParsedChunk::Error("model overloaded".into()))
        );
        assert_eq!(
            parse_message(r#"{"error":{"message":"bad key"}}"#).ok(),
            Some(ParsedChunk::Error("bad key".into()))
        );
        assert_eq!(
            parse_message(r#"{"chunk":"partial","error":"ignored"}"#).ok(),
            Some(ParsedChunk::TextDelta("partial".into()))
        );
    }

    #[test]
    fn done_markers_complete_the_stream() {
        assert_eq!(parse_message("[DONE]").ok(), Some(ParsedChunk::Complete));
        assert_eq!(parse_message(r#"{"done":true}"#).ok(), Some(ParsedChunk::Complete));
        assert_eq!(parse_message(r#"{"done":false}"#).ok(), Some(ParsedChunk::Heartbeat));
    }

    #[test]
    fn malformed_payloads_are_warnings() {
        assert!(matches!(
            parse_message("{not json"),
            Err(ParseWarning::InvalidJson { .. })
        ));
        assert!(matches!(
            parse_message(r#"["chunk"]"#),
            Err(ParseWarning::NotAnObject { .. })
        ));
        assert!(matches!(
            parse_message(r#"{"chunk":42}"#),
            Err(ParseWarning::UnexpectedFieldType { field: "chunk", .. })
        ));
        assert!(matches!(
            parse_event(Some("tool_call"), "{}"),
            Err(ParseWarning::UnknownEvent { event, .. }) if event == "tool_call"
        ));
    }
}
