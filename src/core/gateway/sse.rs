//! Server-sent events decoding and upstream error summaries.

use futures_util::StreamExt;
use memchr::memchr;
use tokio::sync::mpsc;
use tracing::warn;

use super::{classify_reqwest_error, CompletionError, StreamMessage};
use crate::api::ChatResponse;

#[derive(Debug, PartialEq)]
pub(crate) enum SseEvent {
    Chunk(String),
    Done,
    Error(String),
    Skip,
}

fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}

pub(crate) fn parse_sse_line(line: &str) -> SseEvent {
    let Some(payload) = extract_data_payload(line) else {
        return SseEvent::Skip;
    };
    if payload == "[DONE]" {
        return SseEvent::Done;
    }
    if payload.trim().is_empty() {
        return SseEvent::Skip;
    }

    let value = match serde_json::from_str::<serde_json::Value>(payload) {
        Ok(value) if value.get("error").is_none() => value,
        _ => return SseEvent::Error(summarize_error_body(payload)),
    };
    match serde_json::from_value::<ChatResponse>(value) {
        Ok(response) => response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta.content)
            .filter(|content| !content.is_empty())
            .map(SseEvent::Chunk)
            .unwrap_or(SseEvent::Skip),
        Err(_) => SseEvent::Error(summarize_error_body(payload)),
    }
}

/// Read an event stream to completion, forwarding each delta to `sink` and
/// returning their concatenation.
pub(crate) async fn collect_stream(
    response: reqwest::Response,
    status: u16,
    sink: &mpsc::UnboundedSender<StreamMessage>,
) -> Result<String, CompletionError> {
    let mut stream = response.bytes_stream();
    let mut buffer: Vec<u8> = Vec::new();
    let mut text = String::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(classify_reqwest_error)?;
        buffer.extend_from_slice(&chunk);

        while let Some(newline_pos) = memchr(b'\n', &buffer) {
            let event = match std::str::from_utf8(&buffer[..newline_pos]) {
                Ok(line) => parse_sse_line(line.trim()),
                Err(err) => {
                    warn!(error = %err, "invalid UTF-8 in event stream");
                    SseEvent::Skip
                }
            };
            buffer.drain(..=newline_pos);

            match event {
                SseEvent::Chunk(content) => {
                    text.push_str(&content);
                    let _ = sink.send(StreamMessage::Chunk(content));
                }
                SseEvent::Done => return Ok(text),
                SseEvent::Error(detail) => {
                    return Err(CompletionError::ProviderError { status, detail })
                }
                SseEvent::Skip => {}
            }
        }
    }

    Ok(text)
}

/// Short human summary of an upstream error body: the `error.message` /
/// `error` / `message` field when the body is JSON, otherwise the trimmed
/// text with whitespace collapsed.
pub fn summarize_error_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    let summary = serde_json::from_str::<serde_json::Value>(trimmed)
        .ok()
        .and_then(|value| extract_error_summary(&value));
    let text = summary.unwrap_or_else(|| trimmed.to_string());
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn extract_error_summary(value: &serde_json::Value) -> Option<String> {
    value
        .pointer("/error/message")
        .and_then(|v| v.as_str())
        .or_else(|| value.get("error").and_then(|v| v.as_str()))
        .or_else(|| value.get("message").and_then(|v| v.as_str()))
        .map(str::to_owned)
        .filter(|summary| !summary.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_sse_line_handles_spacing_variants() {
        assert_eq!(
            parse_sse_line(r#"data: {"choices":[{"delta":{"content":"Hello"}}]}"#),
            SseEvent::Chunk("Hello".to_string())
        );
        assert_eq!(
            parse_sse_line(r#"data:{"choices":[{"delta":{"content":"World"}}]}"#),
            SseEvent::Chunk("World".to_string())
        );
        assert_eq!(parse_sse_line("data: [DONE]"), SseEvent::Done);
        assert_eq!(parse_sse_line("data:[DONE]"), SseEvent::Done);
    }

    #[test]
    fn parse_sse_line_skips_comments_and_role_deltas() {
        assert_eq!(parse_sse_line(": OPENROUTER PROCESSING"), SseEvent::Skip);
        assert_eq!(parse_sse_line(""), SseEvent::Skip);
        assert_eq!(
            parse_sse_line(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#),
            SseEvent::Skip
        );
    }

    #[test]
    fn parse_sse_line_routes_stream_errors() {
        assert_eq!(
            parse_sse_line(r#"data: {"error":{"message":"internal   server error"}}"#),
            SseEvent::Error("internal server error".to_string())
        );
    }

    #[test]
    fn summarize_error_body_prefers_message_fields() {
        assert_eq!(
            summarize_error_body(r#"{"error":{"message":"Invalid key","code":401}}"#),
            "Invalid key"
        );
        assert_eq!(summarize_error_body(r#"{"error":"quota"}"#), "quota");
        assert_eq!(summarize_error_body(r#"{"message":"nope"}"#), "nope");
        assert_eq!(summarize_error_body("  Bad\n  Gateway "), "Bad Gateway");
        assert_eq!(summarize_error_body(""), "<empty>");
    }
}
