//! Incremental decoding of server-sent-event completion streams.

use serde_json::Value;

use crate::gateway::StreamEvent;

/// Payload that ends an OpenAI-style event stream.
pub const DONE_MARKER: &str = "[DONE]";

/// Reply text inside a chat-completion envelope, streamed or not.
pub fn envelope_content(envelope: &Value) -> Option<&str> {
    ["/choices/0/delta/content", "/choices/0/message/content", "/choices/0/text"]
        .iter()
        .find_map(|path| envelope.pointer(path).and_then(Value::as_str))
}

fn envelope_error(envelope: &Value) -> Option<String> {
    match envelope.get("error")? {
        Value::String(message) => Some(message.clone()),
        Value::Object(error) => Some(
            error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("upstream error")
                .to_string(),
        ),
        _ => None,
    }
}

/// Splits a byte stream into `data:` lines and turns each payload into a
/// [`StreamEvent`]. Bytes may arrive split at any position.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once the `[DONE]` marker was seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed a chunk and collect events for every complete line in it.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.done {
            return events;
        }
        self.buffer.extend_from_slice(chunk);
        while let Some(newline) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            self.decode_line(&line, &mut events);
            if self.done {
                self.buffer.clear();
                break;
            }
        }
        events
    }

    /// Flush a trailing line that had no newline.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if !self.done && !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.decode_line(&line, &mut events);
        }
        events
    }

    fn decode_line(&mut self, raw: &[u8], events: &mut Vec<StreamEvent>) {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim_end_matches(['\n', '\r']);
        let Some(payload) = line.strip_prefix("data:") else {
            // event:, id:, retry:, comments and blank separators
            return;
        };
        let payload = payload.trim();
        if payload.is_empty() {
            return;
        }
        if payload == DONE_MARKER {
            self.done = true;
            return;
        }
        let Ok(envelope) = serde_json::from_str::<Value>(payload) else {
            events.push(StreamEvent::Content(payload.to_string()));
            return;
        };
        if let Some(message) = envelope_error(&envelope) {
            events.push(StreamEvent::Error(message));
        } else if let Some(text) = envelope_content(&envelope) {
            if !text.is_empty() {
                events.push(StreamEvent::Content(text.to_string()));
            }
        } else if !is_completion_chunk(&envelope) {
            let text = match envelope {
                Value::String(text) => text,
                _ => payload.to_string(),
            };
            if !text.is_empty() {
                events.push(StreamEvent::Content(text));
            }
        }
    }
}

/// A completion chunk carrying no text: role-only or finishing deltas and
/// usage-only chunks with an empty `choices` list.
fn is_completion_chunk(envelope: &Value) -> bool {
    envelope.pointer("/choices/0/delta").is_some()
        || envelope
            .get("choices")
            .and_then(Value::as_array)
            .is_some_and(|choices| choices.is_empty())
}
