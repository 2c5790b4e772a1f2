//! Server-sent event framing
//!
//! Builders for the frames the relay pushes to the browser, and an incremental
//! frame splitter used by both the upstream parser and the client consumer.

use serde_json::json;
use warp::sse::Event;

/// Payload of the terminal frame
pub const DONE_SENTINEL: &str = "[DONE]";

/// Event name used for mid-stream failures
pub const ERROR_EVENT: &str = "error";

/// Create a fragment event carrying one piece of generated text
pub fn create_fragment_event(content: &str) -> Result<Event, std::convert::Infallible> {
    let payload = json!({ "content": content });

    Ok(Event::default().data(payload.to_string()))
}

/// Create the sentinel event that marks a completed stream
pub fn create_done_event() -> Result<Event, std::convert::Infallible> {
    Ok(Event::default().data(DONE_SENTINEL))
}

/// Create an error event that terminates a stream abnormally
pub fn create_error_event(message: &str) -> Result<Event, std::convert::Infallible> {
    let payload = json!({ "error": message });

    Ok(Event::default().event(ERROR_EVENT).data(payload.to_string()))
}

/// One complete SSE frame
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseFrame {
    /// Value of the `event:` field, if any
    pub event: Option<String>,
    /// `data:` lines joined with `\n`
    pub data: String,
}

/// Accumulates raw bytes and yields frames once their blank-line delimiter
/// has arrived.
///
/// Bytes are buffered rather than strings so a UTF-8 sequence split across
/// two reads is decoded only after both halves are present.
#[derive(Debug, Default)]
pub struct SseBuffer {
    buffer: Vec<u8>,
}

impl SseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and drain every complete frame from the buffer
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        // CR only ever appears as part of a line ending; JSON escapes it
        self.buffer.extend(chunk.iter().copied().filter(|&b| b != b'\r'));

        let mut frames = Vec::new();
        while let Some(end) = find_delimiter(&self.buffer) {
            let raw: Vec<u8> = self.buffer.drain(..end + 2).collect();
            let text = String::from_utf8_lossy(&raw[..end]);
            if let Some(frame) = parse_frame(&text) {
                frames.push(frame);
            }
        }
        frames
    }

    /// Bytes received but not yet part of a complete frame
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

fn find_delimiter(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

/// Parse one frame; comment-only frames (keep-alives) yield `None`
fn parse_frame(text: &str) -> Option<SseFrame> {
    let mut event = None;
    let mut data: Option<String> = None;

    for line in text.lines() {
        if line.is_empty() || line.starts_with(':') {
            continue;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => event = Some(value.to_string()),
            "data" => match data.as_mut() {
                Some(existing) => {
                    existing.push('\n');
                    existing.push_str(value);
                }
                None => data = Some(value.to_string()),
            },
            _ => {}
        }
    }

    data.map(|data| SseFrame { event, data })
}
