//! Turns raw response bytes into relay frames

use tracing::debug;

use crate::models::{ErrorBody, FragmentPayload, RelayFrame};
use crate::sse::{SseBuffer, SseFrame, DONE_SENTINEL, ERROR_EVENT};

/// Incremental decoder for the relay's event stream
///
/// Reads may end anywhere, including inside a frame or a UTF-8 sequence;
/// a frame is only decoded once its delimiter has been received.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: SseBuffer,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<RelayFrame> {
        self.buffer
            .push(chunk)
            .into_iter()
            .filter_map(decode_frame)
            .collect()
    }
}

fn decode_frame(frame: SseFrame) -> Option<RelayFrame> {
    if frame.event.as_deref() == Some(ERROR_EVENT) {
        let message = serde_json::from_str::<ErrorBody>(&frame.data)
            .map(|body| body.error)
            .unwrap_or(frame.data);
        return Some(RelayFrame::Error(message));
    }

    if frame.data == DONE_SENTINEL {
        return Some(RelayFrame::Done);
    }

    match serde_json::from_str::<FragmentPayload>(&frame.data) {
        Ok(payload) if payload.content.is_empty() => None,
        Ok(payload) => Some(RelayFrame::Fragment(payload.content)),
        Err(e) => {
            debug!(error = %e, data = %frame.data, "Skipping undecodable frame");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decodes_fragments_and_sentinel() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(b"data: {\"content\":\"Hel\"}\n\ndata: {\"content\":\"lo\"}\n\ndata: [DONE]\n\n");
        assert_eq!(
            frames,
            vec![
                RelayFrame::Fragment("Hel".to_string()),
                RelayFrame::Fragment("lo".to_string()),
                RelayFrame::Done,
            ]
        );
    }

    #[test]
    fn test_partial_frame_waits_for_delimiter() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"data: {\"conte").is_empty());
        assert!(decoder.push(b"nt\":\"Hi\"}\n").is_empty());
        assert_eq!(
            decoder.push(b"\n"),
            vec![RelayFrame::Fragment("Hi".to_string())]
        );
    }

    #[test]
    fn test_byte_at_a_time() {
        let wire = "data: {\"content\":\"na\u{ef}ve\"}\n\ndata: [DONE]\n\n";
        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        for byte in wire.as_bytes() {
            frames.extend(decoder.push(std::slice::from_ref(byte)));
        }
        assert_eq!(
            frames,
            vec![RelayFrame::Fragment("na\u{ef}ve".to_string()), RelayFrame::Done]
        );
    }

    #[test]
    fn test_error_event() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(b"event: error\ndata: {\"error\":\"An error occurred\"}\n\n");
        assert_eq!(frames, vec![RelayFrame::Error("An error occurred".to_string())]);
    }

    #[test]
    fn test_keep_alive_and_garbage_are_ignored() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(b":\n\ndata: not-json\n\ndata: {\"content\":\"\"}\n\n");
        assert!(frames.is_empty());
    }
}
