// POST /api/chat handler

use bytes::Bytes;
use futures_util::stream::StreamExt;
use std::convert::Infallible;
use sync_wrapper::SyncStream;
use tracing::{info, warn};
use warp::http::header::RETRY_AFTER;
use warp::http::{HeaderMap, HeaderValue};
use warp::reply::{Reply, Response};

use super::error_reply;
use crate::chat::{FrameStream, RelayError};
use crate::models::RelayFrame;
use crate::sse::{create_done_event, create_error_event, create_fragment_event};
use crate::state::AppState;

pub const FORWARDED_FOR: &str = "x-forwarded-for";

/// Key used when the request carries no forwarding header
pub const ANONYMOUS_CLIENT: &str = "anonymous";

/// Rate-limit key: the first `X-Forwarded-For` entry, trimmed
pub fn client_key(forwarded_for: Option<&str>) -> String {
    forwarded_for
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|first| !first.is_empty())
        .unwrap_or(ANONYMOUS_CLIENT)
        .to_string()
}

pub async fn chat_handler(
    headers: HeaderMap,
    body: Bytes,
    state: AppState,
) -> Result<Response, Infallible> {
    // Non-UTF-8 forwarding headers count as absent
    let forwarded_for = headers.get(FORWARDED_FOR).and_then(|v| v.to_str().ok());
    let client = client_key(forwarded_for);
    info!(client = %client, bytes = body.len(), "POST /api/chat");

    match state.relay.handle(&client, &body).await {
        Ok(frames) => Ok(event_stream_reply(frames)),
        Err(e) => {
            warn!(client = %client, category = e.category(), error = %e, "Chat request failed");
            Ok(relay_error_reply(&e))
        }
    }
}

fn event_stream_reply(frames: FrameStream) -> Response {
    let events = frames.map(|frame| match frame {
        RelayFrame::Fragment(text) => create_fragment_event(&text),
        RelayFrame::Done => create_done_event(),
        RelayFrame::Error(message) => create_error_event(&message),
    });

    // The body stream must be Sync; the upstream stays owned by the response
    warp::sse::reply(warp::sse::keep_alive().stream(SyncStream::new(events))).into_response()
}

/// JSON error with `Retry-After` when the category carries a hint
pub fn relay_error_reply(err: &RelayError) -> Response {
    let mut response = error_reply(err.status(), err.to_string());
    if let Some(secs) = err.retry_after_secs() {
        response
            .headers_mut()
            .insert(RETRY_AFTER, HeaderValue::from(secs));
    }
    response
}
