use futures::StreamExt;
use thiserror::Error;
use tracing::{debug, warn};

use super::decoder::FrameDecoder;
use super::session::{ChatSession, SessionError};
use crate::models::{ChatRequest, ChatTurn, ErrorBody, RelayFrame};

const CHAT_PATH: &str = "/api/chat";
const INCOMPLETE_REPLY: &str = "The response ended before it was complete";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx answer from the relay; `message` is its `error` field
    #[error("{message}")]
    Rejected { status: u16, message: String },

    /// Error event, or the stream ended without the completion sentinel
    #[error("{0}")]
    Stream(String),
}

/// Sends chat messages to the relay and feeds the reply into a session
#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    endpoint: String,
}

impl ChatClient {
    /// `base_url` is the site origin, e.g. `http://127.0.0.1:3030`
    pub fn new(base_url: impl AsRef<str>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: impl AsRef<str>) -> Self {
        let endpoint = format!("{}{}", base_url.as_ref().trim_end_matches('/'), CHAT_PATH);
        Self { http, endpoint }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Send `message` and stream the reply into `session`
    ///
    /// `on_update` sees the assistant turn after every applied fragment.
    /// On failure the session shows the error and is ready for a retry.
    pub async fn send<F>(
        &self,
        session: &mut ChatSession,
        message: &str,
        mut on_update: F,
    ) -> Result<(), ClientError>
    where
        F: FnMut(&ChatTurn),
    {
        let request = session.begin(message)?;

        let result = self.stream_reply(session, &request, &mut on_update).await;
        if let Err(e) = &result {
            warn!(error = %e, "Chat request failed");
            session.fail(e.to_string());
        }
        result
    }

    async fn stream_reply<F>(
        &self,
        session: &mut ChatSession,
        request: &ChatRequest,
        on_update: &mut F,
    ) -> Result<(), ClientError>
    where
        F: FnMut(&ChatTurn),
    {
        let response = self.http.post(&self.endpoint).json(request).send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ErrorBody>().await {
                Ok(body) => body.error,
                Err(_) => format!("Request failed with status {}", status.as_u16()),
            };
            return Err(ClientError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        session.open_reply();
        let mut decoder = FrameDecoder::new();
        let mut body = response.bytes_stream();

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            for frame in decoder.push(&chunk) {
                match frame {
                    RelayFrame::Fragment(text) => {
                        if session.apply(RelayFrame::Fragment(text)) {
                            if let Some(turn) = session.reply() {
                                on_update(turn);
                            }
                        }
                    }
                    RelayFrame::Done => {
                        session.apply(RelayFrame::Done);
                        debug!("Reply complete");
                        return Ok(());
                    }
                    RelayFrame::Error(message) => return Err(ClientError::Stream(message)),
                }
            }
        }

        Err(ClientError::Stream(INCOMPLETE_REPLY.to_string()))
    }
}
