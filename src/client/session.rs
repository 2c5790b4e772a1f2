//! Conversation state held by one chat widget

use thiserror::Error;

use crate::models::{ChatRequest, ChatTurn, HistoryTurn, RelayFrame, TurnRole};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// A new message was sent while a reply is still streaming
    #[error("A reply is still in progress")]
    Busy,

    #[error("Message is empty")]
    EmptyMessage,
}

/// Turns plus the open / loading / error state of the widget
///
/// Only one reply streams at a time: [`ChatSession::begin`] refuses a new
/// message until the current one is finished or has failed.
#[derive(Debug, Default)]
pub struct ChatSession {
    turns: Vec<ChatTurn>,
    is_loading: bool,
    error: Option<String>,
    /// Index of the assistant turn receiving fragments
    streaming: Option<usize>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Text for the inline error banner
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }

    /// Record the visitor's message and build the request for it
    ///
    /// History is every earlier non-system turn, before this message.
    pub fn begin(&mut self, content: &str) -> Result<ChatRequest, SessionError> {
        if self.is_loading {
            return Err(SessionError::Busy);
        }
        let content = content.trim();
        if content.is_empty() {
            return Err(SessionError::EmptyMessage);
        }

        let history = self
            .turns
            .iter()
            .filter(|turn| turn.role != TurnRole::System)
            .map(HistoryTurn::from)
            .collect();

        self.turns.push(ChatTurn::new(TurnRole::User, content));
        self.is_loading = true;
        self.error = None;

        Ok(ChatRequest {
            message: content.to_string(),
            history,
        })
    }

    /// Append the empty assistant turn that fragments will grow
    pub fn open_reply(&mut self) {
        self.turns.push(ChatTurn::new(TurnRole::Assistant, ""));
        self.streaming = Some(self.turns.len() - 1);
    }

    /// The assistant turn currently receiving fragments
    pub fn reply(&self) -> Option<&ChatTurn> {
        self.streaming.and_then(|idx| self.turns.get(idx))
    }

    /// Apply one frame; returns whether the visible state changed
    pub fn apply(&mut self, frame: RelayFrame) -> bool {
        match frame {
            RelayFrame::Fragment(text) => match self.streaming {
                Some(idx) => {
                    self.turns[idx].content.push_str(&text);
                    true
                }
                None => false,
            },
            RelayFrame::Done => {
                let changed = self.is_loading;
                self.streaming = None;
                self.is_loading = false;
                changed
            }
            RelayFrame::Error(message) => {
                self.fail(message);
                true
            }
        }
    }

    /// Stop loading and show `message`; an empty placeholder is removed
    pub fn fail(&mut self, message: impl Into<String>) {
        if let Some(idx) = self.streaming.take() {
            if self.turns[idx].content.is_empty() {
                self.turns.remove(idx);
            }
        }
        self.is_loading = false;
        self.error = Some(message.into());
    }
}
