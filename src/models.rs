// Data structures shared by the relay, its handlers and the client

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

// Speaker of a turn
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Assistant,
    System,
}

// One message of a conversation as held by the client
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatTurn {
    pub id: String,
    pub role: TurnRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl ChatTurn {
    pub fn new(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

// A prior turn as sent over the wire
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HistoryTurn {
    pub role: TurnRole,
    pub content: String,
}

impl From<&ChatTurn> for HistoryTurn {
    fn from(turn: &ChatTurn) -> Self {
        Self {
            role: turn.role,
            content: turn.content.clone(),
        }
    }
}

// Request Types
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<HistoryTurn>,
}

// Payload of one fragment frame
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FragmentPayload {
    pub content: String,
}

// Body of every non-streamed failure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

// One frame of the relayed stream, independent of its SSE encoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayFrame {
    Fragment(String),
    Done,
    Error(String),
}

// View counter responses
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SlugViews {
    pub slug: String,
    pub views: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AllViews {
    pub views: BTreeMap<String, u64>,
}

// Resume download statistics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DownloadStatsResponse {
    pub total_downloads: u64,
    pub last_download: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DownloadAction {
    #[serde(default)]
    pub action: Option<String>,
}
