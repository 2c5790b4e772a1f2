//! Prompt assembly: system message, bounded history, then the new message

use crate::llm::{GenerateRequest, GenerationConfig, Message};
use crate::models::{HistoryTurn, TurnRole};

use super::sanitize::strip_markers;

/// Prior turns forwarded with each request
pub const DEFAULT_MAX_HISTORY_TURNS: usize = 10;

/// Keep the most recent `max_turns` visitor/assistant turns, oldest first
///
/// System turns are dropped; the relay owns the system message.
pub fn bound_history(history: Vec<HistoryTurn>, max_turns: usize) -> Vec<Message> {
    let turns: Vec<Message> = history
        .into_iter()
        .filter_map(|turn| {
            let content = strip_markers(&turn.content);
            match turn.role {
                TurnRole::User => Some(Message::user(content)),
                TurnRole::Assistant => Some(Message::assistant(content)),
                TurnRole::System => None,
            }
        })
        .collect();

    let skip = turns.len().saturating_sub(max_turns);
    turns.into_iter().skip(skip).collect()
}

/// Build the upstream request
pub fn assemble(
    system_prompt: &str,
    history: Vec<Message>,
    message: String,
    config: GenerationConfig,
) -> GenerateRequest {
    let mut messages = history;
    messages.push(Message::user(message));

    GenerateRequest {
        messages,
        config,
        system: Some(system_prompt.to_string()),
    }
}
