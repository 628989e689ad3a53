use serde::{Deserialize, Serialize};

use crate::models::{ChatId, Conversation};

/// Lifecycle of the conversation poller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollState {
    Idle,
    Polling,
    Stopped,
}

/// Events published by the inbox to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum InboxEvent {
    /// The conversation list differs from the previously applied one
    ConversationsUpdated { count: usize },

    /// The selected conversation changed content or was chosen for the first time
    SelectionUpdated { conversation: Conversation },

    /// A user-selected conversation became the selection
    Selected { chat_id: ChatId },

    /// A non-fatal failure; polling continues on the next tick
    TransientError { message: String },

    /// The backend rejected the session. Emitted once; the session is already cleared.
    SessionExpired,

    /// The poller moved between states
    PollStateChanged { state: PollState },
}

impl InboxEvent {
    /// Events that require the thread view to be redrawn.
    pub fn needs_render(&self) -> bool {
        !matches!(self, Self::PollStateChanged { .. })
    }
}
