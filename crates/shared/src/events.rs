//! Events published by a chat session while a turn is handled.

use serde::{Deserialize, Serialize};

use crate::chat_api::{Role, TurnId};

/// Streaming accumulator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum StreamState {
    #[default]
    Idle,
    Streaming,
    Completed,
    Aborted,
    Failed,
}

impl StreamState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StreamState::Completed | StreamState::Aborted | StreamState::Failed
        )
    }
}

/// Observer notifications. Receivers render from these without polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionEvent {
    /// A turn was added to the conversation
    TurnAppended { id: TurnId, role: Role },
    /// The in-progress turn grew; `content` is the full text so far
    TurnUpdated { id: TurnId, content: String },
    /// Accumulator moved to a new state
    StateChanged(StreamState),
    /// The error slot was filled
    ErrorRaised { message: String },
    /// Conversation, document context and error slot were reset
    Cleared,
}
