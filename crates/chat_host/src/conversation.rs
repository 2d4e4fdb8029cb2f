//! Ordered transcript of one chat session.
//!
//! Turns are only ever appended or grown at the tail; nothing removes or
//! reorders an earlier turn. The assistant turn being streamed into is tracked
//! by id rather than by "whatever is last".

use shared::chat_api::{HistoryEntry, Role, Turn, TurnId, TurnStatus};

#[derive(Debug, Default, Clone)]
pub struct Conversation {
    turns: Vec<Turn>,
    in_progress: Option<TurnId>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    pub fn get(&self, id: TurnId) -> Option<&Turn> {
        self.turns.iter().find(|t| t.id == id)
    }

    pub fn in_progress(&self) -> Option<TurnId> {
        self.in_progress
    }

    pub fn append(&mut self, turn: Turn) -> TurnId {
        let id = turn.id;
        self.turns.push(turn);
        id
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.in_progress = None;
    }

    /// Append `delta` to the last turn if it is an assistant turn, otherwise
    /// start a new assistant turn holding `delta`.
    pub fn grow_last_assistant_turn(&mut self, delta: &str) -> TurnId {
        match self.turns.last_mut() {
            Some(last) if last.role == Role::Assistant => {
                last.content.push_str(delta);
                last.id
            }
            _ => self.append(Turn::assistant(delta)),
        }
    }

    /// Open an empty assistant turn that subsequent chunks grow into.
    pub fn begin_assistant_turn(&mut self) -> TurnId {
        let id = self.append(Turn::in_progress_assistant());
        self.in_progress = Some(id);
        id
    }

    /// Append a chunk to the in-progress turn and return its full content.
    /// Returns `None` when nothing is in progress (e.g. after `clear`).
    pub fn grow_in_progress(&mut self, delta: &str) -> Option<(TurnId, &str)> {
        let id = self.in_progress?;
        let turn = self.turns.iter_mut().rev().find(|t| t.id == id)?;
        turn.content.push_str(delta);
        Some((id, turn.content.as_str()))
    }

    /// Settle the in-progress turn, keeping whatever content it holds.
    pub fn finish_in_progress(&mut self, status: TurnStatus) -> Option<TurnId> {
        let id = self.in_progress.take()?;
        if let Some(turn) = self.turns.iter_mut().rev().find(|t| t.id == id) {
            turn.status = status;
        }
        Some(id)
    }

    /// Prior turns in wire form. Assistant turns that never received any text
    /// (failed before the first chunk) are left out.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.turns
            .iter()
            .filter(|t| !t.is_in_progress())
            .filter(|t| !(t.role == Role::Assistant && t.content.is_empty() && t.media_reference.is_none()))
            .map(Turn::to_history_entry)
            .collect()
    }
}
