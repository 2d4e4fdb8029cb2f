//! Streaming accumulator: grows one assistant turn chunk by chunk.
//!
//! `Idle -> Streaming -> {Completed | Aborted | Failed}`. Every terminal state
//! keeps whatever content already arrived; only `Failed` carries an error.

use futures::future::{AbortRegistration, Abortable, Aborted};
use futures::StreamExt;
use providers::TextStream;
use shared::chat_api::{Role, TurnId, TurnStatus};
use shared::events::{SessionEvent, StreamState};
use shared::ChatError;
use std::future::Future;

use crate::bus::EventBus;
use crate::conversation::Conversation;

/// How a streamed turn ended.
#[derive(Debug)]
pub struct Settled {
    pub turn: TurnId,
    pub state: StreamState,
    pub chunks: usize,
    pub error: Option<ChatError>,
}

pub struct Accumulator<'a> {
    conversation: &'a mut Conversation,
    bus: &'a EventBus,
    turn: TurnId,
    chunks: usize,
}

impl<'a> Accumulator<'a> {
    /// Enter `Streaming` with a fresh, empty in-progress assistant turn.
    pub fn begin(conversation: &'a mut Conversation, bus: &'a EventBus) -> Self {
        let turn = conversation.begin_assistant_turn();
        bus.publish(SessionEvent::TurnAppended {
            id: turn,
            role: Role::Assistant,
        });
        bus.publish(SessionEvent::StateChanged(StreamState::Streaming));
        Self {
            conversation,
            bus,
            turn,
            chunks: 0,
        }
    }

    pub fn turn(&self) -> TurnId {
        self.turn
    }

    /// Apply one chunk in arrival order and publish the new partial content.
    pub fn apply(&mut self, chunk: &str) {
        if let Some((id, content)) = self.conversation.grow_in_progress(chunk) {
            self.chunks += 1;
            let content = content.to_string();
            tracing::trace!(turn = %id, len = content.len(), "chunk applied");
            self.bus.publish(SessionEvent::TurnUpdated { id, content });
        }
    }

    async fn consume(&mut self, mut stream: TextStream) -> Result<(), ChatError> {
        while let Some(chunk) = stream.next().await {
            self.apply(&chunk?);
        }
        Ok(())
    }

    /// Await the response and drain it, unless `registration` is aborted first.
    pub async fn run<F>(mut self, open: F, registration: AbortRegistration) -> Settled
    where
        F: Future<Output = Result<TextStream, ChatError>>,
    {
        let result = Abortable::new(
            async {
                let stream = open.await?;
                self.consume(stream).await
            },
            registration,
        )
        .await;
        self.settle(result)
    }

    /// Finalize the turn for the given result.
    pub fn settle(self, result: Result<Result<(), ChatError>, Aborted>) -> Settled {
        let (state, status, error) = match result {
            Ok(Ok(())) => (StreamState::Completed, TurnStatus::Complete, None),
            Ok(Err(ChatError::Aborted)) | Err(Aborted) => {
                (StreamState::Aborted, TurnStatus::Aborted, None)
            }
            Ok(Err(e)) => (StreamState::Failed, TurnStatus::Failed, Some(e)),
        };
        self.conversation.finish_in_progress(status);

        match &error {
            None if state == StreamState::Aborted => {
                tracing::info!(turn = %self.turn, chunks = self.chunks, "generation cancelled by user")
            }
            None => tracing::debug!(turn = %self.turn, chunks = self.chunks, "stream completed"),
            Some(e) => tracing::warn!(turn = %self.turn, chunks = self.chunks, error = %e, "stream failed"),
        }
        self.bus.publish(SessionEvent::StateChanged(state));

        Settled {
            turn: self.turn,
            state,
            chunks: self.chunks,
            error,
        }
    }
}
