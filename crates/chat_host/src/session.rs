//! One student's chat: transcript, attached document, error slot and the
//! request currently in flight.

use futures::future::{Abortable, Aborted};
use futures::StreamExt;
use providers::{ChatBackend, ImageBackend};
use shared::chat_api::{image_data_uri, ChatRequest, ImageRequest, Role, Turn, TurnId};
use shared::events::{SessionEvent, StreamState};
use shared::personas::Persona;
use shared::ChatError;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::accumulator::Accumulator;
use crate::bus::EventBus;
use crate::cancel::CancellationController;
use crate::content_filter::check_image_prompt;
use crate::conversation::Conversation;
use crate::dispatcher::{select_request, validate_media_url, Dispatcher, EMPTY_PROMPT_MESSAGE};
use crate::markdown::tidy_markdown;

/// What the student typed, plus an optional photo (raw base64 JPEG).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInput {
    pub text: String,
    pub image_base64: Option<String>,
}

impl UserInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            image_base64: None,
        }
    }

    pub fn with_image(mut self, image_base64: impl Into<String>) -> Self {
        self.image_base64 = Some(image_base64.into());
        self
    }
}

/// The input behind a failed request, kept so it can be re-submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailedInput {
    Message(UserInput),
    MediaSummary {
        url: String,
        instruction: Option<String>,
    },
    Image {
        prompt: String,
    },
}

#[derive(Debug, Clone)]
pub struct ErrorSlot {
    /// Friendly text for display
    pub message: String,
    /// Underlying error, for logs and "details"
    pub detail: String,
    pub retry_input: FailedInput,
}

/// Result of one user action that reached the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed { turn: TurnId },
    /// `turn` is the partial assistant turn, when one was opened
    Aborted { turn: Option<TurnId> },
    Failed { turn: Option<TurnId> },
}

impl TurnOutcome {
    pub fn state(&self) -> StreamState {
        match self {
            TurnOutcome::Completed { .. } => StreamState::Completed,
            TurnOutcome::Aborted { .. } => StreamState::Aborted,
            TurnOutcome::Failed { .. } => StreamState::Failed,
        }
    }

    pub fn turn(&self) -> Option<TurnId> {
        match *self {
            TurnOutcome::Completed { turn } => Some(turn),
            TurnOutcome::Aborted { turn } | TurnOutcome::Failed { turn } => turn,
        }
    }
}

pub struct ChatSession {
    dispatcher: Dispatcher,
    images: Option<Arc<dyn ImageBackend>>,
    conversation: Conversation,
    cancel: CancellationController,
    bus: EventBus,
    document: Option<String>,
    error: Option<ErrorSlot>,
    state: StreamState,
}

impl ChatSession {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self {
            dispatcher: Dispatcher::new(backend),
            images: None,
            conversation: Conversation::new(),
            cancel: CancellationController::new(),
            bus: EventBus::new(),
            document: None,
            error: None,
            state: StreamState::Idle,
        }
    }

    pub fn with_image_backend(mut self, images: Arc<dyn ImageBackend>) -> Self {
        self.images = Some(images);
        self
    }

    // ── Observation ──────────────────────────────────────────────────

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn is_generating(&self) -> bool {
        self.state == StreamState::Streaming
    }

    pub fn subscribe(&self) -> UnboundedReceiver<SessionEvent> {
        self.bus.subscribe()
    }

    pub fn error(&self) -> Option<&ErrorSlot> {
        self.error.as_ref()
    }

    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    /// Take the input of the last failed request, clearing the error slot.
    /// Nothing is appended to the conversation; re-submit it to retry.
    pub fn retry_input(&mut self) -> Option<FailedInput> {
        self.error.take().map(|slot| slot.retry_input)
    }

    // ── Document context ─────────────────────────────────────────────

    /// While a document is attached every message is answered from it.
    pub fn attach_document(&mut self, text: impl Into<String>) -> Result<(), ChatError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(ChatError::validation("El documento está vacío."));
        }
        tracing::info!(chars = text.chars().count(), "document attached");
        self.document = Some(text);
        Ok(())
    }

    pub fn detach_document(&mut self) {
        self.document = None;
    }

    pub fn document(&self) -> Option<&str> {
        self.document.as_deref()
    }

    // ── Cancellation ─────────────────────────────────────────────────

    /// Stop the request in flight, if any. Partial content is kept and no
    /// error is recorded.
    pub fn abort(&self) -> bool {
        self.cancel.abort()
    }

    /// Shared handle for aborting from another task while a request runs.
    pub fn cancel_handle(&self) -> CancellationController {
        self.cancel.clone()
    }

    /// Reset transcript, document context and error slot; stops any request.
    pub fn clear(&mut self) {
        self.cancel.abort();
        self.conversation.clear();
        self.document = None;
        self.error = None;
        self.state = StreamState::Idle;
        self.bus.publish(SessionEvent::Cleared);
        tracing::debug!("session cleared");
    }

    // ── Requests ─────────────────────────────────────────────────────

    /// Send a student message and stream the answer into a new assistant turn.
    ///
    /// Returns `Err` only when the input is rejected before dispatch. Backend
    /// failures end as `TurnOutcome::Failed` with the error slot filled.
    pub async fn send_message(&mut self, input: UserInput) -> Result<TurnOutcome, ChatError> {
        if input.text.trim().is_empty() {
            return Err(ChatError::validation(EMPTY_PROMPT_MESSAGE));
        }
        let request = select_request(
            &input.text,
            input.image_base64.as_deref(),
            self.document.as_deref(),
            self.conversation.history(),
        );

        self.error = None;
        let mut turn = Turn::user(input.text.clone());
        if let Some(image) = &input.image_base64 {
            turn = turn.with_media(image_data_uri(image));
        }
        self.push_turn(turn);

        Ok(self.stream_request(request, FailedInput::Message(input)).await)
    }

    /// Send a persona's opening prompt as the first message.
    pub async fn start_persona(&mut self, persona: &Persona) -> Result<TurnOutcome, ChatError> {
        tracing::info!(persona = persona.label(), "starting persona");
        self.send_message(UserInput::text(persona.opening_prompt()))
            .await
    }

    /// Summarize a video by URL. The answer arrives whole and is tidied
    /// before it is added to the conversation.
    pub async fn summarize_media(
        &mut self,
        url: &str,
        instruction: Option<&str>,
    ) -> Result<TurnOutcome, ChatError> {
        let url = url.trim().to_string();
        validate_media_url(&url)?;
        let instruction = instruction
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);

        self.error = None;
        self.push_turn(Turn::user(format!("Resumir video: {}", url)));

        let request = ChatRequest::MediaUrl {
            media_url: url.clone(),
            instruction: instruction.clone(),
        };
        let registration = self.cancel.arm();
        self.set_state(StreamState::Streaming);

        let dispatcher = &self.dispatcher;
        let result = Abortable::new(
            async {
                let mut stream = dispatcher.send(&request).await?;
                let mut text = String::new();
                while let Some(chunk) = stream.next().await {
                    text.push_str(&chunk?);
                }
                Ok::<_, ChatError>(text)
            },
            registration,
        )
        .await;
        self.cancel.disarm();

        let outcome = match result {
            Ok(Ok(text)) => {
                let content = tidy_markdown(&text);
                let id = self.conversation.grow_last_assistant_turn(&content);
                self.bus.publish(SessionEvent::TurnAppended {
                    id,
                    role: Role::Assistant,
                });
                self.bus
                    .publish(SessionEvent::TurnUpdated { id, content });
                TurnOutcome::Completed { turn: id }
            }
            Ok(Err(ChatError::Aborted)) | Err(Aborted) => {
                tracing::info!("media summary cancelled by user");
                TurnOutcome::Aborted { turn: None }
            }
            Ok(Err(e)) => {
                self.record_error(e, FailedInput::MediaSummary { url, instruction });
                TurnOutcome::Failed { turn: None }
            }
        };
        self.set_state(outcome.state());
        Ok(outcome)
    }

    /// Generate a picture from a description. Turns are added only when the
    /// picture actually arrives.
    pub async fn generate_image(&mut self, prompt: &str) -> Result<TurnOutcome, ChatError> {
        let images = self
            .images
            .clone()
            .ok_or_else(|| ChatError::validation("La generación de imágenes no está disponible."))?;
        let prompt = prompt.trim();
        if prompt.is_empty() {
            return Err(ChatError::validation(
                "Por favor, proporciona una descripción para la imagen.",
            ));
        }
        check_image_prompt(prompt)?;

        self.error = None;
        let registration = self.cancel.arm();
        self.set_state(StreamState::Streaming);

        let request = ImageRequest::new(prompt);
        let result = Abortable::new(images.generate_image(&request), registration).await;
        self.cancel.disarm();

        let outcome = match result {
            Ok(Ok(image_url)) => {
                self.push_turn(Turn::user(prompt));
                let id = self.push_turn(Turn::assistant("").with_media(image_url));
                TurnOutcome::Completed { turn: id }
            }
            Ok(Err(ChatError::Aborted)) | Err(Aborted) => {
                tracing::info!("image generation cancelled by user");
                TurnOutcome::Aborted { turn: None }
            }
            Ok(Err(e)) => {
                self.record_error(
                    e,
                    FailedInput::Image {
                        prompt: prompt.to_string(),
                    },
                );
                TurnOutcome::Failed { turn: None }
            }
        };
        self.set_state(outcome.state());
        Ok(outcome)
    }

    // ── Internals ────────────────────────────────────────────────────

    async fn stream_request(&mut self, request: ChatRequest, retry: FailedInput) -> TurnOutcome {
        let registration = self.cancel.arm();
        self.state = StreamState::Streaming;

        let dispatcher = &self.dispatcher;
        let accumulator = Accumulator::begin(&mut self.conversation, &self.bus);
        let settled = accumulator
            .run(dispatcher.send(&request), registration)
            .await;
        self.cancel.disarm();
        self.state = settled.state;

        if let Some(error) = settled.error {
            self.record_error(error, retry);
        }
        let turn = settled.turn;
        match settled.state {
            StreamState::Completed => TurnOutcome::Completed { turn },
            StreamState::Aborted => TurnOutcome::Aborted { turn: Some(turn) },
            _ => TurnOutcome::Failed { turn: Some(turn) },
        }
    }

    fn push_turn(&mut self, turn: Turn) -> TurnId {
        let role = turn.role;
        let id = self.conversation.append(turn);
        self.bus.publish(SessionEvent::TurnAppended { id, role });
        id
    }

    fn set_state(&mut self, state: StreamState) {
        self.state = state;
        self.bus.publish(SessionEvent::StateChanged(state));
    }

    fn record_error(&mut self, error: ChatError, retry: FailedInput) {
        if !error.is_surfaced() {
            tracing::debug!(error = %error, "error not surfaced");
            return;
        }
        tracing::error!(error = %error, "request failed");
        let message = error.user_message();
        self.bus.publish(SessionEvent::ErrorRaised {
            message: message.clone(),
        });
        self.error = Some(ErrorSlot {
            message,
            detail: error.to_string(),
            retry_input: retry,
        });
    }
}
