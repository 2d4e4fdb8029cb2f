use providers::{ChatBackend, TextStream};
use shared::chat_api::{ChatRequest, HistoryEntry};
use shared::ChatError;
use std::sync::Arc;
use url::Url;

pub const EMPTY_PROMPT_MESSAGE: &str = "Por favor, ingresa una pregunta.";

/// Pick the request kind for a turn. An attached document wins over an
/// attached image, which wins over plain text.
pub fn select_request(
    prompt: &str,
    image_base64: Option<&str>,
    document: Option<&str>,
    history: Vec<HistoryEntry>,
) -> ChatRequest {
    let prompt = prompt.to_string();
    if let Some(document_text) = document {
        ChatRequest::Document {
            prompt,
            document_text: document_text.to_string(),
            history,
        }
    } else if let Some(image) = image_base64 {
        ChatRequest::Image {
            prompt,
            image_base64: image.to_string(),
            history,
        }
    } else {
        ChatRequest::Text { prompt, history }
    }
}

/// Accept only absolute http(s) URLs.
pub fn validate_media_url(raw: &str) -> Result<Url, ChatError> {
    let url = Url::parse(raw.trim())
        .map_err(|_| ChatError::validation(format!("La dirección del video no es válida: {}", raw)))?;
    match url.scheme() {
        "http" | "https" if url.host().is_some() => Ok(url),
        _ => Err(ChatError::validation(format!(
            "La dirección del video debe empezar con http:// o https://: {}",
            raw
        ))),
    }
}

/// Validates a request and issues exactly one backend call for it.
#[derive(Clone)]
pub struct Dispatcher {
    backend: Arc<dyn ChatBackend>,
}

impl Dispatcher {
    pub fn new(backend: Arc<dyn ChatBackend>) -> Self {
        Self { backend }
    }

    pub fn validate(request: &ChatRequest) -> Result<(), ChatError> {
        match request {
            ChatRequest::MediaUrl { media_url, .. } => validate_media_url(media_url).map(|_| ()),
            other if other.prompt().trim().is_empty() => {
                Err(ChatError::validation(EMPTY_PROMPT_MESSAGE))
            }
            _ => Ok(()),
        }
    }

    pub async fn send(&self, request: &ChatRequest) -> Result<TextStream, ChatError> {
        Self::validate(request)?;
        tracing::info!(
            backend = self.backend.name(),
            kind = request.kind(),
            history = request.history().len(),
            "dispatching request"
        );
        self.backend.open_stream(request).await
    }
}
