use futures::stream;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::chat_api::{image_data_uri, ChatRequest, HistoryEntry};
use shared::prompts::PromptConfig;
use shared::settings::GenerationOptions;
use shared::ChatError;
use std::time::Duration;

use crate::decode::text_stream;
use crate::{ChatBackend, TextStream};

const GENERATE_PATH: &str = "/api/generate";
const DOCUMENT_PATH: &str = "/api/generate-pdf";
const MEDIA_SUMMARY_PATH: &str = "/api/summarize-media";

// ── Request bodies ───────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct MediaRef {
    url: String,
}

#[derive(Debug, Serialize)]
struct GenerateBody<'a> {
    prompt: &'a str,
    history: &'a [HistoryEntry],
    #[serde(skip_serializing_if = "Option::is_none")]
    media: Option<MediaRef>,
    options: &'a GenerationOptions,
    config: &'a PromptConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DocumentBody<'a> {
    prompt: &'a str,
    document_text: &'a str,
    history: &'a [HistoryEntry],
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MediaSummaryBody<'a> {
    media_url: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    instruction: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct TextResponse {
    text: String,
}

// ── Error mapping ────────────────────────────────────────────────────

pub(crate) fn transport_error(e: reqwest::Error) -> ChatError {
    ChatError::Unknown(anyhow::Error::new(e).context("request to backend failed"))
}

/// Pull a readable message out of an error body: `{"error": "..."}`,
/// `{"error": {"message": "..."}}`, or the raw body cut to 800 chars.
pub(crate) fn error_message_from_body(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        match value.get("error") {
            Some(Value::String(message)) => return message.clone(),
            Some(obj) => {
                if let Some(message) = obj.get("message").and_then(|m| m.as_str()) {
                    return message.to_string();
                }
            }
            None => {}
        }
    }
    body.trim().chars().take(800).collect()
}

pub(crate) async fn ensure_success(resp: Response) -> Result<Response, ChatError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    tracing::warn!(status = status.as_u16(), "backend returned an error status");
    Err(ChatError::Upstream {
        status: status.as_u16(),
        message: error_message_from_body(&body),
    })
}

// ── Client ───────────────────────────────────────────────────────────

/// Talks to the app's own route handlers (`/api/generate`, `/api/generate-pdf`, ...).
pub struct HttpBackend {
    http: Client,
    base_url: String,
    options: GenerationOptions,
    config: PromptConfig,
}

impl HttpBackend {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ChatError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(transport_error)?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            options: GenerationOptions::default(),
            config: PromptConfig::default(),
        })
    }

    /// Persona sent as `config` so the route handler builds the matching template.
    pub fn with_prompt_config(mut self, config: PromptConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Response, ChatError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        ensure_success(resp).await
    }
}

#[async_trait::async_trait]
impl ChatBackend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn open_stream(&self, request: &ChatRequest) -> Result<TextStream, ChatError> {
        tracing::debug!(
            kind = request.kind(),
            history = request.history().len(),
            "posting chat request"
        );

        let resp = match request {
            ChatRequest::Text { prompt, history } => {
                let body = GenerateBody {
                    prompt,
                    history,
                    media: None,
                    options: &self.options,
                    config: &self.config,
                };
                self.post_json(GENERATE_PATH, &body).await?
            }
            ChatRequest::Image {
                prompt,
                image_base64,
                history,
            } => {
                let body = GenerateBody {
                    prompt,
                    history,
                    media: Some(MediaRef {
                        url: image_data_uri(image_base64),
                    }),
                    options: &self.options,
                    config: &self.config,
                };
                self.post_json(GENERATE_PATH, &body).await?
            }
            ChatRequest::Document {
                prompt,
                document_text,
                history,
            } => {
                let body = DocumentBody {
                    prompt,
                    document_text,
                    history,
                };
                self.post_json(DOCUMENT_PATH, &body).await?
            }
            ChatRequest::MediaUrl {
                media_url,
                instruction,
            } => {
                let body = MediaSummaryBody {
                    media_url,
                    instruction: instruction.as_deref(),
                };
                let resp = self.post_json(MEDIA_SUMMARY_PATH, &body).await?;
                let summary: TextResponse = resp.json().await.map_err(transport_error)?;
                return Ok(Box::pin(stream::once(async move { Ok(summary.text) })));
            }
        };

        Ok(text_stream(resp.bytes_stream()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use shared::chat_api::Role;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn collect(stream: TextStream) -> String {
        stream
            .map(|chunk| chunk.unwrap())
            .collect::<Vec<_>>()
            .await
            .concat()
    }

    fn backend(server: &MockServer) -> HttpBackend {
        HttpBackend::new(&server.uri(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_text_request_streams_plain_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(serde_json::json!({
                "prompt": "¿Qué es la fotosíntesis?",
                "history": [],
                "options": {"format": "markdown", "maxTokens": 1000, "stream": true},
                "config": {"role": "Connie"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string("La fotosíntesis es..."))
            .expect(1)
            .mount(&server)
            .await;

        let request = ChatRequest::Text {
            prompt: "¿Qué es la fotosíntesis?".into(),
            history: vec![],
        };
        let stream = backend(&server).open_stream(&request).await.unwrap();
        assert_eq!(collect(stream).await, "La fotosíntesis es...");
    }

    #[tokio::test]
    async fn test_image_request_sends_data_uri() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(serde_json::json!({
                "media": {"url": "data:image/jpeg;base64,QUJD"},
                "history": [{"role": "user", "content": "hola"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string("Veo un gato"))
            .expect(1)
            .mount(&server)
            .await;

        let request = ChatRequest::Image {
            prompt: "¿Qué es esto?".into(),
            image_base64: "QUJD".into(),
            history: vec![HistoryEntry {
                role: Role::User,
                content: "hola".into(),
                media_url: None,
            }],
        };
        let stream = backend(&server).open_stream(&request).await.unwrap();
        assert_eq!(collect(stream).await, "Veo un gato");
    }

    #[tokio::test]
    async fn test_document_request_uses_document_route() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate-pdf"))
            .and(body_partial_json(serde_json::json!({
                "prompt": "¿De qué trata?",
                "documentText": "Capítulo 1: ..."
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string("Trata de plantas."))
            .expect(1)
            .mount(&server)
            .await;

        let request = ChatRequest::Document {
            prompt: "¿De qué trata?".into(),
            document_text: "Capítulo 1: ...".into(),
            history: vec![],
        };
        let stream = backend(&server).open_stream(&request).await.unwrap();
        assert_eq!(collect(stream).await, "Trata de plantas.");
    }

    #[tokio::test]
    async fn test_media_summary_reads_json_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/summarize-media"))
            .and(body_partial_json(serde_json::json!({
                "mediaUrl": "https://www.youtube.com/watch?v=abc"
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": "Un video de volcanes."})),
            )
            .mount(&server)
            .await;

        let request = ChatRequest::MediaUrl {
            media_url: "https://www.youtube.com/watch?v=abc".into(),
            instruction: None,
        };
        let stream = backend(&server).open_stream(&request).await.unwrap();
        assert_eq!(collect(stream).await, "Un video de volcanes.");
    }

    #[tokio::test]
    async fn test_error_status_carries_backend_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(
                ResponseTemplate::new(400)
                    .set_body_json(serde_json::json!({"error": "Por favor, ingresa una pregunta."})),
            )
            .mount(&server)
            .await;

        let request = ChatRequest::Text {
            prompt: "x".into(),
            history: vec![],
        };
        match backend(&server).open_stream(&request).await {
            Err(ChatError::Upstream { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "Por favor, ingresa una pregunta.");
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected an upstream error"),
        }
    }

    #[test]
    fn test_error_message_shapes() {
        assert_eq!(error_message_from_body(r#"{"error":"malo"}"#), "malo");
        assert_eq!(
            error_message_from_body(r#"{"error":{"code":400,"message":"API key not valid"}}"#),
            "API key not valid"
        );
        assert_eq!(error_message_from_body("  Bad Gateway \n"), "Bad Gateway");
        assert_eq!(error_message_from_body(&"x".repeat(1000)).len(), 800);
    }
}
