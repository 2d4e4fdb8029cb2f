use futures::{stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::chat_api::ChatRequest;
use shared::prompts::{
    build_document_prompt, build_prompt, serialize_history, PromptConfig, PromptInput,
    DEFAULT_MEDIA_INSTRUCTION,
};
use shared::settings::GenerationOptions;
use shared::ChatError;
use std::time::Duration;

use crate::http::{ensure_success, error_message_from_body, transport_error};
use crate::sse::event_stream;
use crate::{ChatBackend, TextStream};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

// ── Request types ────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum GeminiPart {
    Text(String),
    InlineData {
        #[serde(rename = "mimeType")]
        mime_type: String,
        data: String,
    },
    FileData {
        #[serde(rename = "mimeType")]
        mime_type: String,
        #[serde(rename = "fileUri")]
        file_uri: String,
    },
}

#[derive(Debug, Serialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    generation_config: GenerationConfig,
}

// ── Response types (same shape for streamed and whole answers) ───────

#[derive(Debug, Deserialize)]
struct GeminiCandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiCandidatePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiCandidateContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

impl GeminiResponse {
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

/// Text carried by one SSE `data:` payload. Gemini reports mid-stream
/// failures as an `{"error": ...}` object in place of a candidate.
fn chunk_text(data: &str) -> Result<String, ChatError> {
    let value: serde_json::Value = serde_json::from_str(data)
        .map_err(|e| ChatError::stream(format!("unreadable stream payload: {}", e)))?;
    if value.get("error").is_some() {
        return Err(ChatError::stream(error_message_from_body(data)));
    }
    let response: GeminiResponse = serde_json::from_value(value)
        .map_err(|e| ChatError::stream(format!("unexpected stream payload: {}", e)))?;
    Ok(response.text())
}

// ── Client ───────────────────────────────────────────────────────────

/// Calls the Generative Language API directly, building the prompt locally.
pub struct GeminiBackend {
    http: Client,
    auth_token: String,
    model: String,
    base_url: String,
    config: PromptConfig,
    options: GenerationOptions,
}

impl GeminiBackend {
    pub fn new(model: &str, api_key: &str, timeout: Duration) -> Result<Self, ChatError> {
        if api_key.trim().is_empty() {
            return Err(ChatError::validation(
                "No Gemini API key configured (set GEMINI_API_KEY)",
            ));
        }
        Ok(Self {
            http: Client::builder()
                .timeout(timeout)
                .build()
                .map_err(transport_error)?,
            auth_token: api_key.to_string(),
            model: model.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            config: PromptConfig::default(),
            options: GenerationOptions::default(),
        })
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_prompt_config(mut self, config: PromptConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    fn endpoint(&self, method: &str) -> String {
        let query = if method == "streamGenerateContent" {
            "alt=sse&"
        } else {
            ""
        };
        format!(
            "{}/v1beta/models/{}:{}?{}key={}",
            self.base_url, self.model, method, query, self.auth_token
        )
    }

    /// Flatten a request into the parts of a single user message.
    fn parts_for(&self, request: &ChatRequest) -> Vec<GeminiPart> {
        match request {
            ChatRequest::Text { prompt, history } => {
                let history = serialize_history(history);
                vec![GeminiPart::Text(build_prompt(&PromptInput {
                    config: &self.config,
                    history: Some(history.as_str()),
                    question: prompt,
                    has_media: false,
                }))]
            }
            ChatRequest::Image {
                prompt,
                image_base64,
                history,
            } => {
                let history = serialize_history(history);
                vec![
                    GeminiPart::InlineData {
                        mime_type: "image/jpeg".into(),
                        data: image_base64.clone(),
                    },
                    GeminiPart::Text(build_prompt(&PromptInput {
                        config: &self.config,
                        history: Some(history.as_str()),
                        question: prompt,
                        has_media: true,
                    })),
                ]
            }
            ChatRequest::Document {
                prompt,
                document_text,
                history,
            } => vec![GeminiPart::Text(build_document_prompt(
                prompt,
                document_text,
                history,
            ))],
            ChatRequest::MediaUrl {
                media_url,
                instruction,
            } => vec![
                GeminiPart::Text(
                    instruction
                        .clone()
                        .unwrap_or_else(|| DEFAULT_MEDIA_INSTRUCTION.to_string()),
                ),
                GeminiPart::FileData {
                    mime_type: "video/mp4".into(),
                    file_uri: media_url.clone(),
                },
            ],
        }
    }

    fn build_request(&self, request: &ChatRequest) -> GeminiRequest {
        GeminiRequest {
            contents: vec![GeminiContent {
                role: "user".to_string(),
                parts: self.parts_for(request),
            }],
            generation_config: GenerationConfig {
                temperature: self.options.temperature,
                max_output_tokens: self.options.max_tokens,
            },
        }
    }
}

#[async_trait::async_trait]
impl ChatBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn open_stream(&self, request: &ChatRequest) -> Result<TextStream, ChatError> {
        let body = self.build_request(request);
        tracing::debug!(model = %self.model, kind = request.kind(), "calling gemini");

        // Media summaries come back whole; everything else streams.
        if matches!(request, ChatRequest::MediaUrl { .. }) {
            let resp = self
                .http
                .post(self.endpoint("generateContent"))
                .json(&body)
                .send()
                .await
                .map_err(transport_error)?;
            let resp = ensure_success(resp).await?;
            let answer: GeminiResponse = resp.json().await.map_err(transport_error)?;
            let text = answer.text();
            return Ok(Box::pin(stream::once(async move { Ok(text) })));
        }

        let resp = self
            .http
            .post(self.endpoint("streamGenerateContent"))
            .json(&body)
            .send()
            .await
            .map_err(transport_error)?;
        let resp = ensure_success(resp).await?;

        let chunks = event_stream(resp.bytes_stream())
            .map(|event| event.and_then(|e| chunk_text(&e.data)))
            .filter(|chunk| {
                let keep = !matches!(chunk, Ok(text) if text.is_empty());
                futures::future::ready(keep)
            });
        Ok(Box::pin(chunks))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::chat_api::{HistoryEntry, Role};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend(server: &MockServer) -> GeminiBackend {
        GeminiBackend::new("gemini-1.5-flash", "test-key", Duration::from_secs(5))
            .unwrap()
            .with_base_url(&server.uri())
    }

    #[test]
    fn test_missing_key_is_rejected() {
        let result = GeminiBackend::new("gemini-1.5-flash", " ", Duration::from_secs(5));
        assert!(matches!(result, Err(ChatError::Validation { .. })));
    }

    #[test]
    fn test_image_request_parts() {
        let backend =
            GeminiBackend::new("gemini-1.5-flash", "k", Duration::from_secs(5)).unwrap();
        let request = ChatRequest::Image {
            prompt: "¿Qué animal es?".into(),
            image_base64: "QUJD".into(),
            history: vec![HistoryEntry {
                role: Role::User,
                content: "hola".into(),
                media_url: None,
            }],
        };
        let json = serde_json::to_value(backend.build_request(&request)).unwrap();
        let parts = &json["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/jpeg");
        assert_eq!(parts[0]["inlineData"]["data"], "QUJD");
        let text = parts[1]["text"].as_str().unwrap();
        assert!(text.contains("Estudiante: hola"));
        assert!(text.contains("Analiza la imagen proporcionada"));
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 1000);
    }

    #[test]
    fn test_media_request_uses_default_instruction() {
        let backend =
            GeminiBackend::new("gemini-1.5-flash", "k", Duration::from_secs(5)).unwrap();
        let request = ChatRequest::MediaUrl {
            media_url: "https://youtu.be/abc".into(),
            instruction: None,
        };
        let json = serde_json::to_value(backend.build_request(&request)).unwrap();
        let parts = &json["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], DEFAULT_MEDIA_INSTRUCTION);
        assert_eq!(parts[1]["fileData"]["fileUri"], "https://youtu.be/abc");
    }

    #[test]
    fn test_chunk_text_error_payload() {
        let err = chunk_text(r#"{"error":{"code":500,"message":"internal"}}"#).unwrap_err();
        assert!(matches!(err, ChatError::Stream { ref message } if message == "internal"));
    }

    #[tokio::test]
    async fn test_streams_candidate_text() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"La foto\"}],\"role\":\"model\"}}]}\r\n\r\n",
            "data: {\"candidates\":[{\"content\":{\"parts\":[{\"text\":\"síntesis es...\"}],\"role\":\"model\"},\"finishReason\":\"STOP\"}]}\r\n\r\n",
        );
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-1.5-flash:streamGenerateContent"))
            .and(query_param("alt", "sse"))
            .and(query_param("key", "test-key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(&server)
            .await;

        let request = ChatRequest::Text {
            prompt: "¿Qué es la fotosíntesis?".into(),
            history: vec![],
        };
        let chunks: Vec<String> = backend(&server)
            .open_stream(&request)
            .await
            .unwrap()
            .map(|c| c.unwrap())
            .collect()
            .await;
        assert_eq!(chunks, vec!["La foto", "síntesis es..."]);
    }

    #[tokio::test]
    async fn test_error_status_maps_to_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "error": {"code": 403, "message": "API key not valid", "status": "PERMISSION_DENIED"}
            })))
            .mount(&server)
            .await;

        let request = ChatRequest::Text {
            prompt: "hola".into(),
            history: vec![],
        };
        let err = match backend(&server).open_stream(&request).await {
            Err(e) => e,
            Ok(_) => panic!("expected an error"),
        };
        assert!(matches!(
            err,
            ChatError::Upstream { status: 403, ref message } if message == "API key not valid"
        ));
    }
}
