pub mod error;
pub mod events;
pub mod personas;
pub mod prompts;

pub use error::ChatError;

pub mod settings {
    use crate::prompts::PromptConfig;
    use serde::{Deserialize, Serialize};
    use std::env;
    use std::fs;
    use std::path::Path;

    fn default_base_url() -> String {
        "http://localhost:3000".into()
    }

    fn default_gemini_base_url() -> String {
        "https://generativelanguage.googleapis.com".into()
    }

    fn default_gemini_model() -> String {
        "gemini-1.5-flash".into()
    }

    fn default_timeout_secs() -> u64 {
        120
    }

    /// Which backend the session talks to.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
    #[serde(rename_all = "lowercase")]
    pub enum BackendKind {
        /// The app's own `/api/*` route handlers.
        #[default]
        Http,
        /// Google Generative Language API, called directly.
        Gemini,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct BackendSettings {
        #[serde(default)]
        pub kind: BackendKind,
        #[serde(default = "default_base_url")]
        pub base_url: String,
        #[serde(default = "default_gemini_base_url")]
        pub gemini_base_url: String,
        #[serde(default = "default_gemini_model")]
        pub gemini_model: String,
        /// Stored key; falls back to `GEMINI_API_KEY` / `GENKIT_API_KEY`.
        #[serde(default)]
        pub api_key: Option<String>,
        #[serde(default = "default_timeout_secs")]
        pub timeout_secs: u64,
    }

    impl Default for BackendSettings {
        fn default() -> Self {
            Self {
                kind: BackendKind::default(),
                base_url: default_base_url(),
                gemini_base_url: default_gemini_base_url(),
                gemini_model: default_gemini_model(),
                api_key: None,
                timeout_secs: default_timeout_secs(),
            }
        }
    }

    impl BackendSettings {
        /// The configured key, or the first non-empty key found in the environment.
        pub fn resolve_api_key(&self) -> Option<String> {
            if let Some(key) = self.api_key.as_ref().filter(|k| !k.trim().is_empty()) {
                return Some(key.clone());
            }
            ["GEMINI_API_KEY", "GENKIT_API_KEY"]
                .iter()
                .filter_map(|name| env::var(name).ok())
                .find(|k| !k.trim().is_empty())
        }
    }

    /// Sampling options forwarded with every text request.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct GenerationOptions {
        pub format: String,
        pub temperature: f32,
        pub max_tokens: u32,
        pub stream: bool,
    }

    impl Default for GenerationOptions {
        fn default() -> Self {
            Self {
                format: "markdown".into(),
                temperature: 0.7,
                max_tokens: 1000,
                stream: true,
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize, Default)]
    pub struct ChatSettings {
        #[serde(default)]
        pub backend: BackendSettings,
        #[serde(default)]
        pub prompt: PromptConfig,
        #[serde(default)]
        pub generation: GenerationOptions,
    }

    impl ChatSettings {
        /// Read settings from a JSON file. Missing fields take their defaults.
        pub fn load_from(path: &Path) -> anyhow::Result<Self> {
            let bytes = fs::read(path)?;
            let settings = serde_json::from_slice(&bytes)?;
            tracing::debug!(path = %path.display(), "settings loaded");
            Ok(settings)
        }

        pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, serde_json::to_vec_pretty(self)?)?;
            Ok(())
        }
    }

}

pub mod chat_api {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};
    use std::fmt;
    use uuid::Uuid;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    #[serde(rename_all = "lowercase")]
    pub enum Role {
        User,
        Assistant,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct TurnId(Uuid);

    impl TurnId {
        pub fn new() -> Self {
            Self(Uuid::new_v4())
        }
    }

    impl Default for TurnId {
        fn default() -> Self {
            Self::new()
        }
    }

    impl fmt::Display for TurnId {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            self.0.fmt(f)
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub enum TurnStatus {
        /// Still receiving streamed content.
        InProgress,
        Complete,
        /// Stopped by the user; holds whatever arrived before the abort.
        Aborted,
        /// Stream broke; holds whatever arrived before the failure.
        Failed,
    }

    /// One message in the conversation.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Turn {
        pub id: TurnId,
        pub role: Role,
        pub content: String,
        /// Attached image or generated picture (data URI or hosted URL).
        pub media_reference: Option<String>,
        pub status: TurnStatus,
        pub created_at: DateTime<Utc>,
    }

    impl Turn {
        fn new(role: Role, content: String, status: TurnStatus) -> Self {
            Self {
                id: TurnId::new(),
                role,
                content,
                media_reference: None,
                status,
                created_at: Utc::now(),
            }
        }

        pub fn user(content: impl Into<String>) -> Self {
            Self::new(Role::User, content.into(), TurnStatus::Complete)
        }

        pub fn assistant(content: impl Into<String>) -> Self {
            Self::new(Role::Assistant, content.into(), TurnStatus::Complete)
        }

        /// Empty assistant turn that will grow as chunks arrive.
        pub fn in_progress_assistant() -> Self {
            Self::new(Role::Assistant, String::new(), TurnStatus::InProgress)
        }

        pub fn with_media(mut self, media_reference: impl Into<String>) -> Self {
            self.media_reference = Some(media_reference.into());
            self
        }

        pub fn is_in_progress(&self) -> bool {
            self.status == TurnStatus::InProgress
        }

        pub fn to_history_entry(&self) -> HistoryEntry {
            HistoryEntry {
                role: self.role,
                content: self.content.clone(),
                media_url: self.media_reference.clone(),
            }
        }
    }

    /// Wire form of a prior turn sent along with a request.
    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct HistoryEntry {
        pub role: Role,
        pub content: String,
        #[serde(rename = "mediaUrl", skip_serializing_if = "Option::is_none", default)]
        pub media_url: Option<String>,
    }

    /// Build the data URI the backends expect for an attached photo.
    pub fn image_data_uri(image_base64: &str) -> String {
        format!("data:image/jpeg;base64,{}", image_base64)
    }

    /// One outbound request. Exactly one is built per user turn.
    #[derive(Debug, Clone, PartialEq)]
    pub enum ChatRequest {
        Text {
            prompt: String,
            history: Vec<HistoryEntry>,
        },
        Image {
            prompt: String,
            image_base64: String,
            history: Vec<HistoryEntry>,
        },
        Document {
            prompt: String,
            document_text: String,
            history: Vec<HistoryEntry>,
        },
        /// Summarize external media by URL; carries no history.
        MediaUrl {
            media_url: String,
            instruction: Option<String>,
        },
    }

    impl ChatRequest {
        /// The user's own words for this turn (the instruction for media requests).
        pub fn prompt(&self) -> &str {
            match self {
                ChatRequest::Text { prompt, .. }
                | ChatRequest::Image { prompt, .. }
                | ChatRequest::Document { prompt, .. } => prompt,
                ChatRequest::MediaUrl { instruction, .. } => instruction.as_deref().unwrap_or(""),
            }
        }

        pub fn history(&self) -> &[HistoryEntry] {
            match self {
                ChatRequest::Text { history, .. }
                | ChatRequest::Image { history, .. }
                | ChatRequest::Document { history, .. } => history,
                ChatRequest::MediaUrl { .. } => &[],
            }
        }

        pub fn kind(&self) -> &'static str {
            match self {
                ChatRequest::Text { .. } => "text",
                ChatRequest::Image { .. } => "image",
                ChatRequest::Document { .. } => "document",
                ChatRequest::MediaUrl { .. } => "media_url",
            }
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
    pub enum ImageSize {
        #[serde(rename = "256x256")]
        Small,
        #[default]
        #[serde(rename = "512x512")]
        Medium,
        #[serde(rename = "1024x1024")]
        Large,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
    #[serde(rename_all = "lowercase")]
    pub enum ImageModel {
        Imagen2,
        #[default]
        Imagen3,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct ImageRequest {
        pub prompt: String,
        #[serde(default)]
        pub size: ImageSize,
        #[serde(default)]
        pub model: ImageModel,
    }

    impl ImageRequest {
        pub fn new(prompt: impl Into<String>) -> Self {
            Self {
                prompt: prompt.into(),
                size: ImageSize::default(),
                model: ImageModel::default(),
            }
        }
    }

}
