use shared::prompts::PromptConfig;
use shared::settings::{BackendKind, BackendSettings, GenerationOptions};
use shared::ChatError;
use std::sync::Arc;
use std::time::Duration;

use crate::gemini::GeminiBackend;
use crate::http::HttpBackend;
use crate::image::ImageClient;
use crate::{ChatBackend, ImageBackend};

/// Build the chat backend named in the settings.
pub fn chat_backend(
    settings: &BackendSettings,
    prompt: PromptConfig,
    options: GenerationOptions,
) -> Result<Arc<dyn ChatBackend>, ChatError> {
    let timeout = Duration::from_secs(settings.timeout_secs);
    let backend: Arc<dyn ChatBackend> = match settings.kind {
        BackendKind::Http => Arc::new(
            HttpBackend::new(&settings.base_url, timeout)?
                .with_prompt_config(prompt)
                .with_options(options),
        ),
        BackendKind::Gemini => {
            let key = settings.resolve_api_key().ok_or_else(|| {
                ChatError::validation(
                    "No Gemini API key configured (set GEMINI_API_KEY or add api_key to settings.json)",
                )
            })?;
            Arc::new(
                GeminiBackend::new(&settings.gemini_model, &key, timeout)?
                    .with_base_url(&settings.gemini_base_url)
                    .with_prompt_config(prompt)
                    .with_options(options),
            )
        }
    };
    tracing::info!(backend = backend.name(), "chat backend ready");
    Ok(backend)
}

/// Image generation always goes through the app's own route.
pub fn image_backend(settings: &BackendSettings) -> Result<Arc<dyn ImageBackend>, ChatError> {
    let client = ImageClient::new(
        &settings.base_url,
        Duration::from_secs(settings.timeout_secs),
    )?;
    Ok(Arc::new(client))
}
